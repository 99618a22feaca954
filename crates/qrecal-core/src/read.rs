//! Minimal sequencing read with one quality buffer per event model.
//!
//! Buffers are owned by the caller. The recalibrator borrows them mutably for
//! the duration of a single call and never keeps a reference afterwards.

use serde::{Deserialize, Serialize};

use crate::event::EventModel;
use crate::quality::DEFAULT_INDEL_QUALITY;

/// A read as seen by the recalibrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Read {
    pub name: String,
    pub read_group: String,
    /// Bases as sequenced on the forward strand (`ACGTN`).
    #[serde(with = "ascii")]
    pub bases: Vec<u8>,
    /// Whether the read aligned to the reverse strand.
    #[serde(default)]
    pub negative_strand: bool,
    pub base_qualities: Vec<u8>,
    #[serde(default)]
    pub insertion_qualities: Vec<u8>,
    #[serde(default)]
    pub deletion_qualities: Vec<u8>,
}

impl Read {
    /// Build a read with default insertion and deletion qualities.
    pub fn new(
        name: impl Into<String>,
        read_group: impl Into<String>,
        bases: impl Into<Vec<u8>>,
        base_qualities: Vec<u8>,
    ) -> Self {
        let bases = bases.into();
        let n = bases.len();
        Self {
            name: name.into(),
            read_group: read_group.into(),
            bases,
            negative_strand: false,
            base_qualities,
            insertion_qualities: vec![DEFAULT_INDEL_QUALITY; n],
            deletion_qualities: vec![DEFAULT_INDEL_QUALITY; n],
        }
    }

    /// Number of bases.
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Fill absent insertion/deletion buffers with the default quality.
    /// Deserialized reads may omit them.
    pub fn fill_default_indel_qualities(&mut self) {
        let n = self.len();
        if self.insertion_qualities.is_empty() {
            self.insertion_qualities = vec![DEFAULT_INDEL_QUALITY; n];
        }
        if self.deletion_qualities.is_empty() {
            self.deletion_qualities = vec![DEFAULT_INDEL_QUALITY; n];
        }
    }

    pub fn qualities(&self, event: EventModel) -> &[u8] {
        match event {
            EventModel::Substitution => &self.base_qualities,
            EventModel::Insertion => &self.insertion_qualities,
            EventModel::Deletion => &self.deletion_qualities,
        }
    }

    pub fn qualities_mut(&mut self, event: EventModel) -> &mut [u8] {
        match event {
            EventModel::Substitution => &mut self.base_qualities,
            EventModel::Insertion => &mut self.insertion_qualities,
            EventModel::Deletion => &mut self.deletion_qualities,
        }
    }
}

mod ascii {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bases: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&String::from_utf8_lossy(bases))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        Ok(s.into_bytes())
    }
}
