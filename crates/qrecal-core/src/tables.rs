//! Immutable, hierarchical store of empirical error statistics.
//!
//! Three levels of increasing specificity, each also keyed by [`EventModel`]:
//!
//! ```text
//! read group → (read group, reported quality) → (read group, reported quality, slot, value)
//! ```
//!
//! Tables are assembled with [`TableBuilder`] and never mutated afterwards.
//! Lookups return `None` for combinations the training data never saw.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::event::EventModel;

/// Empirical statistics for one table cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmpiricalDatum {
    /// Quality derived from observed error counts.
    pub empirical_quality: f64,
    /// Mean instrument-reported quality of the observations.
    pub estimated_reported_quality: f64,
    /// Number of observations behind this cell.
    pub observation_count: u64,
}

impl EmpiricalDatum {
    pub fn new(empirical_quality: f64, estimated_reported_quality: f64, observation_count: u64) -> Self {
        Self {
            empirical_quality,
            estimated_reported_quality,
            observation_count,
        }
    }

    fn digest_into(&self, h: &mut Sha256) {
        h.update(self.empirical_quality.to_bits().to_le_bytes());
        h.update(self.estimated_reported_quality.to_bits().to_le_bytes());
        h.update(self.observation_count.to_le_bytes());
    }
}

type ReadGroupKey = (i32, EventModel);
type QualityKey = (i32, i32, EventModel);
type CovariateCellKey = (i32, i32, usize, i32, EventModel);

/// Frozen recalibration tables.
#[derive(Debug, Clone, Default)]
pub struct RecalibrationTables {
    read_group: HashMap<ReadGroupKey, EmpiricalDatum>,
    quality_score: HashMap<QualityKey, EmpiricalDatum>,
    covariates: HashMap<CovariateCellKey, EmpiricalDatum>,
}

impl RecalibrationTables {
    /// Start assembling a new table set.
    pub fn builder() -> TableBuilder {
        TableBuilder::default()
    }

    /// Read-group level statistics.
    pub fn read_group(&self, read_group: i32, event: EventModel) -> Option<&EmpiricalDatum> {
        self.read_group.get(&(read_group, event))
    }

    /// (read group, reported quality) level statistics.
    pub fn quality_score(
        &self,
        read_group: i32,
        quality: i32,
        event: EventModel,
    ) -> Option<&EmpiricalDatum> {
        self.quality_score.get(&(read_group, quality, event))
    }

    /// (read group, reported quality, optional slot, slot value) level statistics.
    pub fn covariate(
        &self,
        read_group: i32,
        quality: i32,
        slot: usize,
        value: i32,
        event: EventModel,
    ) -> Option<&EmpiricalDatum> {
        self.covariates
            .get(&(read_group, quality, slot, value, event))
    }

    /// Entry counts for the three levels: read group, quality score, covariate.
    pub fn counts(&self) -> TableCounts {
        TableCounts {
            read_group: self.read_group.len(),
            quality_score: self.quality_score.len(),
            covariate: self.covariates.len(),
        }
    }

    /// Feed every entry, in a canonical order, into a SHA-256 state.
    pub(crate) fn digest_into(&self, h: &mut Sha256) {
        let mut rg: Vec<_> = self.read_group.iter().collect();
        rg.sort_by(|a, b| a.0.cmp(b.0));
        h.update(b"read_group");
        for (&(group, event), datum) in rg {
            h.update(group.to_le_bytes());
            h.update([event.index() as u8]);
            datum.digest_into(h);
        }

        let mut qs: Vec<_> = self.quality_score.iter().collect();
        qs.sort_by(|a, b| a.0.cmp(b.0));
        h.update(b"quality_score");
        for (&(group, qual, event), datum) in qs {
            h.update(group.to_le_bytes());
            h.update(qual.to_le_bytes());
            h.update([event.index() as u8]);
            datum.digest_into(h);
        }

        let mut cov: Vec<_> = self.covariates.iter().collect();
        cov.sort_by(|a, b| a.0.cmp(b.0));
        h.update(b"covariate");
        for (&(group, qual, slot, value, event), datum) in cov {
            h.update(group.to_le_bytes());
            h.update(qual.to_le_bytes());
            h.update((slot as u64).to_le_bytes());
            h.update(value.to_le_bytes());
            h.update([event.index() as u8]);
            datum.digest_into(h);
        }
    }
}

/// Number of cells per table level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TableCounts {
    pub read_group: usize,
    pub quality_score: usize,
    pub covariate: usize,
}

/// Mutable staging area for [`RecalibrationTables`].
#[derive(Debug, Default)]
pub struct TableBuilder {
    tables: RecalibrationTables,
}

impl TableBuilder {
    pub fn insert_read_group(
        &mut self,
        read_group: i32,
        event: EventModel,
        datum: EmpiricalDatum,
    ) -> &mut Self {
        self.tables.read_group.insert((read_group, event), datum);
        self
    }

    pub fn insert_quality_score(
        &mut self,
        read_group: i32,
        quality: i32,
        event: EventModel,
        datum: EmpiricalDatum,
    ) -> &mut Self {
        self.tables
            .quality_score
            .insert((read_group, quality, event), datum);
        self
    }

    pub fn insert_covariate(
        &mut self,
        read_group: i32,
        quality: i32,
        slot: usize,
        value: i32,
        event: EventModel,
        datum: EmpiricalDatum,
    ) -> &mut Self {
        self.tables
            .covariates
            .insert((read_group, quality, slot, value, event), datum);
        self
    }

    /// Freeze the tables.
    pub fn build(self) -> RecalibrationTables {
        self.tables
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
