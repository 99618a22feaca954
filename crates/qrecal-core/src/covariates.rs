//! Covariate keys and the extraction contract.
//!
//! A [`CovariateKey`] is the ordered tuple `[read group, reported quality,
//! slot0, slot1, …]` describing one base under one [`EventModel`]. Slot values
//! below zero mean the covariate does not apply to that base.
//!
//! Extraction is pluggable through [`CovariateExtractor`]. [`StandardCovariates`]
//! is the reference implementation for the covariates recalibration reports
//! usually carry.

use crate::error::{Error, Result};
use crate::event::EventModel;
use crate::read::Read;

/// Slot value marking a covariate that does not apply to a base.
pub const NOT_APPLICABLE: i32 = -1;

/// `[read group, reported quality, optional slots…]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CovariateKey(Box<[i32]>);

impl CovariateKey {
    pub fn new(values: impl Into<Box<[i32]>>) -> Self {
        Self(values.into())
    }

    pub fn read_group(&self) -> i32 {
        self.0.first().copied().unwrap_or(NOT_APPLICABLE)
    }

    pub fn reported_quality(&self) -> i32 {
        self.0.get(1).copied().unwrap_or(NOT_APPLICABLE)
    }

    /// Optional covariate values, in slot order.
    pub fn slots(&self) -> &[i32] {
        self.0.get(2..).unwrap_or(&[])
    }

    pub fn values(&self) -> &[i32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<i32>> for CovariateKey {
    fn from(v: Vec<i32>) -> Self {
        Self(v.into_boxed_slice())
    }
}

/// Produces one covariate key per base for a read and event model.
pub trait CovariateExtractor: Send + Sync {
    /// Length of every key produced, including read group and quality.
    fn covariate_count(&self) -> usize;

    /// Keys for every base of `read` under `event`, in base order.
    fn extract(&self, read: &Read, event: EventModel) -> Result<Vec<CovariateKey>>;
}

// ---------------------------------------------------------------------------
// Standard covariates
// ---------------------------------------------------------------------------

/// Covariates understood by [`StandardCovariates`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Covariate {
    /// Index of the read's read group.
    ReadGroup,
    /// Instrument-reported quality for the event.
    QualityScore,
    /// 1-based machine cycle, counted in sequencing direction.
    Cycle,
    /// Packed preceding bases in sequencing direction.
    Context,
}

impl Covariate {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "ReadGroup" | "ReadGroupCovariate" => Ok(Self::ReadGroup),
            "QualityScore" | "QualityScoreCovariate" => Ok(Self::QualityScore),
            "Cycle" | "CycleCovariate" => Ok(Self::Cycle),
            "Context" | "ContextCovariate" => Ok(Self::Context),
            other => Err(Error::UnknownCovariate(other.to_string())),
        }
    }
}

impl std::fmt::Display for Covariate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadGroup => write!(f, "ReadGroup"),
            Self::QualityScore => write!(f, "QualityScore"),
            Self::Cycle => write!(f, "Cycle"),
            Self::Context => write!(f, "Context"),
        }
    }
}

/// Context length for substitutions.
pub const MISMATCH_CONTEXT_SIZE: usize = 2;
/// Context length for insertions and deletions.
pub const INDEL_CONTEXT_SIZE: usize = 3;

/// Reference extractor for read group, quality, cycle and context.
#[derive(Debug, Clone)]
pub struct StandardCovariates {
    read_groups: Vec<String>,
    optional: Vec<Covariate>,
}

impl StandardCovariates {
    /// Build from a report's covariate list. The first two entries must be
    /// `ReadGroup` and `QualityScore`.
    pub fn new(names: &[String], read_groups: Vec<String>) -> Result<Self> {
        let covariates = names
            .iter()
            .map(|n| Covariate::from_name(n))
            .collect::<Result<Vec<_>>>()?;
        match covariates.as_slice() {
            [Covariate::ReadGroup, Covariate::QualityScore, rest @ ..] => {
                if let Some(c) = rest
                    .iter()
                    .find(|c| matches!(c, Covariate::ReadGroup | Covariate::QualityScore))
                {
                    return Err(Error::Report(format!(
                        "{c} may only appear as a required covariate"
                    )));
                }
                for (i, c) in rest.iter().enumerate() {
                    if rest[..i].contains(c) {
                        return Err(Error::Report(format!("duplicate covariate {c}")));
                    }
                }
                Ok(Self {
                    read_groups,
                    optional: rest.to_vec(),
                })
            }
            _ => Err(Error::Report(
                "covariate list must start with ReadGroup, QualityScore".to_string(),
            )),
        }
    }

    pub fn optional(&self) -> &[Covariate] {
        &self.optional
    }

    fn read_group_index(&self, name: &str) -> Result<i32> {
        self.read_groups
            .iter()
            .position(|rg| rg == name)
            .map(|i| i as i32)
            .ok_or_else(|| Error::UnknownReadGroup(name.to_string()))
    }
}

impl CovariateExtractor for StandardCovariates {
    fn covariate_count(&self) -> usize {
        2 + self.optional.len()
    }

    fn extract(&self, read: &Read, event: EventModel) -> Result<Vec<CovariateKey>> {
        let rg = self.read_group_index(&read.read_group)?;
        let quals = read.qualities(event);
        let n = read.len();
        let context_size = match event {
            EventModel::Substitution => MISMATCH_CONTEXT_SIZE,
            EventModel::Insertion | EventModel::Deletion => INDEL_CONTEXT_SIZE,
        };

        let mut keys = Vec::with_capacity(n);
        for offset in 0..n {
            let mut values = Vec::with_capacity(self.covariate_count());
            values.push(rg);
            values.push(quals.get(offset).map_or(NOT_APPLICABLE, |&q| i32::from(q)));
            for covariate in &self.optional {
                let v = match covariate {
                    Covariate::Cycle => cycle(offset, n, read.negative_strand),
                    Covariate::Context => {
                        context(&read.bases, offset, context_size, read.negative_strand)
                    }
                    Covariate::ReadGroup | Covariate::QualityScore => NOT_APPLICABLE,
                };
                values.push(v);
            }
            keys.push(CovariateKey::from(values));
        }
        Ok(keys)
    }
}

fn cycle(offset: usize, len: usize, negative_strand: bool) -> i32 {
    let c = if negative_strand { len - offset } else { offset + 1 };
    c as i32
}

fn base_code(base: u8) -> Option<i32> {
    match base.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

fn complement(code: i32) -> i32 {
    3 - code
}

/// The `size` bases ending at `offset`, in sequencing direction, 2-bit packed.
fn context(bases: &[u8], offset: usize, size: usize, negative_strand: bool) -> i32 {
    let mut packed = 0i32;
    for step in 0..size {
        // walk from the oldest base toward `offset` in sequencing direction
        let back = size - 1 - step;
        let idx = if negative_strand {
            match offset.checked_add(back) {
                Some(i) if i < bases.len() => i,
                _ => return NOT_APPLICABLE,
            }
        } else {
            match offset.checked_sub(back) {
                Some(i) => i,
                None => return NOT_APPLICABLE,
            }
        };
        let Some(code) = base_code(bases[idx]) else {
            return NOT_APPLICABLE;
        };
        let code = if negative_strand { complement(code) } else { code };
        packed = (packed << 2) | code;
    }
    packed
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
