//! Quality quantization.
//!
//! A [`QuantizationTable`] is a total map over `0..=MAX_QUAL_SCORE`, monotonic
//! non-decreasing and idempotent. Reports carry a native table together with
//! the observation histogram it was fitted on ([`QuantizationInfo`]); asking
//! for a different number of levels re-buckets from that histogram.
//!
//! # Re-bucketing
//!
//! Greedy bottom-up merging. Every quality starts as its own interval; the
//! adjacent pair whose merge costs the least penalty is fused until only the
//! requested number of intervals remains. Penalty measures how far the merged
//! error rate drifts from each leaf's own rate, weighted by observations.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::quality::{MAX_QUAL_SCORE, MIN_USABLE_Q_SCORE, error_prob_to_qual, qual_to_error_prob};

/// Number of entries in every quantization map.
pub const QUANTIZATION_TABLE_SIZE: usize = MAX_QUAL_SCORE as usize + 1;

/// Requested quantization behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantizationLevels {
    /// Use whatever the report carries.
    #[default]
    Native,
    /// Identity map; qualities keep full resolution.
    Disabled,
    /// Re-bucket into this many levels.
    Levels(u16),
}

impl QuantizationLevels {
    /// Interpret a command-line style level: unset or negative means native,
    /// zero disables, positive re-buckets.
    pub fn from_arg(level: Option<i32>) -> Self {
        match level {
            None => Self::Native,
            Some(n) if n < 0 => Self::Native,
            Some(0) => Self::Disabled,
            Some(n) => Self::Levels(n.min(i32::from(u16::MAX)) as u16),
        }
    }
}

impl std::fmt::Display for QuantizationLevels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Disabled => write!(f, "disabled"),
            Self::Levels(n) => write!(f, "{n} levels"),
        }
    }
}

// ---------------------------------------------------------------------------
// Quantization table
// ---------------------------------------------------------------------------

/// Quality → bucketed quality lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizationTable {
    map: [u8; QUANTIZATION_TABLE_SIZE],
}

impl QuantizationTable {
    /// The disabled map: every quality maps to itself.
    pub fn identity() -> Self {
        let mut map = [0u8; QUANTIZATION_TABLE_SIZE];
        for (q, slot) in map.iter_mut().enumerate() {
            *slot = q as u8;
        }
        Self { map }
    }

    /// Build from an explicit mapping, rejecting anything that is not a
    /// full-size, monotonic, idempotent map.
    pub fn from_mapping(mapping: &[u8]) -> Result<Self> {
        if mapping.len() != QUANTIZATION_TABLE_SIZE {
            return Err(Error::InvalidQuantization(format!(
                "expected {QUANTIZATION_TABLE_SIZE} entries, got {}",
                mapping.len()
            )));
        }
        for (q, &v) in mapping.iter().enumerate() {
            if v > MAX_QUAL_SCORE {
                return Err(Error::InvalidQuantization(format!(
                    "quality {q} maps to {v}, above {MAX_QUAL_SCORE}"
                )));
            }
            if q > 0 && v < mapping[q - 1] {
                return Err(Error::InvalidQuantization(format!(
                    "not monotonic at quality {q} ({} then {v})",
                    mapping[q - 1]
                )));
            }
            if mapping[v as usize] != v {
                return Err(Error::InvalidQuantization(format!(
                    "not idempotent at quality {q} ({v} maps to {})",
                    mapping[v as usize]
                )));
            }
        }
        let mut map = [0u8; QUANTIZATION_TABLE_SIZE];
        map.copy_from_slice(mapping);
        Ok(Self { map })
    }

    /// Bucket a quality. Inputs above the map saturate to its last entry.
    pub fn quantize(&self, qual: u8) -> u8 {
        self.map[usize::from(qual.min(MAX_QUAL_SCORE))]
    }

    /// The raw map.
    pub fn as_slice(&self) -> &[u8] {
        &self.map
    }

    /// Number of distinct output qualities.
    pub fn levels(&self) -> usize {
        let mut n = 1;
        for w in self.map.windows(2) {
            if w[1] != w[0] {
                n += 1;
            }
        }
        n
    }
}

impl Default for QuantizationTable {
    fn default() -> Self {
        Self::identity()
    }
}

// ---------------------------------------------------------------------------
// Report quantization info
// ---------------------------------------------------------------------------

/// Quantization state carried by a recalibration report.
#[derive(Debug, Clone)]
pub struct QuantizationInfo {
    levels: usize,
    histogram: Vec<u64>,
    native: QuantizationTable,
}

impl QuantizationInfo {
    pub fn new(levels: usize, histogram: Vec<u64>, native: QuantizationTable) -> Result<Self> {
        if histogram.len() != QUANTIZATION_TABLE_SIZE {
            return Err(Error::InvalidQuantization(format!(
                "histogram has {} bins, expected {QUANTIZATION_TABLE_SIZE}",
                histogram.len()
            )));
        }
        if native.levels() != levels {
            return Err(Error::InvalidQuantization(format!(
                "report declares {levels} levels but its map has {}",
                native.levels()
            )));
        }
        Ok(Self {
            levels,
            histogram,
            native,
        })
    }

    /// Number of levels the native map was fitted with.
    pub fn native_levels(&self) -> usize {
        self.levels
    }

    pub fn histogram(&self) -> &[u64] {
        &self.histogram
    }

    /// Resolve the table to use for the requested behaviour.
    pub fn resolve(&self, levels: QuantizationLevels) -> QuantizationTable {
        match levels {
            QuantizationLevels::Native => self.native.clone(),
            QuantizationLevels::Disabled => QuantizationTable::identity(),
            QuantizationLevels::Levels(n) if usize::from(n) == self.levels => self.native.clone(),
            QuantizationLevels::Levels(n) => {
                log::debug!(
                    "re-bucketing quantization from {} to {} levels",
                    self.levels,
                    n
                );
                quantize_histogram(&self.histogram, usize::from(n))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Histogram re-bucketing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct QualInterval {
    q_start: u8,
    q_end: u8,
    n_observations: u64,
    n_errors: u64,
    children: Vec<QualInterval>,
}

impl QualInterval {
    fn leaf(qual: u8, n_observations: u64) -> Self {
        let n_errors = (qual_to_error_prob(qual) * n_observations as f64).floor() as u64;
        Self {
            q_start: qual,
            q_end: qual,
            n_observations,
            n_errors,
            children: Vec::new(),
        }
    }

    fn error_rate(&self) -> f64 {
        if self.n_observations == 0 {
            0.0
        } else {
            (self.n_errors as f64 + 1.0) / (self.n_observations as f64 + 1.0)
        }
    }

    /// Representative quality, kept inside the interval so that bucketing
    /// a bucketed quality is a no-op.
    fn qual(&self) -> u8 {
        error_prob_to_qual(self.error_rate(), MAX_QUAL_SCORE).clamp(self.q_start, self.q_end)
    }

    fn merge(&self, other: &QualInterval) -> QualInterval {
        let (lo, hi) = if self.q_start <= other.q_start {
            (self, other)
        } else {
            (other, self)
        };
        QualInterval {
            q_start: lo.q_start,
            q_end: hi.q_end,
            n_observations: lo.n_observations + hi.n_observations,
            n_errors: lo.n_errors + hi.n_errors,
            children: vec![lo.clone(), hi.clone()],
        }
    }

    fn penalty(&self) -> f64 {
        self.penalty_against(self.error_rate())
    }

    fn penalty_against(&self, global_error_rate: f64) -> f64 {
        if global_error_rate == 0.0 {
            return 0.0;
        }
        if self.children.is_empty() {
            if self.q_end <= MIN_USABLE_Q_SCORE || self.n_observations == 0 {
                0.0
            } else {
                (self.error_rate().log10() - global_error_rate.log10()).abs()
                    * self.n_observations as f64
            }
        } else {
            self.children
                .iter()
                .map(|c| c.penalty_against(global_error_rate))
                .sum()
        }
    }
}

/// Fit a map with at most `levels` buckets to a per-quality histogram.
pub fn quantize_histogram(histogram: &[u64], levels: usize) -> QuantizationTable {
    let levels = levels.max(1);
    let mut intervals: Vec<QualInterval> = histogram
        .iter()
        .take(QUANTIZATION_TABLE_SIZE)
        .enumerate()
        .map(|(q, &n)| QualInterval::leaf(q as u8, n))
        .collect();

    while intervals.len() > levels {
        let mut best: Option<(usize, QualInterval, f64)> = None;
        for i in 0..intervals.len() - 1 {
            let merged = intervals[i].merge(&intervals[i + 1]);
            let penalty = merged.penalty();
            if best.as_ref().is_none_or(|(_, _, p)| penalty < *p) {
                best = Some((i, merged, penalty));
            }
        }
        let Some((i, merged, _)) = best else { break };
        intervals[i] = merged;
        intervals.remove(i + 1);
    }

    let mut map = QuantizationTable::identity().map;
    for interval in &intervals {
        let q = interval.qual();
        for slot in &mut map[usize::from(interval.q_start)..=usize::from(interval.q_end)] {
            *slot = q;
        }
    }
    QuantizationTable { map }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
