//! Hierarchical delta-Q recalibration formula.
//!
//! ```text
//! Qrecal = Qreported + ΔQ(read group) + ΔQ(reported quality) + Σ ΔQ(covariate)
//! ```
//!
//! Each delta is measured relative to everything coarser than it, so a level
//! with no table entry simply contributes zero. The sum is rounded half away
//! from zero, clamped into `[1, max_quality]`, then quantized.

use crate::covariates::CovariateKey;
use crate::event::EventModel;
use crate::quality::bound_qual;
use crate::quantization::QuantizationTable;
use crate::tables::RecalibrationTables;

/// The four additive terms behind one recalibrated quality.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeltaQ {
    pub qual_from_read: f64,
    pub global: f64,
    pub reported: f64,
    pub covariates: f64,
}

impl DeltaQ {
    /// Unrounded recalibrated quality.
    pub fn total(&self) -> f64 {
        self.qual_from_read + self.global + self.reported + self.covariates
    }
}

/// Pure function from a covariate key to a recalibrated quality.
#[derive(Debug, Clone, Copy)]
pub struct RecalibrationFormula<'a> {
    tables: &'a RecalibrationTables,
    max_quality: u8,
}

impl<'a> RecalibrationFormula<'a> {
    pub fn new(tables: &'a RecalibrationTables, max_quality: u8) -> Self {
        Self {
            tables,
            max_quality,
        }
    }

    /// Compute every term for `key` under `event`.
    pub fn delta_q(&self, key: &CovariateKey, event: EventModel) -> DeltaQ {
        let rg = key.read_group();
        let qual = key.reported_quality();
        let qual_from_read = f64::from(qual);

        let global = self
            .tables
            .read_group(rg, event)
            .map_or(0.0, |d| d.empirical_quality - d.estimated_reported_quality);

        let reported = self
            .tables
            .quality_score(rg, qual, event)
            .map_or(0.0, |d| d.empirical_quality - qual_from_read - global);

        let mut covariates = 0.0;
        for (slot, &value) in key.slots().iter().enumerate() {
            if value < 0 {
                continue;
            }
            if let Some(d) = self.tables.covariate(rg, qual, slot, value, event) {
                covariates += d.empirical_quality - qual_from_read - (global + reported);
            }
        }

        DeltaQ {
            qual_from_read,
            global,
            reported,
            covariates,
        }
    }

    /// Rounded and clamped quality, before quantization. Never below 1.
    pub fn raw_quality(&self, key: &CovariateKey, event: EventModel) -> u8 {
        let total = self.delta_q(key, event).total();
        bound_qual(total.round() as i64, self.max_quality)
    }

    /// Final quantized quality.
    pub fn recalibrate(
        &self,
        key: &CovariateKey,
        event: EventModel,
        quantization: &QuantizationTable,
    ) -> u8 {
        quantization.quantize(self.raw_quality(key, event))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::MAX_RECALIBRATED_Q_SCORE;
    use crate::quantization::QUANTIZATION_TABLE_SIZE;
    use crate::tables::EmpiricalDatum;

    const M: EventModel = EventModel::Substitution;

    fn worked_example_tables() -> RecalibrationTables {
        let mut b = RecalibrationTables::builder();
        b.insert_read_group(0, M, EmpiricalDatum::new(28.0, 30.0, 10_000))
            .insert_quality_score(0, 30, M, EmpiricalDatum::new(31.0, 30.0, 5_000));
        b.build()
    }

    fn floor_to_tens() -> QuantizationTable {
        let mapping: Vec<u8> = (0..QUANTIZATION_TABLE_SIZE as u8).map(|q| q / 10 * 10).collect();
        QuantizationTable::from_mapping(&mapping).unwrap()
    }

    #[test]
    fn test_worked_example() {
        let tables = worked_example_tables();
        let f = RecalibrationFormula::new(&tables, MAX_RECALIBRATED_Q_SCORE);
        let key = CovariateKey::from(vec![0, 30, -1, -1]);

        let d = f.delta_q(&key, M);
        assert_eq!(d.global, -2.0);
        assert_eq!(d.reported, 3.0);
        assert_eq!(d.covariates, 0.0);
        assert_eq!(f.raw_quality(&key, M), 31);
        assert_eq!(f.recalibrate(&key, M, &floor_to_tens()), 30);
    }

    #[test]
    fn test_covariate_terms_sum() {
        let mut b = RecalibrationTables::builder();
        b.insert_read_group(0, M, EmpiricalDatum::new(28.0, 30.0, 1))
            .insert_quality_score(0, 30, M, EmpiricalDatum::new(31.0, 30.0, 1))
            .insert_covariate(0, 30, 0, 5, M, EmpiricalDatum::new(33.0, 30.0, 1))
            .insert_covariate(0, 30, 1, 9, M, EmpiricalDatum::new(30.0, 30.0, 1));
        let tables = b.build();
        let f = RecalibrationFormula::new(&tables, MAX_RECALIBRATED_Q_SCORE);

        // global -2, reported 3, covariates (33-30-1) + (30-30-1) = 1
        let key = CovariateKey::from(vec![0, 30, 5, 9]);
        assert_eq!(f.delta_q(&key, M).covariates, 1.0);
        assert_eq!(f.raw_quality(&key, M), 32);
    }

    #[test]
    fn test_missing_slot_entry_contributes_zero() {
        let mut b = RecalibrationTables::builder();
        b.insert_covariate(0, 30, 1, 9, M, EmpiricalDatum::new(34.0, 30.0, 1));
        let tables = b.build();
        let f = RecalibrationFormula::new(&tables, MAX_RECALIBRATED_Q_SCORE);

        // slot 0 value 4 has no entry, slot 1 still counts
        let key = CovariateKey::from(vec![0, 30, 4, 9]);
        assert_eq!(f.delta_q(&key, M).covariates, 4.0);
        assert_eq!(f.raw_quality(&key, M), 34);
    }

    #[test]
    fn test_negative_slot_is_skipped() {
        let mut b = RecalibrationTables::builder();
        b.insert_covariate(0, 30, 0, -1, M, EmpiricalDatum::new(50.0, 30.0, 1));
        let tables = b.build();
        let f = RecalibrationFormula::new(&tables, MAX_RECALIBRATED_Q_SCORE);
        let key = CovariateKey::from(vec![0, 30, -1]);
        assert_eq!(f.delta_q(&key, M).covariates, 0.0);
    }

    #[test]
    fn test_empty_tables_return_reported_quality() {
        let tables = RecalibrationTables::default();
        let f = RecalibrationFormula::new(&tables, MAX_RECALIBRATED_Q_SCORE);
        for q in 1..=MAX_RECALIBRATED_Q_SCORE {
            let key = CovariateKey::from(vec![0, i32::from(q), 3, 7]);
            assert_eq!(f.raw_quality(&key, M), q);
        }
    }

    #[test]
    fn test_other_event_tables_are_ignored() {
        let tables = worked_example_tables();
        let f = RecalibrationFormula::new(&tables, MAX_RECALIBRATED_Q_SCORE);
        let key = CovariateKey::from(vec![0, 30]);
        assert_eq!(f.raw_quality(&key, EventModel::Insertion), 30);
    }

    #[test]
    fn test_clamped_to_one_and_max() {
        let mut b = RecalibrationTables::builder();
        b.insert_read_group(0, M, EmpiricalDatum::new(2.0, 40.0, 1))
            .insert_read_group(1, M, EmpiricalDatum::new(140.0, 20.0, 1));
        let tables = b.build();
        let f = RecalibrationFormula::new(&tables, MAX_RECALIBRATED_Q_SCORE);
        assert_eq!(f.raw_quality(&CovariateKey::from(vec![0, 10]), M), 1);
        assert_eq!(f.raw_quality(&CovariateKey::from(vec![1, 40]), M), MAX_RECALIBRATED_Q_SCORE);
    }

    #[test]
    fn test_rounds_half_away_from_zero() {
        let mut b = RecalibrationTables::builder();
        b.insert_read_group(0, M, EmpiricalDatum::new(30.5, 30.0, 1))
            .insert_read_group(1, M, EmpiricalDatum::new(29.4, 30.0, 1));
        let tables = b.build();
        let f = RecalibrationFormula::new(&tables, MAX_RECALIBRATED_Q_SCORE);
        assert_eq!(f.raw_quality(&CovariateKey::from(vec![0, 20]), M), 21);
        assert_eq!(f.raw_quality(&CovariateKey::from(vec![1, 20]), M), 19);
    }
}
