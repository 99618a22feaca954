//! Recalibration report loading.
//!
//! A report is a JSON document (gzip-compressed when the path ends in `.gz`)
//! holding the pretrained empirical tables, the covariate list used to build
//! keys, and the quantization fitted at training time.
//!
//! # Format
//!
//! ```json
//! {
//!   "covariates": ["ReadGroup", "QualityScore", "Context", "Cycle"],
//!   "read_groups": ["RG1"],
//!   "quantization": { "levels": 16, "histogram": [...94], "quantized": [...94] },
//!   "read_group_table":    [{ "read_group": "RG1", "event": "M", ... }],
//!   "quality_score_table": [{ "read_group": "RG1", "quality": 30, "event": "M", ... }],
//!   "covariate_table":     [{ "read_group": "RG1", "quality": 30, "covariate": "Cycle", "value": 12, "event": "M", ... }]
//! }
//! ```
//!
//! Every row carries `empirical_quality`, `estimated_reported_quality` and
//! `observations`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read as _, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use crate::covariates::{Covariate, StandardCovariates};
use crate::error::{Error, Result};
use crate::event::EventModel;
use crate::quality::MAX_QUAL_SCORE;
use crate::quantization::{QuantizationInfo, QuantizationTable};
use crate::tables::{EmpiricalDatum, RecalibrationTables, TableCounts};

// ---------------------------------------------------------------------------
// On-disk layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFile {
    pub covariates: Vec<String>,
    pub read_groups: Vec<String>,
    pub quantization: QuantizationSection,
    #[serde(default)]
    pub read_group_table: Vec<ReadGroupRow>,
    #[serde(default)]
    pub quality_score_table: Vec<QualityScoreRow>,
    #[serde(default)]
    pub covariate_table: Vec<CovariateRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantizationSection {
    pub levels: usize,
    pub histogram: Vec<u64>,
    pub quantized: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadGroupRow {
    pub read_group: String,
    pub event: EventModel,
    pub empirical_quality: f64,
    pub estimated_reported_quality: f64,
    pub observations: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityScoreRow {
    pub read_group: String,
    pub quality: u8,
    pub event: EventModel,
    pub empirical_quality: f64,
    pub estimated_reported_quality: f64,
    pub observations: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CovariateRow {
    pub read_group: String,
    pub quality: u8,
    pub covariate: String,
    pub value: i32,
    pub event: EventModel,
    pub empirical_quality: f64,
    pub estimated_reported_quality: f64,
    pub observations: u64,
}

// ---------------------------------------------------------------------------
// Parsed report
// ---------------------------------------------------------------------------

/// A validated report, ready to build a recalibrator from.
#[derive(Debug, Clone)]
pub struct RecalibrationReport {
    covariates: Vec<String>,
    read_groups: Vec<String>,
    quantization: QuantizationInfo,
    tables: RecalibrationTables,
}

impl RecalibrationReport {
    /// Load a report from disk. Paths ending in `.gz` are decompressed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let mut raw = String::new();
        let gz = path.extension().is_some_and(|ext| ext == "gz");
        if gz {
            GzDecoder::new(BufReader::new(file))
                .read_to_string(&mut raw)
                .map_err(|e| Error::io(path, e))?;
        } else {
            BufReader::new(file)
                .read_to_string(&mut raw)
                .map_err(|e| Error::io(path, e))?;
        }
        let report = Self::from_json(&raw)?;
        let counts = report.tables.counts();
        log::debug!(
            "loaded report {}: {} read groups, {} covariates, {}/{}/{} table cells",
            path.display(),
            report.read_groups.len(),
            report.covariates.len(),
            counts.read_group,
            counts.quality_score,
            counts.covariate
        );
        Ok(report)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: ReportFile = serde_json::from_str(raw)
            .map_err(|e| Error::Report(format!("failed to parse report JSON: {e}")))?;
        Self::from_file(file)
    }

    /// Validate the on-disk layout and freeze its tables.
    pub fn from_file(file: ReportFile) -> Result<Self> {
        let optional = StandardCovariates::new(&file.covariates, Vec::new())?
            .optional()
            .to_vec();

        let mut rg_index: HashMap<String, i32> = HashMap::new();
        for (i, rg) in file.read_groups.iter().enumerate() {
            if rg_index.insert(rg.clone(), i as i32).is_some() {
                return Err(Error::Report(format!("duplicate read group {rg}")));
            }
        }
        let lookup_rg = |name: &str| {
            rg_index
                .get(name)
                .copied()
                .ok_or_else(|| Error::UnknownReadGroup(name.to_string()))
        };
        let slot_of = |name: &str| {
            let covariate = Covariate::from_name(name)?;
            optional
                .iter()
                .position(|c| *c == covariate)
                .ok_or_else(|| Error::UnknownCovariate(name.to_string()))
        };
        let check_quality = |q: u8| {
            if q > MAX_QUAL_SCORE {
                Err(Error::Report(format!("quality {q} above {MAX_QUAL_SCORE}")))
            } else {
                Ok(i32::from(q))
            }
        };

        let mut builder = RecalibrationTables::builder();
        for row in &file.read_group_table {
            builder.insert_read_group(
                lookup_rg(&row.read_group)?,
                row.event,
                EmpiricalDatum::new(row.empirical_quality, row.estimated_reported_quality, row.observations),
            );
        }
        for row in &file.quality_score_table {
            builder.insert_quality_score(
                lookup_rg(&row.read_group)?,
                check_quality(row.quality)?,
                row.event,
                EmpiricalDatum::new(row.empirical_quality, row.estimated_reported_quality, row.observations),
            );
        }
        for row in &file.covariate_table {
            if row.value < 0 {
                return Err(Error::Report(format!(
                    "{} row has negative value {}",
                    row.covariate, row.value
                )));
            }
            builder.insert_covariate(
                lookup_rg(&row.read_group)?,
                check_quality(row.quality)?,
                slot_of(&row.covariate)?,
                row.value,
                row.event,
                EmpiricalDatum::new(row.empirical_quality, row.estimated_reported_quality, row.observations),
            );
        }

        let native = QuantizationTable::from_mapping(&file.quantization.quantized)?;
        let quantization =
            QuantizationInfo::new(file.quantization.levels, file.quantization.histogram, native)?;

        Ok(Self {
            covariates: file.covariates,
            read_groups: file.read_groups,
            quantization,
            tables: builder.build(),
        })
    }

    pub fn covariates(&self) -> &[String] {
        &self.covariates
    }

    pub fn read_groups(&self) -> &[String] {
        &self.read_groups
    }

    pub fn quantization(&self) -> &QuantizationInfo {
        &self.quantization
    }

    pub fn tables(&self) -> &RecalibrationTables {
        &self.tables
    }

    pub fn counts(&self) -> TableCounts {
        self.tables.counts()
    }

    /// Reference extractor for this report's covariate list.
    pub fn covariate_extractor(&self) -> Result<StandardCovariates> {
        StandardCovariates::new(&self.covariates, self.read_groups.clone())
    }

    /// Split into tables and quantization, consuming the report.
    pub fn into_parts(self) -> (RecalibrationTables, QuantizationInfo) {
        (self.tables, self.quantization)
    }
}

/// Write a report layout as pretty JSON.
pub fn write_report<W: Write>(file: &ReportFile, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, file)
        .map_err(|e| Error::Report(format!("failed to serialize report: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantization::QUANTIZATION_TABLE_SIZE;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    fn sample_file() -> ReportFile {
        ReportFile {
            covariates: ["ReadGroup", "QualityScore", "Context", "Cycle"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            read_groups: vec!["RG1".to_string(), "RG2".to_string()],
            quantization: QuantizationSection {
                levels: QUANTIZATION_TABLE_SIZE,
                histogram: vec![10; QUANTIZATION_TABLE_SIZE],
                quantized: (0..QUANTIZATION_TABLE_SIZE as u8).collect(),
            },
            read_group_table: vec![ReadGroupRow {
                read_group: "RG2".to_string(),
                event: EventModel::Substitution,
                empirical_quality: 28.0,
                estimated_reported_quality: 30.0,
                observations: 1000,
            }],
            quality_score_table: vec![QualityScoreRow {
                read_group: "RG2".to_string(),
                quality: 30,
                event: EventModel::Substitution,
                empirical_quality: 31.0,
                estimated_reported_quality: 30.0,
                observations: 500,
            }],
            covariate_table: vec![CovariateRow {
                read_group: "RG2".to_string(),
                quality: 30,
                covariate: "Cycle".to_string(),
                value: 3,
                event: EventModel::Deletion,
                empirical_quality: 40.0,
                estimated_reported_quality: 45.0,
                observations: 12,
            }],
        }
    }

    #[test]
    fn test_from_file_indexes_rows() {
        let report = RecalibrationReport::from_file(sample_file()).unwrap();
        let t = report.tables();
        assert_eq!(t.read_group(1, EventModel::Substitution).unwrap().empirical_quality, 28.0);
        assert_eq!(t.quality_score(1, 30, EventModel::Substitution).unwrap().observation_count, 500);
        // "Cycle" is the second optional covariate → slot 1
        assert!(t.covariate(1, 30, 1, 3, EventModel::Deletion).is_some());
        assert_eq!(
            report.counts(),
            TableCounts {
                read_group: 1,
                quality_score: 1,
                covariate: 1
            }
        );
    }

    #[test]
    fn test_rejects_bad_covariate_order() {
        let mut f = sample_file();
        f.covariates.swap(0, 1);
        assert!(matches!(RecalibrationReport::from_file(f), Err(Error::Report(_))));
    }

    #[test]
    fn test_rejects_unknown_read_group_row() {
        let mut f = sample_file();
        f.read_group_table[0].read_group = "RG9".to_string();
        assert!(matches!(
            RecalibrationReport::from_file(f),
            Err(Error::UnknownReadGroup(_))
        ));
    }

    #[test]
    fn test_rejects_unlisted_covariate_row() {
        let mut f = sample_file();
        f.covariate_table[0].covariate = "Homopolymer".to_string();
        assert!(matches!(
            RecalibrationReport::from_file(f),
            Err(Error::UnknownCovariate(_))
        ));
    }

    #[test]
    fn test_row_names_resolve_like_the_covariate_list() {
        let mut f = sample_file();
        f.covariates = ["ReadGroupCovariate", "QualityScoreCovariate", "ContextCovariate", "CycleCovariate"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        // row still says "Cycle"
        let report = RecalibrationReport::from_file(f).unwrap();
        assert!(report.tables().covariate(1, 30, 1, 3, EventModel::Deletion).is_some());

        let mut f = sample_file();
        f.covariate_table[0].covariate = "CycleCovariate".to_string();
        let report = RecalibrationReport::from_file(f).unwrap();
        assert!(report.tables().covariate(1, 30, 1, 3, EventModel::Deletion).is_some());
    }

    #[test]
    fn test_rejects_duplicate_covariates() {
        let mut f = sample_file();
        f.covariates.push("CycleCovariate".to_string());
        assert!(matches!(RecalibrationReport::from_file(f), Err(Error::Report(_))));
    }

    #[test]
    fn test_rejects_inconsistent_quantization_levels() {
        let mut f = sample_file();
        f.quantization.levels = 16;
        assert!(matches!(
            RecalibrationReport::from_file(f),
            Err(Error::InvalidQuantization(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_read_groups() {
        let mut f = sample_file();
        f.read_groups.push("RG1".to_string());
        assert!(matches!(RecalibrationReport::from_file(f), Err(Error::Report(_))));
    }

    #[test]
    fn test_rejects_invalid_quantization() {
        let mut f = sample_file();
        f.quantization.quantized.pop();
        assert!(matches!(
            RecalibrationReport::from_file(f),
            Err(Error::InvalidQuantization(_))
        ));
    }

    #[test]
    fn test_from_path_plain_and_gzip() {
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("recal.json");
        write_report(&sample_file(), File::create(&plain).unwrap()).unwrap();
        let a = RecalibrationReport::from_path(&plain).unwrap();

        let gz = dir.path().join("recal.json.gz");
        let mut enc = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        write_report(&sample_file(), &mut enc).unwrap();
        enc.finish().unwrap();
        let b = RecalibrationReport::from_path(&gz).unwrap();

        assert_eq!(a.counts(), b.counts());
        assert_eq!(a.read_groups(), b.read_groups());
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = RecalibrationReport::from_path(Path::new("/nonexistent/recal.json"));
        assert!(matches!(err, Err(Error::Io { .. })));
    }

    #[test]
    fn test_garbage_json_is_report_error() {
        assert!(matches!(
            RecalibrationReport::from_json("{not json"),
            Err(Error::Report(_))
        ));
    }

    #[test]
    fn test_covariate_extractor_matches_list() {
        let report = RecalibrationReport::from_file(sample_file()).unwrap();
        let ex = report.covariate_extractor().unwrap();
        assert_eq!(ex.optional(), &[Covariate::Context, Covariate::Cycle]);
    }
}
