//! Recalibration settings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::quality::{
    MAX_QUAL_SCORE, MAX_RECALIBRATED_Q_SCORE, MAXIMUM_RECALIBRATED_READ_LENGTH,
    MIN_USABLE_Q_SCORE,
};
use crate::quantization::QuantizationLevels;

/// Settings fixed for the lifetime of a recalibrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecalibrationConfig {
    /// Reads longer than this are rejected untouched.
    pub max_read_length: usize,
    /// Bases reported below this quality are passed through.
    pub min_usable_quality: u8,
    /// Upper clamp for recalibrated qualities.
    pub max_recalibrated_quality: u8,
    pub quantization: QuantizationLevels,
}

impl Default for RecalibrationConfig {
    fn default() -> Self {
        Self {
            max_read_length: MAXIMUM_RECALIBRATED_READ_LENGTH,
            min_usable_quality: MIN_USABLE_Q_SCORE,
            max_recalibrated_quality: MAX_RECALIBRATED_Q_SCORE,
            quantization: QuantizationLevels::Native,
        }
    }
}

impl RecalibrationConfig {
    /// Load from a JSON file; omitted fields keep their defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_read_length == 0 {
            return Err(Error::Config("max_read_length must be positive".to_string()));
        }
        if self.min_usable_quality == 0 {
            return Err(Error::Config(
                "min_usable_quality must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_QUAL_SCORE).contains(&self.max_recalibrated_quality) {
            return Err(Error::Config(format!(
                "max_recalibrated_quality must be in 1..={MAX_QUAL_SCORE}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let c = RecalibrationConfig::default();
        assert_eq!(c.max_read_length, 5000);
        assert_eq!(c.min_usable_quality, 6);
        assert_eq!(c.max_recalibrated_quality, 93);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_from_path_partial_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"max_read_length": 250, "quantization": {{"levels": 8}}}}"#).unwrap();
        let c = RecalibrationConfig::from_path(f.path()).unwrap();
        assert_eq!(c.max_read_length, 250);
        assert_eq!(c.quantization, QuantizationLevels::Levels(8));
        assert_eq!(c.min_usable_quality, MIN_USABLE_Q_SCORE);
    }

    #[test]
    fn test_from_path_rejects_invalid_values() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"max_recalibrated_quality": 0}}"#).unwrap();
        assert!(matches!(
            RecalibrationConfig::from_path(f.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = RecalibrationConfig::from_path(Path::new("/nonexistent/qrecal.json"));
        assert!(matches!(err, Err(Error::Io { .. })));
    }
}
