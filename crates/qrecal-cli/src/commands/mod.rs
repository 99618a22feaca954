pub mod apply;
pub mod inspect;

use std::path::Path;

use qrecal_core::{QuantizationLevels, RecalibrationConfig, Result};

/// Build the effective settings: file values first, then command-line overrides.
pub fn load_config(
    config_path: Option<&str>,
    quantize: Option<i32>,
    max_read_length: Option<usize>,
) -> Result<RecalibrationConfig> {
    let mut config = match config_path {
        Some(path) => RecalibrationConfig::from_path(Path::new(path))?,
        None => RecalibrationConfig::default(),
    };
    if quantize.is_some() {
        config.quantization = QuantizationLevels::from_arg(quantize);
    }
    if let Some(n) = max_read_length {
        config.max_read_length = n;
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let c = load_config(None, None, None).unwrap();
        assert_eq!(c, RecalibrationConfig::default());
    }

    #[test]
    fn test_flags_override_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"max_read_length": 300, "quantization": "disabled"}}"#).unwrap();
        let path = f.path().to_str().unwrap().to_string();

        let from_file = load_config(Some(&path), None, None).unwrap();
        assert_eq!(from_file.max_read_length, 300);
        assert_eq!(from_file.quantization, QuantizationLevels::Disabled);

        let overridden = load_config(Some(&path), Some(8), Some(1000)).unwrap();
        assert_eq!(overridden.max_read_length, 1000);
        assert_eq!(overridden.quantization, QuantizationLevels::Levels(8));
    }

    #[test]
    fn test_zero_length_override_rejected() {
        assert!(load_config(None, None, Some(0)).is_err());
    }
}
