//! # qrecal-core
//!
//! **Base quality score recalibration from empirical error tables.**
//!
//! Sequencing instruments report per-base qualities with systematic bias.
//! `qrecal-core` corrects them using statistics fitted on training data: a
//! hierarchical delta-Q formula over read group, reported quality, and any
//! optional covariates, memoized in a cache shared by every worker thread.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use qrecal_core::{BaseRecalibrator, Read, RecalibrationConfig};
//!
//! let recal = BaseRecalibrator::from_report_path(
//!     Path::new("recal.json"),
//!     RecalibrationConfig::default(),
//! )?;
//!
//! let mut read = Read::new("read1", "RG1", "ACGTACGT", vec![30; 8]);
//! recal.recalibrate_read(&mut read)?;
//! println!("{:?}", read.base_qualities);
//! # Ok::<(), qrecal_core::Error>(())
//! ```
//!
//! ## Architecture
//!
//! Report → Tables + Quantization → Formula → Cache → Read buffers
//!
//! - [`RecalibrationTables`]: immutable statistics at three levels of specificity.
//! - [`QuantizationTable`]: bucketing of the final quality.
//! - [`RecalibrationFormula`]: pure key → quality computation.
//! - [`BaseRecalibrator`]: per-read orchestration over all three
//!   [`EventModel`]s with a shared [`RecalibrationCache`].

pub mod cache;
pub mod config;
pub mod covariates;
pub mod engine;
pub mod error;
pub mod event;
pub mod formula;
pub mod quality;
pub mod quantization;
pub mod read;
pub mod report;
pub mod tables;

pub use cache::{CacheKey, CacheStats, RecalibrationCache, TableFingerprint};
pub use config::RecalibrationConfig;
pub use covariates::{Covariate, CovariateExtractor, CovariateKey, NOT_APPLICABLE, StandardCovariates};
pub use engine::BaseRecalibrator;
pub use error::{Error, Result};
pub use event::EventModel;
pub use formula::{DeltaQ, RecalibrationFormula};
pub use quality::{
    DEFAULT_INDEL_QUALITY, MAX_QUAL_SCORE, MAX_RECALIBRATED_Q_SCORE,
    MAXIMUM_RECALIBRATED_READ_LENGTH, MIN_USABLE_Q_SCORE,
};
pub use quantization::{QuantizationInfo, QuantizationLevels, QuantizationTable};
pub use read::Read;
pub use report::RecalibrationReport;
pub use tables::{EmpiricalDatum, RecalibrationTables, TableCounts};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
