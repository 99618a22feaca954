//! Error types for recalibration.
//!
//! A missing table entry is never an error: sparse training data is normal and
//! contributes nothing to the formula. Everything here is fatal to the call
//! that raised it, and nothing is retried.

use std::path::PathBuf;

use thiserror::Error;

use crate::event::EventModel;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid recalibration report: {0}")]
    Report(String),

    #[error("Read {name} has {length} bases, above the configured maximum of {max}")]
    ReadTooLong {
        name: String,
        length: usize,
        max: usize,
    },

    #[error("Read {name}: {event} quality buffer has {actual} entries, expected {expected}")]
    QualityLengthMismatch {
        name: String,
        event: EventModel,
        expected: usize,
        actual: usize,
    },

    #[error("Read {name}: extractor produced {actual} {event} keys for {expected} bases")]
    KeyCountMismatch {
        name: String,
        event: EventModel,
        expected: usize,
        actual: usize,
    },

    #[error("Covariate key at offset {offset} has {actual} values, expected {expected}")]
    KeyArity {
        offset: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Covariate key at offset {offset} is malformed: {reason}")]
    MalformedKey { offset: usize, reason: String },

    #[error("Invalid quantization map: {0}")]
    InvalidQuantization(String),

    #[error("Unknown covariate: {0}")]
    UnknownCovariate(String),

    #[error("Unknown read group: {0}")]
    UnknownReadGroup(String),

    #[error("Recalibration cache was built for table set {expected}, not {actual}")]
    CacheMismatch { expected: String, actual: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
