// THEORY:
// Every failure has a home: `ConfigError` for settings that can never work,
// `SourceError` for frames that cannot be read or written, `RecordsError` for
// CSV files that break the record contract. `Error` wraps all three for
// callers that drive a whole run.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for operations that can fail anywhere in the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration problems. All of these are fatal and surface before any
/// frame is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported color profile `{0}` (expected `white` or `red`)")]
    UnsupportedColorProfile(String),

    #[error("invalid configuration value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Frame acquisition and frame output failures.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open input {path}: {reason}")]
    Unopenable { path: PathBuf, reason: String },

    #[error("failed to decode frame {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode frame {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("frame has dimensions {found:?}, source declared {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },

    #[error("video backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    pub fn unopenable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Unopenable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Failures reading or writing the tabular record sequence.
#[derive(Debug, Error)]
pub enum RecordsError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame indices must be contiguous from 0: expected {expected}, found {found}")]
    NonContiguous { expected: u64, found: u64 },

    #[error("row for frame {frame} has visible={value}, expected 0 or 1")]
    InvalidVisibility { frame: u64, value: u8 },
}

/// Top-level error for pipeline runs and batch jobs.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Records(#[from] RecordsError),

    #[error("batch worker for `{job}` failed: {reason}")]
    Worker { job: String, reason: String },
}
