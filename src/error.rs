//! Error types for hpo-traces
//!
//! Malformed or inconsistent input is a hard failure: aggregate ranks would
//! otherwise silently reflect corrupted data.

use std::path::PathBuf;

use thiserror::Error;

use crate::record::Axis;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// hpo-traces error types
#[derive(Error, Debug)]
pub enum Error {
    /// Neither recognized raw-record layout exists at the path
    #[error("Unrecognized result format at {path}\nExpected a neps_root_directory or hpbandster_root_directory")]
    Format {
        /// Directory that was inspected
        path: PathBuf,
    },

    /// A results directory yielded zero records
    #[error("No results found in {path}")]
    MissingData {
        /// Directory that was read
        path: PathBuf,
    },

    /// Record was already stitched to a lower bracket (data-integrity bug)
    #[error("Record {id}_{bracket:?} already continues from another evaluation")]
    ContinuationExists {
        /// Configuration identifier
        id: u64,
        /// Bracket of the offending record
        bracket: Option<u32>,
    },

    /// Requested metric or strategy is not supported
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Worker identifiers do not fit the requested accumulation mode
    #[error("Inconsistent worker identifiers: {0}")]
    InconsistentWorkers(String),

    /// Record has no value for a derived axis
    #[error("Record {id} has no value for axis `{axis}`")]
    MissingAxis {
        /// Axis that was requested
        axis: Axis,
        /// Configuration identifier of the record
        id: u64,
    },

    /// Unknown seed, algorithm or benchmark key
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage error (Parquet/Arrow)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decode/encode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML decode error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}
