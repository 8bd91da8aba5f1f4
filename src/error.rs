use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while ingesting tables, summarizing runs or writing artifacts.
///
/// None of them is recoverable within a single report run: the first error
/// aborts the run before any artifact is written.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Input table malformed or inconsistent with the expected schema.
    #[error("shape mismatch in {table}: {detail}")]
    ShapeMismatch { table: String, detail: String },

    /// Zero ground-truth cardinality at a checkpoint where an error is requested.
    #[error("division by zero: exact count is 0 at the {percentage}% checkpoint")]
    DivisionByZero { percentage: f64 },

    /// Expected input absent or unreadable.
    #[error("missing input {}: {source}", .path.display())]
    MissingInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {detail}", .path.display())]
    Config { path: PathBuf, detail: String },

    /// Setting rejected regardless of where it came from (file, flag or default).
    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    /// Artifact could not be written to its final location.
    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ReportError {
    pub(crate) fn shape(table: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            table: table.into(),
            detail: detail.into(),
        }
    }
}
