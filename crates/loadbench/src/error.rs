//! Error types for the loading pipeline
//!
//! Everything here is fatal to a run: the coordinator stops at the first
//! error and no result record is written. Recoverable conditions (permissive
//! field parsing, failed resource reads) never become a `LoadError`.

use loadbench_common::CommonError;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, LoadError>;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Connecting, inserting or committing failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Strict parsing rejected a numeric field
    #[error("Row {row}: column '{column}' is not numeric: '{value}'")]
    Parse {
        row: usize,
        column: &'static str,
        value: String,
    },

    /// A batch did not commit within the configured deadline
    #[error("Batch commit did not finish within {secs}s")]
    Timeout { secs: u64 },

    #[error("Loader committed {actual} rows for a batch of {expected}")]
    RowCountMismatch { expected: u64, actual: u64 },
}
