//! Run-level error types
//!
//! Everything here aborts the run. Per-day problems are not errors: they are
//! recorded as issues in the run report.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] wxkrige_core::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Variable '{0}' is not in the station data")]
    UnknownVariable(String),

    #[error("Duplicate result for {date}, cell index {cell}")]
    DuplicateKey { date: NaiveDate, cell: usize },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Cannot build worker pool: {0}")]
    ThreadPool(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
