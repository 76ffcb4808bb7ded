use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a whole source for a window. Problems with a single
/// site are reported as [`ssu_core::SkipReason`] instead.
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Column \"{column}\" missing from {file}")]
    MissingColumn { file: PathBuf, column: String },

    #[error("No column for date {0}")]
    NoDateColumn(NaiveDate),
}

pub type Result<T> = std::result::Result<T, SensorError>;
