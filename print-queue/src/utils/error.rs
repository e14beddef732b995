//! Process-level error handling
//!
//! [`AppError`] covers startup and configuration failures. Pipeline
//! errors live next to their modules (`RepoError`, `PrintError`,
//! `NotifyError`) and convert into it at the process boundary.

use crate::db::repository::RepoError;
use std::error::Error as StdError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error(transparent)]
    Repository(#[from] RepoError),

    #[error("Printer unavailable: {0}")]
    PrinterUnavailable(String),
}

impl AppError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Render an error and its `source()` chain, one cause per line
///
/// This is what gets persisted as a job's `error_stack`.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("\ncaused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
