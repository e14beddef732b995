//! Utilities: error type, logging setup, time and money helpers

pub mod error;
pub mod logger;
pub mod money;
pub mod time;

pub use error::{AppError, AppResult, error_chain};
