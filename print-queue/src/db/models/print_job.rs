//! Print Job Model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default retry ceiling for a new job
pub const DEFAULT_MAX_ATTEMPTS: i64 = 3;

/// Print job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PrintJobStatus {
    Pending,
    Printing,
    Printed,
    Failed,
}

impl PrintJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrintJobStatus::Pending => "pending",
            PrintJobStatus::Printing => "printing",
            PrintJobStatus::Printed => "printed",
            PrintJobStatus::Failed => "failed",
        }
    }

    /// `printed` is the only state nothing may leave
    pub fn is_terminal(&self) -> bool {
        matches!(self, PrintJobStatus::Printed)
    }
}

impl fmt::Display for PrintJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of `print_queue`
///
/// Timestamps are Unix millis. `error_message` / `error_stack` hold the
/// last failure and survive re-queueing until an operator retry clears them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PrintJob {
    pub id: i64,
    pub order_id: i64,
    pub status: PrintJobStatus,
    pub printer_name: Option<String>,
    pub attempts: i64,
    pub max_attempts: i64,
    pub error_message: Option<String>,
    pub error_stack: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub printed_at: Option<i64>,
    pub failed_at: Option<i64>,
}

impl PrintJob {
    pub fn is_failed(&self) -> bool {
        self.status == PrintJobStatus::Failed
    }

    pub fn is_printed(&self) -> bool {
        self.status == PrintJobStatus::Printed
    }

    /// Attempts left before the job escalates to `failed`
    pub fn remaining_attempts(&self) -> i64 {
        (self.max_attempts - self.attempts).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&PrintJobStatus::Printing).unwrap();
        assert_eq!(json, "\"printing\"");
        assert_eq!(PrintJobStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_only_printed_is_terminal() {
        assert!(PrintJobStatus::Printed.is_terminal());
        assert!(!PrintJobStatus::Failed.is_terminal());
        assert!(!PrintJobStatus::Pending.is_terminal());
    }
}
