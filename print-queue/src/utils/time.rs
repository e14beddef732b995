//! Time helpers
//!
//! Storage uses `i64` Unix millis; receipts render in the shop's time zone.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Current time as Unix millis
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Unix millis → local date and time strings (`dd/mm/YYYY`, `HH:MM`)
pub fn local_date_time(millis: i64, tz: Tz) -> (String, String) {
    let dt = DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .with_timezone(&tz);
    (dt.format("%d/%m/%Y").to_string(), dt.format("%H:%M").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_date_time_rome() {
        // 2024-07-15 10:30 UTC is 12:30 in Rome (CEST)
        let millis = 1_721_039_400_000;
        let (date, time) = local_date_time(millis, chrono_tz::Europe::Rome);
        assert_eq!(date, "15/07/2024");
        assert_eq!(time, "12:30");
    }
}
