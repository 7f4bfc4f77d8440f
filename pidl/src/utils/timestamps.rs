//! Timestamp and duration helpers.

use chrono::{DateTime, Utc};
use std::time::Instant;

/// A UTC timestamp.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC time as an ISO 8601 formatted string:
/// `YYYY-MM-DDTHH:MM:SS.ffffff+00:00`.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Returns the whole milliseconds elapsed since `start`.
#[must_use]
pub fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_timestamp_shape() {
        let ts = iso_timestamp();
        assert!(ts.contains('T'));
        assert!(ts.ends_with("+00:00"));
    }

    #[test]
    fn test_elapsed_ms_is_monotonic() {
        let start = Instant::now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(elapsed_ms(start) >= 5);
    }
}
