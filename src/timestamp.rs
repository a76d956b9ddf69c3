//! Timestamp helpers. All persisted times are ISO-8601 UTC strings so they
//! sort lexicographically in SQL.

use chrono::{SecondsFormat, Utc};

/// Current time as an ISO-8601 UTC string (second precision, `Z` suffix).
#[must_use]
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current Unix time in milliseconds. Used for cache-busting query params.
#[must_use]
pub fn unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_iso_shape() {
        let stamp = now_iso();
        assert!(stamp.ends_with('Z'), "expected UTC suffix: {stamp}");
        assert_eq!(stamp.len(), "2025-01-01T00:00:00Z".len());
    }

    #[test]
    fn test_iso_timestamps_sort_lexicographically() {
        assert!("2025-01-01T00:00:00Z" < "2025-06-01T00:00:00Z");
    }
}
