//! Utility functions shared across modules.

use chrono::{DateTime, Utc};

/// Normalize a path string for cross-platform comparison: separators to
/// forward slashes, lowercased.
pub fn normalize_path_for_comparison(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}

/// Format a byte count as a human-readable string (e.g. `"1.5 MB"`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[unit])
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

/// Format a count with thousands separators (e.g. `"12,345"`).
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out.chars().rev().collect()
}

/// Current time as an RFC3339 string, for `indexing_date` document fields.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339()
}

/// Seconds since the Unix epoch as a float, for `crawl_time` fields.
pub fn epoch_secs(instant_elapsed: std::time::Duration) -> f64 {
    instant_elapsed.as_secs_f64()
}

/// Parses an indexed RFC3339 timestamp (`last_modified`/`last_access`/
/// `last_change`) into Unix epoch seconds, mirroring `diskover.py`'s
/// `time.mktime(datetime.strptime(...))` conversion. An unparseable value
/// yields 0.0 rather than failing the whole scroll.
pub fn parse_epoch_secs(value: &str) -> f64 {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.timestamp() as f64)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_windows_path() {
        assert_eq!(
            normalize_path_for_comparison("C:\\Users\\Developer\\project"),
            "c:/users/developer/project"
        );
    }

    #[test]
    fn format_bytes_scales_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn format_number_adds_separators() {
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(42), "42");
    }

    #[test]
    fn parse_epoch_secs_rejects_garbage() {
        assert_eq!(parse_epoch_secs("not a date"), 0.0);
        assert!(parse_epoch_secs("2024-01-01T00:00:00Z") > 0.0);
    }
}
