//! Timestamp helpers shared by conflict resolution and change detection.

// dependencies
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Current UTC time in ISO-8601 form, second precision.
pub fn now_iso8601() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Parse the timestamp shapes that show up in scan exports: RFC 3339,
/// naive `Y-m-d H:M:S`, and bare dates. Returns `None` for anything else.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(parsed.and_utc());
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(parsed.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_shapes() {
        assert!(parse_timestamp("2026-07-31T12:30:00Z").is_some());
        assert!(parse_timestamp("2026-07-31 12:30:00").is_some());
        assert!(parse_timestamp("2026-07-31").is_some());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn ordering_follows_time() {
        let early = parse_timestamp("2026-01-01T00:00:00Z").unwrap();
        let late = parse_timestamp("2026-06-15 08:00:00").unwrap();
        assert!(early < late);
    }
}
