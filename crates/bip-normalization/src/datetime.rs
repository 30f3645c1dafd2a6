//! Lenient timestamp parsing for columns named like dates or times.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Whether a column name suggests a calendar value ("date" or "time", any case).
pub fn is_temporal_column_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("date") || lower.contains("time")
}

/// Parses a timestamp in any of the supported layouts.
///
/// Date-only values resolve to midnight. Slash-separated values are read
/// month-first before day-first. Returns `None` when nothing matches.
///
/// # Examples
///
/// ```
/// use bip_normalization::parse_timestamp;
///
/// let dt = parse_timestamp("12/1/2010 8:26").unwrap();
/// assert_eq!(dt.to_string(), "2010-12-01 08:26:00");
/// assert!(parse_timestamp("2024-01-15").is_some());
/// assert!(parse_timestamp("not-a-date").is_none());
/// ```
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    try_parse_datetime(trimmed).or_else(|| try_parse_date(trimmed).map(|d| d.and_time(NaiveTime::MIN)))
}

fn try_parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let formats = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
        "%m/%d/%Y %H:%M:%S", // US first
        "%m/%d/%Y %H:%M",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
        "%d-%b-%Y %H:%M:%S",
        "%d-%b-%Y %H:%M",
        "%d.%m.%Y %H:%M:%S",
        "%d.%m.%Y %H:%M",
    ];

    formats
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

fn try_parse_date(value: &str) -> Option<NaiveDate> {
    let formats = [
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%m/%d/%Y",
        "%d/%m/%Y",
        "%d-%b-%Y",
        "%d-%B-%Y",
        "%d.%m.%Y",
        "%Y%m%d",
        "%b %d, %Y",
        "%B %d, %Y",
        "%d %b %Y",
        "%d %B %Y",
    ];

    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> String {
        parse_timestamp(s).map(|d| d.to_string()).unwrap_or_default()
    }

    #[test]
    fn test_column_name_detection() {
        assert!(is_temporal_column_name("InvoiceDate"));
        assert!(is_temporal_column_name("created_TIME"));
        assert!(is_temporal_column_name("Timestamp"));
        assert!(!is_temporal_column_name("Quantity"));
    }

    #[test]
    fn test_iso_layouts() {
        assert_eq!(ts("2024-01-15"), "2024-01-15 00:00:00");
        assert_eq!(ts("2024-01-15T10:30:00"), "2024-01-15 10:30:00");
        assert_eq!(ts("2024-01-15 10:30"), "2024-01-15 10:30:00");
        assert_eq!(ts("2024-01-15T10:30:00.250"), "2024-01-15 10:30:00.250");
    }

    #[test]
    fn test_month_first_before_day_first() {
        assert_eq!(ts("01/02/2024"), "2024-01-02 00:00:00");
        // 13 cannot be a month
        assert_eq!(ts("13/02/2024"), "2024-02-13 00:00:00");
    }

    #[test]
    fn test_named_months() {
        assert_eq!(ts("15-Jan-2024"), "2024-01-15 00:00:00");
        assert_eq!(ts("Jan 15, 2024"), "2024-01-15 00:00:00");
    }

    #[test]
    fn test_invalid_values() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("not-a-date").is_none());
        assert!(parse_timestamp("2024-02-30").is_none());
    }
}
