//! Date formats found in the source files.
//!
//! The manifest writes day-first timestamps (`15/03/2025 23:55`); the meal
//! catalog and reference files write ISO dates, sometimes with a time part.

use chrono::{NaiveDate, NaiveDateTime};

const MANIFEST_DATETIME_FORMATS: [&str; 2] = ["%d/%m/%Y %H:%M", "%d/%m/%Y %H:%M:%S"];
const MANIFEST_DATE_FORMAT: &str = "%d/%m/%Y";

/// Manifest departure timestamp. A bare date reads as midnight.
pub fn parse_manifest_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    MANIFEST_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| parse_manifest_date(raw).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

/// Date part of a manifest timestamp.
pub fn parse_manifest_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.split_whitespace().next()?;
    NaiveDate::parse_from_str(date_part, MANIFEST_DATE_FORMAT).ok()
}

/// ISO date, ignoring anything after the first ten characters.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| raw.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike, Weekday};

    #[test]
    fn test_manifest_formats() {
        let dt = parse_manifest_datetime("15/03/2025 23:55").unwrap();
        assert_eq!(dt.weekday(), Weekday::Sat);
        assert_eq!(dt.hour(), 23);
        assert!(parse_manifest_datetime("15/03/2025 23:55:10").is_some());
        assert_eq!(parse_manifest_datetime("15/03/2025").unwrap().hour(), 0);
        assert_eq!(parse_manifest_datetime("2025-03-15 23:55"), None);
        assert_eq!(parse_manifest_date("15/03/2025 23:55"), NaiveDate::from_ymd_opt(2025, 3, 15));
    }

    #[test]
    fn test_iso_dates() {
        assert_eq!(parse_iso_date("2025-03-15"), NaiveDate::from_ymd_opt(2025, 3, 15));
        assert_eq!(parse_iso_date("2025-03-15 00:00:00"), NaiveDate::from_ymd_opt(2025, 3, 15));
        assert_eq!(parse_iso_date("15/03/2025"), None);
    }
}
