//! Shared utility functions for soil moisture upscaling crates.

/// Date utility functions
pub mod dates {
    use chrono::{NaiveDate, NaiveDateTime};

    /// Format used for layer dates and wide-CSV column headers: "YYYY-MM-DD"
    pub const DATE_FORMAT: &str = "%Y-%m-%d";

    /// Format used for run start/end times: "YYYY-MM-DD hh:mm:ss"
    pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    /// Compact format used in output file names and result tables: "YYYYMMDD"
    pub const COMPACT_FORMAT: &str = "%Y%m%d";

    /// Format a date as "YYYYMMDD"
    pub fn format_compact(date: &NaiveDate) -> String {
        date.format(COMPACT_FORMAT).to_string()
    }

    /// Format a timestamp as "YYYY-MM-DD hh:mm:ss" (SQLite text timestamp)
    pub fn format_datetime(ts: &NaiveDateTime) -> String {
        ts.format(DATETIME_FORMAT).to_string()
    }

    /// Parse a date string in "YYYY-MM-DD" format
    pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
        Ok(NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)?)
    }

    /// Parse a timestamp string in "YYYY-MM-DD hh:mm:ss" format
    pub fn parse_datetime(s: &str) -> anyhow::Result<NaiveDateTime> {
        Ok(NaiveDateTime::parse_from_str(s.trim(), DATETIME_FORMAT)?)
    }

    /// Parse a two-digit-year compact date ("YYMMDD"), as embedded in
    /// radar composite file names.
    pub fn parse_short_compact(s: &str) -> anyhow::Result<NaiveDate> {
        Ok(NaiveDate::parse_from_str(s, "%y%m%d")?)
    }

    /// Midnight of the given date.
    pub fn start_of_day(date: &NaiveDate) -> NaiveDateTime {
        date.and_time(chrono::NaiveTime::MIN)
    }

    /// Absolute difference between two timestamps in whole seconds.
    pub fn abs_diff_seconds(a: &NaiveDateTime, b: &NaiveDateTime) -> i64 {
        (*a - *b).num_seconds().abs()
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::NaiveDate;

        #[test]
        fn test_format_and_parse() {
            let date = NaiveDate::from_ymd_opt(2015, 7, 22).unwrap();
            assert_eq!(parse_date(" 2015-07-22 ").unwrap(), date);
            assert!(parse_date("2015/07/22").is_err());
            assert_eq!(format_compact(&date), "20150722");
        }

        #[test]
        fn test_parse_datetime() {
            let ts = parse_datetime("2015-07-22 06:30:00").unwrap();
            assert_eq!(format_datetime(&ts), "2015-07-22 06:30:00");
            assert!(parse_datetime("2015-07-22").is_err());
        }

        #[test]
        fn test_parse_short_compact() {
            let date = parse_short_compact("150720").unwrap();
            assert_eq!(date, NaiveDate::from_ymd_opt(2015, 7, 20).unwrap());
            assert!(parse_short_compact("hh").is_err());
        }

        #[test]
        fn test_abs_diff_seconds() {
            let a = start_of_day(&NaiveDate::from_ymd_opt(2015, 7, 22).unwrap());
            let b = start_of_day(&NaiveDate::from_ymd_opt(2015, 7, 20).unwrap());
            assert_eq!(abs_diff_seconds(&a, &b), 2 * 86_400);
            assert_eq!(abs_diff_seconds(&b, &a), 2 * 86_400);
        }
    }
}

/// Filesystem helpers
pub mod fs {
    use std::path::Path;

    /// Create a directory (and its parents) if it does not already exist.
    pub fn ensure_dir(path: &Path) -> anyhow::Result<()> {
        if !path.is_dir() {
            std::fs::create_dir_all(path)?;
        }
        Ok(())
    }

}
