//! Generic wide CSV source: one row per station, one column per date.
//!
//! ```text
//! siteID,Latitude,Longitude,2015-07-21,2015-07-22,...
//! ```

use crate::error::{Result, SensorError};
use crate::SensorSource;
use csv::{ReaderBuilder, StringRecord, Trim};
use ssu_core::{SensorRecord, SiteOutcome, SiteSkip, SkipReason, TimeWindow, ValueRange};
use ssu_utils::dates::parse_date;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Columns before the first date column.
const FIXED_COLUMNS: usize = 3;

pub struct WideCsvSource {
    path: PathBuf,
    station_ids: Option<Vec<String>>,
}

impl WideCsvSource {
    /// `station_ids` restricts output to the listed stations.
    pub fn new(path: &Path, station_ids: Option<Vec<String>>) -> Self {
        WideCsvSource {
            path: path.to_path_buf(),
            station_ids,
        }
    }

    /// Column holding values for `date`. Headers are compared as calendar
    /// dates; time of day plays no part.
    fn date_column(header: &StringRecord, date: NaiveDate) -> Option<usize> {
        header
            .iter()
            .enumerate()
            .skip(FIXED_COLUMNS)
            .find(|(_, h)| parse_date(h).map(|d| d == date).unwrap_or(false))
            .map(|(i, _)| i)
    }

    fn wanted(&self, station: &str) -> bool {
        match &self.station_ids {
            Some(ids) => ids.iter().any(|id| id == station),
            None => true,
        }
    }
}

fn row_outcome(row: &StringRecord, column: usize) -> std::result::Result<SensorRecord, SkipReason> {
    let field = |i: usize| -> std::result::Result<f64, SkipReason> {
        let value = row.get(i).unwrap_or_default();
        value
            .parse::<f64>()
            .map_err(|_| SkipReason::Unparseable(value.to_string()))
    };
    let latitude = field(1)?;
    let longitude = field(2)?;
    let value = field(column)?;
    SensorRecord::checked(
        row.get(0).unwrap_or_default(),
        latitude,
        longitude,
        value,
        &ValueRange::VOLUMETRIC,
    )
}

impl SensorSource for WideCsvSource {
    fn describe(&self) -> String {
        format!("station CSV {}", self.path.display())
    }

    fn extract(&self, window: &TimeWindow) -> Result<Vec<SiteOutcome>> {
        let mut rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_path(&self.path)?;
        let header = rdr.headers()?.clone();
        let date = window.date();
        let column = Self::date_column(&header, date).ok_or(SensorError::NoDateColumn(date))?;

        let mut outcomes = Vec::new();
        for row in rdr.records() {
            let row = row?;
            let station = row.get(0).unwrap_or_default().to_string();
            if !self.wanted(&station) {
                continue;
            }
            outcomes.push(row_outcome(&row, column).map_err(|reason| SiteSkip {
                site_id: station,
                reason,
            }));
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const STATIONS: &str = "\
siteID,Latitude,Longitude,2015-07-21,2015-07-22
s1,38.1,-120.1,0.11,0.21
s2,38.2,-120.2,0.12,0.50
s3,38.3,-120.3,0.13,0.499999
s4,38.4,-120.4,0.14,
";

    fn window(day: u32, hour: u32) -> TimeWindow {
        let start = NaiveDate::from_ymd_opt(2015, 7, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        TimeWindow::new(start, start + chrono::TimeDelta::try_hours(6).unwrap())
    }

    fn source(ids: Option<Vec<String>>) -> (TempDir, WideCsvSource) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stations.csv");
        std::fs::write(&path, STATIONS).unwrap();
        let source = WideCsvSource::new(&path, ids);
        (dir, source)
    }

    #[test]
    fn test_upper_bound_excluded() {
        let (_dir, source) = source(None);
        let outcomes = source.extract(&window(22, 0)).unwrap();
        assert_eq!(outcomes.len(), 4);
        assert!((outcomes[0].as_ref().unwrap().value - 0.21).abs() < 1e-12);
        assert_eq!(
            outcomes[1].as_ref().unwrap_err().reason,
            SkipReason::OutOfRange(0.5)
        );
        assert!(outcomes[2].is_ok());
        assert!(matches!(
            outcomes[3].as_ref().unwrap_err().reason,
            SkipReason::Unparseable(_)
        ));
    }

    #[test]
    fn test_date_matched_by_calendar_day() {
        let (_dir, source) = source(None);
        let outcomes = source.extract(&window(21, 18)).unwrap();
        assert!((outcomes[0].as_ref().unwrap().value - 0.11).abs() < 1e-12);
    }

    #[test]
    fn test_station_whitelist() {
        let (_dir, source) = source(Some(vec!["s3".into(), "s1".into()]));
        let outcomes = source.extract(&window(22, 0)).unwrap();
        let ids: Vec<&str> = outcomes
            .iter()
            .map(|o| o.as_ref().unwrap().site_id.as_str())
            .collect();
        assert_eq!(ids, vec!["s1", "s3"]);
    }

    #[test]
    fn test_missing_date_column() {
        let (_dir, source) = source(None);
        let err = source.extract(&window(23, 0)).unwrap_err();
        assert!(matches!(err, SensorError::NoDateColumn(_)));
    }
}
