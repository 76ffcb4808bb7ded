//! Training tables from sensor networks.
//!
//! Each network is a [`SensorSource`] producing one outcome per site for a
//! time window: a [`SensorRecord`] or the reason the site was skipped.
//! [`assemble`] writes the records of one window to the training CSV read
//! by the point extractor.
//!
//! Sources:
//! - [`db::DatabaseSource`] - SoilSCAPE SQLite database with stored calibrations
//! - [`txson::TxsonSource`] - TxSON per-logger `.dat` files
//! - [`wide_csv::WideCsvSource`] - one row per station, one column per date

pub mod calibration;
pub mod db;
pub mod error;
pub mod schema;
pub mod txson;
pub mod wide_csv;

pub use error::{Result, SensorError};

use serde::Serialize;
use ssu_core::{SensorRecord, SiteOutcome, SourceConfig, TimeWindow};
use std::path::Path;

/// A network that can produce averaged sensor records for a window.
pub trait SensorSource {
    /// Short description for log messages
    fn describe(&self) -> String;

    /// One outcome per configured site, in configuration order.
    fn extract(&self, window: &TimeWindow) -> Result<Vec<SiteOutcome>>;
}

/// Open the source named in the configuration.
pub fn from_config(config: &SourceConfig) -> Result<Box<dyn SensorSource>> {
    let source: Box<dyn SensorSource> = match config {
        SourceConfig::Database {
            sqlite_db,
            sensor_ids,
            sensor_number,
        } => Box::new(db::DatabaseSource::open(
            sqlite_db,
            sensor_ids.clone(),
            *sensor_number,
        )?),
        SourceConfig::TxSon {
            dir,
            site_ids,
            sensor_number,
        } => Box::new(txson::TxsonSource::new(
            dir,
            site_ids.clone(),
            *sensor_number,
        )?),
        SourceConfig::WideCsv { path, station_ids } => {
            Box::new(wide_csv::WideCsvSource::new(path, station_ids.clone()))
        }
    };
    Ok(source)
}

/// Row of the training CSV.
#[derive(Serialize)]
struct TrainingCsvRow<'a> {
    #[serde(rename = "siteID")]
    site_id: &'a str,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    #[serde(rename = "sensorData")]
    value: f64,
}

/// Write records as `siteID,Latitude,Longitude,sensorData`.
pub fn write_training_csv(path: &Path, records: &[SensorRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    if records.is_empty() {
        wtr.write_record(["siteID", "Latitude", "Longitude", "sensorData"])?;
    }
    for record in records {
        wtr.serialize(TrainingCsvRow {
            site_id: &record.site_id,
            latitude: record.latitude,
            longitude: record.longitude,
            value: record.value,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Keep the records of a batch, logging every skipped site at debug level.
pub fn split_outcomes(outcomes: Vec<SiteOutcome>) -> Vec<SensorRecord> {
    outcomes
        .into_iter()
        .filter_map(|outcome| match outcome {
            Ok(record) => Some(record),
            Err(skip) => {
                log::debug!("Skipping site {}: {}", skip.site_id, skip.reason);
                None
            }
        })
        .collect()
}

/// Extract one window from `source` and write the training CSV to `out`.
/// Returns the number of records written.
pub fn assemble(source: &dyn SensorSource, window: &TimeWindow, out: &Path) -> Result<usize> {
    let records = split_outcomes(source.extract(window)?);
    write_training_csv(out, &records)?;
    log::info!(
        "{}: {} records for {} to {}",
        source.describe(),
        records.len(),
        window.start,
        window.end
    );
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ssu_core::{SiteSkip, SkipReason};
    use tempfile::TempDir;

    struct Fixed(Vec<SiteOutcome>);

    impl SensorSource for Fixed {
        fn describe(&self) -> String {
            "fixed".to_string()
        }

        fn extract(&self, _window: &TimeWindow) -> Result<Vec<SiteOutcome>> {
            Ok(self.0.clone())
        }
    }

    fn window() -> TimeWindow {
        let start = NaiveDate::from_ymd_opt(2015, 7, 22)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        TimeWindow::new(start, start + chrono::TimeDelta::try_hours(6).unwrap())
    }

    fn record(id: &str, value: f64) -> SensorRecord {
        SensorRecord {
            site_id: id.to_string(),
            latitude: 38.5,
            longitude: -120.25,
            value,
        }
    }

    #[test]
    fn test_assemble_writes_records_and_drops_skips() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("sm.csv");
        let source = Fixed(vec![
            Ok(record("a", 0.2)),
            Err(SiteSkip {
                site_id: "b".into(),
                reason: SkipReason::NoData,
            }),
            Ok(record("c", 0.35)),
        ]);
        let count = assemble(&source, &window(), &out).unwrap();
        assert_eq!(count, 2);
        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(
            text,
            "siteID,Latitude,Longitude,sensorData\na,38.5,-120.25,0.2\nc,38.5,-120.25,0.35\n"
        );
    }

    #[test]
    fn test_empty_batch_still_has_header() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("sm.csv");
        assert_eq!(assemble(&Fixed(vec![]), &window(), &out).unwrap(), 0);
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "siteID,Latitude,Longitude,sensorData\n"
        );
    }

    #[test]
    fn test_from_config_wide_csv() {
        let config = SourceConfig::WideCsv {
            path: "/nowhere.csv".into(),
            station_ids: None,
        };
        let source = from_config(&config).unwrap();
        assert!(source.describe().contains("nowhere.csv"));
        assert!(source.extract(&window()).is_err());
    }
}
