//! TxSON network source: one `.dat` time series per logger.

use crate::error::{Result, SensorError};
use crate::SensorSource;
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use ssu_core::{SensorRecord, SiteOutcome, SiteSkip, SkipReason, TimeWindow, ValueRange};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Site table expected in the TxSON directory.
pub const SITE_TABLE: &str = "sites_noblanks.csv";

const DATE_COLUMN: &str = "Date";
const TIMESTAMP_FORMAT: &str = "%m/%d/%y %H:%M";

/// Depth column read for sensor numbers 1, 2 and 3.
fn depth_column(sensor_number: u8) -> Option<&'static str> {
    match sensor_number {
        1 => Some("VWC_5"),
        2 => Some("VWC_10"),
        3 => Some("VWC_20"),
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SiteRow {
    #[serde(rename = "SiteID")]
    site_id: String,
    #[serde(rename = "logger_ID")]
    logger_id: String,
    #[serde(rename = "LAT")]
    latitude: f64,
    #[serde(rename = "LON")]
    longitude: f64,
}

/// Site ids compare numerically when they are numbers ("007" is site 7).
fn site_key(id: &str) -> String {
    let id = id.trim();
    id.parse::<i64>()
        .map(|n| n.to_string())
        .unwrap_or_else(|_| id.to_string())
}

pub struct TxsonSource {
    dir: PathBuf,
    site_ids: Vec<String>,
    sensor_number: u8,
    sites: HashMap<String, SiteRow>,
}

impl TxsonSource {
    /// Load the site table from `dir`.
    pub fn new(dir: &Path, site_ids: Vec<String>, sensor_number: u8) -> Result<Self> {
        let table = dir.join(SITE_TABLE);
        let mut rdr = ReaderBuilder::new().trim(Trim::All).from_path(&table)?;
        let mut sites = HashMap::new();
        for row in rdr.deserialize::<SiteRow>() {
            let row = row?;
            sites.insert(site_key(&row.site_id), row);
        }
        for id in &site_ids {
            if !sites.contains_key(&site_key(id)) {
                log::warn!("Can't find site {} in {}", id, table.display());
            }
        }
        Ok(TxsonSource {
            dir: dir.to_path_buf(),
            site_ids,
            sensor_number,
            sites,
        })
    }

    fn data_file(&self, site: &SiteRow) -> PathBuf {
        self.dir
            .join(format!("{}.dat", site.logger_id.trim().replace('-', "_")))
    }

    /// Samples of `column` with timestamps inside the window. Unreadable
    /// values become NaN and are removed by the range filter.
    fn window_samples(&self, file: &Path, column: &str, window: &TimeWindow) -> Result<Vec<f64>> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(b',')
            .trim(Trim::All)
            .from_path(file)?;
        let headers = rdr.headers()?.clone();
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| SensorError::MissingColumn {
                    file: file.to_path_buf(),
                    column: name.to_string(),
                })
        };
        let date_idx = position(DATE_COLUMN)?;
        let value_idx = position(column)?;

        let mut samples = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let Some(ts) = record
                .get(date_idx)
                .and_then(|d| NaiveDateTime::parse_from_str(d, TIMESTAMP_FORMAT).ok())
            else {
                continue;
            };
            if window.contains(&ts) {
                samples.push(
                    record
                        .get(value_idx)
                        .and_then(|v| v.parse::<f64>().ok())
                        .unwrap_or(f64::NAN),
                );
            }
        }
        Ok(samples)
    }

    fn site(&self, site_id: &str, window: &TimeWindow) -> std::result::Result<SensorRecord, SkipReason> {
        let site = self
            .sites
            .get(&site_key(site_id))
            .ok_or(SkipReason::UnknownSite)?;
        let column =
            depth_column(self.sensor_number).ok_or(SkipReason::UnknownSensor(self.sensor_number))?;
        let file = self.data_file(site);
        let samples = match self.window_samples(&file, column, window) {
            Ok(samples) => samples,
            Err(e) => {
                log::debug!("Could not read {}: {}", file.display(), e);
                return Err(SkipReason::NoData);
            }
        };
        if samples.is_empty() {
            return Err(SkipReason::NoData);
        }
        let valid: Vec<f64> = samples
            .into_iter()
            .filter(|v| ValueRange::VOLUMETRIC.admits_sample(*v))
            .collect();
        if valid.is_empty() {
            return Err(SkipReason::NoValidSamples);
        }
        let mean = valid.iter().sum::<f64>() / valid.len() as f64;
        SensorRecord::checked(
            site_id,
            site.latitude,
            site.longitude,
            mean,
            &ValueRange::VOLUMETRIC,
        )
    }
}

impl SensorSource for TxsonSource {
    fn describe(&self) -> String {
        format!(
            "TxSON {} ({} sites, sensor {})",
            self.dir.display(),
            self.site_ids.len(),
            self.sensor_number
        )
    }

    fn extract(&self, window: &TimeWindow) -> Result<Vec<SiteOutcome>> {
        Ok(self
            .site_ids
            .iter()
            .map(|id| {
                self.site(id, window).map_err(|reason| SiteSkip {
                    site_id: id.clone(),
                    reason,
                })
            })
            .collect())
    }
}
