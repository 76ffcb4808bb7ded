use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One averaged measurement per sensor per time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub site_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub value: f64,
}

impl SensorRecord {
    /// Build a record, rejecting non-finite or out-of-range values.
    pub fn checked(
        site_id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        value: f64,
        range: &ValueRange,
    ) -> Result<Self, SkipReason> {
        if !value.is_finite() {
            return Err(SkipReason::NonFinite);
        }
        if !range.admits(value) {
            return Err(SkipReason::OutOfRange(value));
        }
        Ok(SensorRecord {
            site_id: site_id.into(),
            latitude,
            longitude,
            value,
        })
    }
}

/// Physically plausible range of a sensor value: `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub lower: f64,
    pub upper: f64,
}

impl ValueRange {
    /// Volumetric water content in m³/m³.
    pub const VOLUMETRIC: ValueRange = ValueRange {
        lower: 0.0,
        upper: 0.5,
    };

    /// Calibrated EC-5 readings in percent, before scaling to m³/m³.
    pub const CALIBRATED_PERCENT: ValueRange = ValueRange {
        lower: 0.0,
        upper: 60.0,
    };

    /// Record-level check: finite, lower bound inclusive, upper exclusive.
    pub fn admits(&self, value: f64) -> bool {
        value.is_finite() && value >= self.lower && value < self.upper
    }

    /// Sample-level check applied before averaging: both bounds exclusive,
    /// so zero readings (dead sensors) never contribute to a mean.
    pub fn admits_sample(&self, value: f64) -> bool {
        value.is_finite() && value > self.lower && value < self.upper
    }
}

/// Why a site produced no record for a window.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkipReason {
    #[error("no data found for selected dates")]
    NoData,

    #[error("site is not listed in the site table")]
    UnknownSite,

    #[error("sensor type mismatch (found {0})")]
    SensorTypeMismatch(String),

    #[error("no valid samples after filtering")]
    NoValidSamples,

    #[error("non-finite average")]
    NonFinite,

    #[error("value {0} outside plausible range")]
    OutOfRange(f64),

    #[error("unreadable value '{0}'")]
    Unparseable(String),

    #[error("sensor number {0} not recognised")]
    UnknownSensor(u8),

    #[error("query failed: {0}")]
    Query(String),
}

/// A skipped site together with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteSkip {
    pub site_id: String,
    pub reason: SkipReason,
}

/// Result of extracting one site for one window.
pub type SiteOutcome = Result<SensorRecord, SiteSkip>;
