//! Per-node calibration of raw EC-5 readings to volumetric water content
//! in percent.

use std::str::FromStr;
use thiserror::Error;

/// Calibration equation applied to every sensor of a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationKind {
    /// `c0 + c1·x`
    Linear,
    /// `c0 + c1·x` below the split point, `c2 + c3·x` at or above it
    Split(f64),
    /// `c0 + c1·x + c2·x²`
    Poly2,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown calibration type {0}")]
pub struct UnknownCalibration(pub String);

impl FromStr for CalibrationKind {
    type Err = UnknownCalibration;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "linear" => Ok(CalibrationKind::Linear),
            "poly2" => Ok(CalibrationKind::Poly2),
            _ => s
                .strip_prefix("split_")
                .and_then(|n| n.parse::<f64>().ok())
                .map(CalibrationKind::Split)
                .ok_or_else(|| UnknownCalibration(s.to_string())),
        }
    }
}

/// Coefficients for sensors 1-4 of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub kind: CalibrationKind,
    pub coefficients: [[f64; 4]; 4],
}

impl Default for Calibration {
    /// Decagon calibration for mineral soil.
    fn default() -> Self {
        Calibration {
            kind: CalibrationKind::Linear,
            coefficients: [[-40.1, 0.1279569, 0.0, 0.0]; 4],
        }
    }
}

impl Calibration {
    /// Calibrated value of `raw` from sensor `sensor` (1-4).
    pub fn apply(&self, sensor: u8, raw: f64) -> Option<f64> {
        let c = self.coefficients.get(usize::from(sensor).checked_sub(1)?)?;
        Some(match self.kind {
            CalibrationKind::Linear => c[0] + c[1] * raw,
            CalibrationKind::Split(split) if raw < split => c[0] + c[1] * raw,
            CalibrationKind::Split(_) => c[2] + c[3] * raw,
            CalibrationKind::Poly2 => c[0] + c[1] * raw + c[2] * raw * raw,
        })
    }
}
