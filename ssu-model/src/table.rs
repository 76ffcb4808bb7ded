//! Training table: sensor values joined with the stack bands sampled at
//! each sensor location.
//!
//! Input columns are `siteID,Latitude,Longitude,sensorData,<band>...` as
//! written by the point extractor. The fourth column is the target.

use crate::error::{ModelError, Result};
use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use std::path::Path;

/// Index of the sensor value column.
const TARGET_COLUMN: usize = 3;

/// Filtered training rows, ready to fit.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingTable {
    pub feature_names: Vec<String>,
    /// One row per sample, columns in `feature_names` order
    pub features: Vec<Vec<f64>>,
    pub target: Vec<f64>,
}

impl TrainingTable {
    pub fn from_path(path: &Path, feature_names: &[String], mask_name: &str) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, feature_names, mask_name)
    }

    /// Read the table, keeping rows where every feature, the target and the
    /// mask are finite and the mask is non-zero.
    ///
    /// Fails with [`ModelError::NoValidTrainingData`] when nothing is left.
    pub fn from_reader<R: Read>(input: R, feature_names: &[String], mask_name: &str) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().flexible(true).from_reader(input);
        let header = rdr.headers()?.clone();
        let column = |name: &str| {
            header
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| ModelError::MissingColumn(name.to_string()))
        };
        let feature_idx = feature_names
            .iter()
            .map(|name| column(name))
            .collect::<Result<Vec<usize>>>()?;
        let mask_idx = column(mask_name)?;

        let mut features = Vec::new();
        let mut target = Vec::new();
        let mut read = 0usize;
        let mut masked = 0usize;
        for row in rdr.records() {
            let row = row?;
            read += 1;
            let values: Vec<f64> = feature_idx.iter().map(|i| value(&row, *i)).collect();
            let y = value(&row, TARGET_COLUMN);
            let mask = value(&row, mask_idx);
            if !(y.is_finite() && mask.is_finite() && values.iter().all(|v| v.is_finite())) {
                continue;
            }
            if mask == 0.0 {
                masked += 1;
                continue;
            }
            features.push(values);
            target.push(y);
        }
        log::debug!(
            "Training table: {} rows read, {} outside mask, {} kept",
            read,
            masked,
            target.len()
        );
        if target.is_empty() {
            return Err(ModelError::NoValidTrainingData);
        }
        Ok(TrainingTable {
            feature_names: feature_names.to_vec(),
            features,
            target,
        })
    }

    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }
}

/// Field as a number; anything unreadable is NaN.
fn value(row: &StringRecord, index: usize) -> f64 {
    row.get(index)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
siteID,Latitude,Longitude,sensorData,ndvi,radar_hh,mask
a,38.1,-120.1,0.20,0.5,0.01,1
b,38.2,-120.2,0.25,0.6,0.02,0
c,38.3,-120.3,0.30,NaN,0.03,1
d,38.4,-120.4,,0.7,0.04,1
e,38.5,-120.5,0.35,0.8,0.05,1
";

    fn names() -> Vec<String> {
        vec!["ndvi".to_string(), "radar_hh".to_string()]
    }

    #[test]
    fn test_filters_non_finite_and_masked_rows() {
        let table = TrainingTable::from_reader(TABLE.as_bytes(), &names(), "mask").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.target, vec![0.20, 0.35]);
        assert_eq!(table.features[1], vec![0.8, 0.05]);
    }

    #[test]
    fn test_all_rows_masked() {
        let masked = TABLE.replace(",1\n", ",0\n");
        let err = TrainingTable::from_reader(masked.as_bytes(), &names(), "mask").unwrap_err();
        assert!(matches!(err, ModelError::NoValidTrainingData));
        assert_eq!(err.to_string(), "No valid training data");
    }

    #[test]
    fn test_header_only() {
        let header = TABLE.lines().next().unwrap();
        let err = TrainingTable::from_reader(header.as_bytes(), &names(), "mask").unwrap_err();
        assert!(matches!(err, ModelError::NoValidTrainingData));
    }

    #[test]
    fn test_missing_band_column() {
        let mut wanted = names();
        wanted.push("prism_ppt".to_string());
        let err = TrainingTable::from_reader(TABLE.as_bytes(), &wanted, "mask").unwrap_err();
        assert!(matches!(err, ModelError::MissingColumn(ref c) if c == "prism_ppt"));
    }
}
