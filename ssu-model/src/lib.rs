//! Random forest upscaling of sensor soil moisture.
//!
//! [`fit_and_apply`] fits a forest to a training table (sensor values with
//! the stack bands sampled at each sensor) and predicts every pixel of the
//! stack, producing a one-band Float32 soil moisture image.

pub mod apply;
pub mod colour;
pub mod error;
pub mod forest;
pub mod stats;
pub mod table;

pub use colour::{colour_image, ColourTable};
pub use error::{ModelError, Result};
pub use forest::Forest;
pub use stats::Summary;
pub use table::TrainingTable;

use ssu_core::LayerSet;
use ssu_raster::RasterBackend;
use std::path::Path;

/// Outcome of one fit and apply.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub n_samples: usize,
    pub feature_names: Vec<String>,
    /// Same order as `feature_names`
    pub importances: Vec<f64>,
    pub train_mean: f64,
    pub train_std: f64,
    /// Over non-zero predicted pixels
    pub predict_mean: f64,
    pub predict_std: f64,
    /// Out-of-bag
    pub rmse: f64,
    /// Out-of-bag
    pub bias: f64,
    /// Against the training data
    pub r_squared: f64,
}

/// Fit a forest to `training_csv` and apply it to `stack`, writing the
/// predicted image to `out_image`.
///
/// Features are the non-mask layers of `layers`; rows with any non-finite
/// value or a zero mask are dropped before fitting.
pub fn fit_and_apply<B: RasterBackend + ?Sized>(
    backend: &B,
    training_csv: &Path,
    stack: &Path,
    out_image: &Path,
    layers: &LayerSet,
    format: &str,
) -> Result<FitResult> {
    let table = TrainingTable::from_path(training_csv, &layers.feature_names(), &layers.mask().name)?;
    log::info!("Training random forest on {} samples", table.len());
    let forest = Forest::fit(&table)?;

    let fitted = forest.predict(&table.features)?;
    let oob = forest.predict_oob(&table)?;
    let importances = forest.importances(&table)?;
    let train = Summary::from_values(table.target.iter());

    let predicted = apply::apply(backend, &forest, stack, out_image, &layers.nodata_values(), format)?;

    Ok(FitResult {
        n_samples: table.len(),
        feature_names: table.feature_names.clone(),
        importances,
        train_mean: train.mean(),
        train_std: train.std(),
        predict_mean: predicted.mean(),
        predict_std: predicted.std(),
        rmse: stats::rmse(&oob, &table.target),
        bias: stats::bias(&oob, &table.target),
        r_squared: stats::r_squared(&fitted, &table.target),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use ssu_core::{LayerDescriptor, LayerKind};
    use ssu_raster::memory::{MemoryBackend, MemoryGrid};
    use tempfile::TempDir;

    fn layers() -> LayerSet {
        let ndvi = LayerDescriptor::from_pairs(
            "layer1",
            [("name", "ndvi"), ("path", "/data/ndvi.kea"), ("nodata", "-9999")],
            LayerKind::Static,
        )
        .unwrap();
        let mask = LayerDescriptor::from_pairs(
            "mask",
            [("name", "mask"), ("path", "/data/mask.kea")],
            LayerKind::Mask,
        )
        .unwrap();
        LayerSet::new(vec![ndvi, mask]).unwrap()
    }

    fn write_table(dir: &TempDir, mask: &str) -> std::path::PathBuf {
        let mut text = String::from("siteID,Latitude,Longitude,sensorData,ndvi,mask\n");
        for i in 0..12 {
            let ndvi = 0.2 + i as f64 * 0.05;
            text.push_str(&format!("s{i},38.5,-120.5,{},{},{}\n", 0.1 + ndvi / 4.0, ndvi, mask));
        }
        let path = dir.path().join("train.csv");
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_fit_and_apply() {
        let dir = TempDir::new().unwrap();
        let csv = write_table(&dir, "1");
        let backend = MemoryBackend::new();
        let mut ndvi = Array2::from_elem((10, 10), 0.4);
        ndvi[[5, 5]] = -9999.0;
        let mask = Array2::from_elem((10, 10), 1.0);
        let gt = [-121.0, 0.01, 0.0, 39.0, 0.0, -0.01];
        backend.insert("/work/stack.kea", MemoryGrid::new(gt, vec![ndvi, mask]).unwrap());

        let result = fit_and_apply(
            &backend,
            &csv,
            Path::new("/work/stack.kea"),
            Path::new("/out/sm.kea"),
            &layers(),
            "KEA",
        )
        .unwrap();

        assert_eq!(result.n_samples, 12);
        assert_eq!(result.feature_names, vec!["ndvi"]);
        assert_eq!(result.importances.len(), 1);
        assert!(result.r_squared > 0.5);
        assert!(result.train_mean > 0.1 && result.train_mean < 0.3);
        assert!(result.predict_mean.is_finite());
        let out = backend.get(Path::new("/out/sm.kea")).unwrap();
        assert_eq!(out.bands[0][[5, 5]], 0.0);
        assert!(out.bands[0][[0, 0]] > 0.0);
    }

    #[test]
    fn test_no_valid_training_data() {
        let dir = TempDir::new().unwrap();
        let csv = write_table(&dir, "0");
        let backend = MemoryBackend::new();
        let err = fit_and_apply(
            &backend,
            &csv,
            Path::new("/work/stack.kea"),
            Path::new("/out/sm.kea"),
            &layers(),
            "KEA",
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::NoValidTrainingData));
        assert!(!backend.contains(Path::new("/out/sm.kea")));
    }
}
