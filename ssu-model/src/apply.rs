//! Blockwise application of a fitted forest to a layer stack.

use crate::error::Result;
use crate::forest::Forest;
use crate::stats::Summary;
use ndarray::{Array2, Axis, Zip};
use ssu_raster::{PixelType, RasterBackend, RasterError};
use std::path::Path;

/// Edge length of the square blocks read, predicted and written at a time.
pub const TILE_SIZE: usize = 256;

/// Predict every pixel of `stack` into a one-band Float32 raster at `out`.
///
/// The first `n` bands of the stack are the forest's features, in order;
/// the remaining band is the mask and is not a feature. `nodata[i]` is the
/// declared no-data value of band `i + 1`: wherever a band holds its
/// no-data value the prediction is forced to zero.
///
/// Returns statistics of the non-zero predictions.
pub fn apply<B: RasterBackend + ?Sized>(
    backend: &B,
    forest: &Forest,
    stack: &Path,
    out: &Path,
    nodata: &[Option<f64>],
    format: &str,
) -> Result<Summary> {
    let reader = backend.open_grid(stack)?;
    let info = reader.info().clone();
    let n_features = forest.feature_names().len();
    if info.band_count <= n_features {
        return Err(RasterError::BandIndex {
            path: stack.to_path_buf(),
            band: n_features + 1,
        }
        .into());
    }

    let mut writer = backend.create_grid(out, &info, 1, PixelType::Float32, format)?;
    let mut summary = Summary::new();
    let tiles = info.tiles(TILE_SIZE);
    log::debug!(
        "Applying forest to {} ({}x{}, {} tiles)",
        stack.display(),
        info.width,
        info.height,
        tiles.len()
    );

    for window in &tiles {
        let block = reader.read_window(window)?;
        let (_, rows, cols) = block.dim();
        let pixels: Vec<Vec<f64>> = (0..rows * cols)
            .map(|p| {
                (0..n_features)
                    .map(|b| block[[b, p / cols, p % cols]])
                    .collect()
            })
            .collect();
        let predicted = forest.predict(&pixels)?;
        let mut image = Array2::from_shape_fn((rows, cols), |(r, c)| predicted[r * cols + c]);

        for (band, value) in nodata.iter().enumerate().take(info.band_count) {
            if let Some(value) = value {
                Zip::from(&mut image)
                    .and(block.index_axis(Axis(0), band))
                    .for_each(|pixel, input| {
                        if input == value {
                            *pixel = 0.0;
                        }
                    });
            }
        }

        image
            .iter()
            .filter(|v| **v != 0.0)
            .for_each(|v| summary.push(*v));
        writer.write_window(1, window, &image)?;
    }
    writer.finish()?;
    log::info!("Wrote {}", out.display());
    Ok(summary)
}
