//! Colour-classified rendering of predicted soil moisture (ColorBrewer
//! RdYlBu, dry red to wet blue) as a three-band Byte image.

use crate::error::{ModelError, Result};
use ndarray::Array2;
use ssu_raster::{PixelType, RasterBackend};
use std::path::Path;

use crate::apply::TILE_SIZE;

const RDYLBU: [[u8; 3]; 10] = [
    [165, 0, 38],
    [215, 48, 39],
    [244, 109, 67],
    [253, 174, 97],
    [254, 224, 144],
    [224, 243, 248],
    [171, 217, 233],
    [116, 173, 209],
    [69, 117, 180],
    [49, 54, 149],
];

const UPPER_050: [f64; 10] = [0.05, 0.10, 0.15, 0.20, 0.25, 0.30, 0.35, 0.40, 0.45, 0.50];
// top class stretches to 0.5
const UPPER_040: [f64; 10] = [0.04, 0.08, 0.12, 0.16, 0.20, 0.24, 0.28, 0.32, 0.36, 0.50];
const UPPER_030: [f64; 10] = [0.03, 0.06, 0.09, 0.12, 0.15, 0.18, 0.21, 0.24, 0.27, 0.30];

/// Ten classes `[lower, upper)`, each lower bound the previous upper,
/// starting at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColourTable {
    upper: [f64; 10],
}

impl ColourTable {
    pub fn for_max(max_value: f64) -> Result<Self> {
        let upper = if (max_value - 0.5).abs() < 1e-9 {
            UPPER_050
        } else if (max_value - 0.4).abs() < 1e-9 {
            UPPER_040
        } else if (max_value - 0.3).abs() < 1e-9 {
            UPPER_030
        } else {
            return Err(ModelError::UnsupportedColourMax(max_value));
        };
        Ok(ColourTable { upper })
    }

    /// RGB of the class containing `value`; black outside every class.
    pub fn colour(&self, value: f64) -> [u8; 3] {
        let mut lower = 0.0;
        for (upper, rgb) in self.upper.iter().zip(RDYLBU.iter()) {
            if value >= lower && value < *upper {
                return *rgb;
            }
            lower = *upper;
        }
        [0, 0, 0]
    }
}

/// Render band 1 of `input` to an RGB raster at `output`.
pub fn colour_image<B: RasterBackend + ?Sized>(
    backend: &B,
    input: &Path,
    output: &Path,
    table: &ColourTable,
    format: &str,
) -> Result<()> {
    let reader = backend.open_grid(input)?;
    let info = reader.info().clone();
    let mut writer = backend.create_grid(output, &info, 3, PixelType::Byte, format)?;
    for window in info.tiles(TILE_SIZE) {
        let block = reader.read_window(&window)?;
        let (_, rows, cols) = block.dim();
        let rgb: Vec<[u8; 3]> = block
            .index_axis(ndarray::Axis(0), 0)
            .iter()
            .map(|v| table.colour(*v))
            .collect();
        for channel in 0..3 {
            let data = Array2::from_shape_fn((rows, cols), |(r, c)| {
                f64::from(rgb[r * cols + c][channel])
            });
            writer.write_window(channel + 1, &window, &data)?;
        }
    }
    writer.finish()?;
    log::info!("Coloured image written to {}", output.display());
    Ok(())
}
