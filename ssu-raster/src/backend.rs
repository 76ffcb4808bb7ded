use crate::error::Result;
use crate::grid::{GridInfo, PixelType, Window};
use ndarray::{Array2, Array3};
use ssu_core::{BoundingBox, ResampleMethod};
use std::path::{Path, PathBuf};

/// Parameters of a single warp: reproject, resample and crop one raster
/// onto the output grid.
#[derive(Debug, Clone)]
pub struct WarpRequest<'a> {
    pub resample: ResampleMethod,
    pub resolution: f64,
    pub projection: &'a str,
    pub bounding_box: Option<&'a BoundingBox>,
    pub dst_nodata: Option<f64>,
    pub output_type: Option<PixelType>,
    /// GDAL driver name of the output
    pub format: &'a str,
}

/// Raster operations the pipeline relies on.
///
/// Implementations are expected to be deterministic: the same inputs
/// produce the same outputs.
pub trait RasterBackend {
    /// Warp `src` onto the output grid and write it to `dst`.
    fn warp(&self, src: &Path, dst: &Path, request: &WarpRequest<'_>) -> Result<()>;

    /// Write a virtual raster at `dst` with one band per source, in order.
    fn build_virtual_stack(&self, sources: &[PathBuf], dst: &Path) -> Result<()>;

    /// Label bands `1..=names.len()`. Fails if the raster has fewer bands.
    fn set_band_names(&self, path: &Path, names: &[String]) -> Result<()>;

    /// Band labels in band order; unlabelled bands yield empty strings.
    fn band_names(&self, path: &Path) -> Result<Vec<String>>;

    /// Every band value at a WGS84 location. An empty vector means the
    /// location is outside the raster.
    fn query_point(&self, path: &Path, latitude: f64, longitude: f64) -> Result<Vec<f64>>;

    /// Open a raster for blockwise reading.
    fn open_grid(&self, path: &Path) -> Result<Box<dyn GridReader + '_>>;

    /// Create a raster sharing the grid of `like` with `bands` bands.
    fn create_grid(
        &self,
        path: &Path,
        like: &GridInfo,
        bands: usize,
        pixel: PixelType,
        format: &str,
    ) -> Result<Box<dyn GridWriter + '_>>;
}

/// Blockwise access to an existing raster.
pub trait GridReader {
    fn info(&self) -> &GridInfo;

    /// Read a block of every band, shaped `(bands, rows, cols)`.
    fn read_window(&self, window: &Window) -> Result<Array3<f64>>;
}

/// Blockwise writer for a newly created raster.
pub trait GridWriter {
    /// Write one block of a band (1-based), shaped `(rows, cols)`.
    fn write_window(&mut self, band: usize, window: &Window, data: &Array2<f64>) -> Result<()>;

    /// Flush and close the raster.
    fn finish(self: Box<Self>) -> Result<()>;
}
