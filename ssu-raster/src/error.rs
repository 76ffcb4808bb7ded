/// Error types for raster operations
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterError {
    /// External tool could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// External tool exited unsuccessfully
    #[error("{program} failed ({status}): {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },

    /// Raster does not exist or could not be opened
    #[error("Could not open raster {0}")]
    NotFound(PathBuf),

    /// Requested band is not present in the raster
    #[error("Could not open the image band {band} of {path}")]
    BandIndex { path: PathBuf, band: usize },

    /// Rasters that must share a grid do not
    #[error("Grid mismatch: {0}")]
    GridMismatch(String),

    /// Window lies outside the raster
    #[error("Window {0} outside raster")]
    Window(String),

    /// Tool output could not be parsed
    #[error("Could not parse output of {program}: {output}")]
    Parse { program: String, output: String },

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Type alias for Results using RasterError
pub type Result<T> = std::result::Result<T, RasterError>;
