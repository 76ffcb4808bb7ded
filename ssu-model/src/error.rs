/// Error types for model fitting and application
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    /// Training table could not be read
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stack or output raster operation failed
    #[error("Raster error: {0}")]
    Raster(#[from] ssu_raster::RasterError),

    /// Every row was removed by the finite-value and mask filters
    #[error("No valid training data")]
    NoValidTrainingData,

    /// Training table lacks a band column
    #[error("Training table has no column '{0}'")]
    MissingColumn(String),

    /// The regression library rejected the input
    #[error("Random forest failed: {0}")]
    Fit(String),

    /// Colour tables exist only for maxima of 0.3, 0.4 and 0.5
    #[error("Max value must be 0.3, 0.4 or 0.5 (got {0})")]
    UnsupportedColourMax(f64),
}

/// Type alias for Results using ModelError
pub type Result<T> = std::result::Result<T, ModelError>;
