use chrono::NaiveDateTime;
use ssu_raster::RasterError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors finding the file for a dynamic layer
#[derive(Error, Debug)]
pub enum LocateError {
    #[error("No source family for dynamic layer \"{0}\"")]
    UnknownFamily(String),

    #[error("Unknown polarization \"{polarization}\" for layer \"{layer}\"")]
    UnknownPolarization { layer: String, polarization: String },

    #[error("Invalid search pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("No files matching \"{pattern}\" found in {dir}")]
    NoCandidates { dir: PathBuf, pattern: String },

    #[error("Could not find dynamic layer \"{layer}\" for {target}")]
    NotFound { layer: String, target: NaiveDateTime },
}

/// Errors building the layer stack for one date
#[derive(Error, Debug)]
pub enum StackError {
    #[error("Dynamic layer \"{0}\" has no path and no date to locate it with")]
    DynamicLayerNeedsDate(String),

    #[error("Layer \"{0}\" has no path")]
    MissingPath(String),

    #[error("Dynamic layer \"{0}\" has neither a path nor a search directory")]
    MissingSearchDir(String),

    #[error("Bands of {path} are named {found:?}, expected {expected:?}")]
    BandNames {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors sampling the stack at sensor locations
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),

    #[error("Input table {0} has fewer than three columns")]
    MissingColumns(String),
}
