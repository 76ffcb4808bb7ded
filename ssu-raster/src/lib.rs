//! Raster operations used by the upscaling pipeline.
//!
//! The pipeline treats raster processing as a black box with a small
//! contract, [`RasterBackend`]: warp a file to a grid, build a virtual
//! multi-band stack, label bands, query a point, and read/write grids in
//! blocks. Two backends are provided:
//!
//! - [`memory::MemoryBackend`], an in-process store keyed by path, used by
//!   the test suites of every crate in the workspace
//! - `gdal_backend::GdalBackend` (feature `gdal`), which drives the GDAL
//!   command line tools for warping and point queries and links libgdal for
//!   band metadata and block I/O

pub mod backend;
pub mod error;
pub mod format;
pub mod grid;
pub mod memory;

#[cfg(feature = "gdal")]
pub mod gdal_backend;

pub use backend::{GridReader, GridWriter, RasterBackend, WarpRequest};
pub use error::{RasterError, Result};
pub use grid::{GridInfo, PixelType, Window};
