//! Per-date raster preparation: find the dynamic layer files closest to a
//! target date, merge all layers into one aligned stack, and sample the
//! stack at sensor locations.

pub mod builder;
pub mod error;
pub mod extract;
pub mod locator;

pub use builder::{build_stack, LayerStack, StackRequest};
pub use error::{ExtractError, LocateError, StackError};
pub use extract::{extract, extract_file, ExtractSummary};
pub use locator::{locate, Located, SourceFamily};
