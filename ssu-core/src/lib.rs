//! Core types for soil moisture upscaling.
//!
//! Declarations only: nothing in this crate touches rasters or sensor
//! stores. Layers are declared by [`layer::LayerDescriptor`] and resolved
//! per target date into [`layer::ResolvedLayer`]s by the stack crate.

pub mod config;
pub mod error;
pub mod layer;
pub mod sensor;
pub mod window;

pub use config::{BoundingBox, ConfigOverrides, SourceConfig, UpscalingConfig};
pub use error::ConfigError;
pub use layer::{LayerDescriptor, LayerKind, LayerSet, ResampleMethod, ResolvedLayer};
pub use sensor::{SensorRecord, SiteOutcome, SiteSkip, SkipReason, ValueRange};
pub use window::{TimeWindow, WindowSchedule};
