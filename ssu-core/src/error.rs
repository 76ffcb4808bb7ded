/// Error types for configuration and layer declarations
use thiserror::Error;

/// Configuration errors. All of these are fatal at startup: they are
/// raised before any date is processed.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read or parsed
    #[error("Failed to read config: {0}")]
    Read(#[from] ini::Error),

    /// Required section is absent
    #[error("Missing section [{0}]")]
    MissingSection(String),

    /// Required key is absent from a section
    #[error("Missing '{key}' in section [{section}]")]
    MissingField { section: String, key: String },

    /// Key is present but its value could not be interpreted
    #[error("Invalid value '{value}' for '{key}' in section [{section}]")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },

    /// Layer date was not in YYYY-MM-DD format
    #[error("Date was provided for {layer} but not in required format of YYYY-MM-DD (got '{value}')")]
    InvalidDate { layer: String, value: String },

    /// Layer `type` is not one of static, dynamic or mask
    #[error("Unknown layer type '{value}' in section [{section}]")]
    UnknownLayerKind { section: String, value: String },

    /// A mask layer must be called "mask"
    #[error("Mask layer must be named \"mask\" (got '{0}')")]
    MaskNaming(String),

    /// Resample methods only apply to dynamic layers
    #[error("Resample method can not be specified for non-dynamic layer '{0}'")]
    ResampleOnNonDynamic(String),

    /// Two active layers share a band name
    #[error("Duplicate band name '{0}'")]
    DuplicateBandName(String),

    /// No active mask layer was declared
    #[error("Exactly one mask layer is required, none found")]
    MissingMask,

    /// More than one mask layer was declared
    #[error("Exactly one mask layer is required, found {0}")]
    MultipleMasks(usize),

    /// Bounding box must be `xmin ymin xmax ymax` with min < max
    #[error("Invalid bounding box '{0}' (expected 'xmin ymin xmax ymax')")]
    InvalidBoundingBox(String),

    /// Run end precedes start, or the date spacing is not positive
    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),
}

/// Type alias for Results using ConfigError
pub type Result<T> = std::result::Result<T, ConfigError>;
