//! Run configuration.
//!
//! Built once at startup, in order: built-in defaults, the INI config
//! file, environment overrides, then command line overrides. The result is
//! immutable and passed by reference to every stage of the pipeline.
//!
//! # File layout
//!
//! ```text
//! [default]
//! outdir = /tmp/upscaling
//! out_stats_dir = /tmp/upscaling/stats
//! out_csv_dir = /tmp/upscaling/csv
//! out_images_dir = /tmp/upscaling/images
//! starttime = 2015-07-20 00:00:00
//! endtime = 2015-07-25 00:00:00
//! time_interval_hours = 6
//! predict_spacing_days = 1
//! source = csv
//! station_csv = /data/stations.csv
//!
//! [layer1]
//! name = ndvi
//! path = /data/ndvi.kea
//! nodata = -9999
//!
//! [mask]
//! name = mask
//! path = /data/mask.kea
//! ```

use crate::error::{ConfigError, Result};
use crate::layer::{parse_bool, LayerDescriptor, LayerKind, LayerSet};
use crate::window::WindowSchedule;
use chrono::{NaiveDateTime, TimeDelta};
use ini::{Ini, Properties};
use std::path::{Path, PathBuf};

/// Proj4 string for the EASE-2 projection.
pub const EASE2_PROJ4: &str =
    "+proj=cea +lat_0=0 +lon_0=0 +lat_ts=30 +x_0=0 +y_0=0 +ellps=WGS84 +datum=WGS84 +units=m";

/// Default output pixel size in projection units.
pub const DEFAULT_RESOLUTION: f64 = 100.0;

/// Default raster output format (GDAL driver name).
pub const DEFAULT_GDAL_FORMAT: &str = "KEA";

/// Default minimum number of sensor records needed to train for a window.
pub const DEFAULT_MIN_RECORDS: usize = 10;

/// Default upper value for the colour table of the visualisation.
pub const DEFAULT_MAX_SM_COL: f64 = 0.3;

/// Layer whose matched date is reported alongside each result row.
pub const DEFAULT_AUX_DATE_LAYER: &str = "airmoss_hh";

/// Environment variables that override file values.
pub const ENV_PROJ: &str = "UPSCALING_PROJ";
pub const ENV_RES: &str = "UPSCALING_RES";
pub const ENV_GDAL_FORMAT: &str = "UPSCALING_GDAL_FORMAT";

const DEFAULT_SECTION: &str = "default";
const MASK_SECTION: &str = "mask";
const LAYER_SECTION_PREFIX: &str = "layer";

/// Target extent, in the output projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    /// Parse "xmin ymin xmax ymax".
    pub fn parse(s: &str) -> Result<Self> {
        let values = s
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<std::result::Result<Vec<f64>, _>>()
            .map_err(|_| ConfigError::InvalidBoundingBox(s.to_string()))?;
        match values.as_slice() {
            [xmin, ymin, xmax, ymax] if xmin < xmax && ymin < ymax => Ok(BoundingBox {
                xmin: *xmin,
                ymin: *ymin,
                xmax: *xmax,
                ymax: *ymax,
            }),
            _ => Err(ConfigError::InvalidBoundingBox(s.to_string())),
        }
    }

    /// Values in `gdalwarp -te` order.
    pub fn as_te_args(&self) -> [String; 4] {
        [
            self.xmin.to_string(),
            self.ymin.to_string(),
            self.xmax.to_string(),
            self.ymax.to_string(),
        ]
    }
}

/// Where sensor measurements come from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    /// SoilSCAPE SQLite database with stored calibrations
    Database {
        sqlite_db: PathBuf,
        sensor_ids: Vec<String>,
        sensor_number: u8,
    },
    /// TxSON per-site `.dat` files
    TxSon {
        dir: PathBuf,
        site_ids: Vec<String>,
        sensor_number: u8,
    },
    /// One row per station, one column per date
    WideCsv {
        path: PathBuf,
        station_ids: Option<Vec<String>>,
    },
}

/// Command line overrides, applied last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub debug: bool,
}

/// Immutable configuration for one upscaling run.
#[derive(Debug, Clone, PartialEq)]
pub struct UpscalingConfig {
    pub out_dir: PathBuf,
    pub stats_dir: PathBuf,
    pub csv_dir: PathBuf,
    pub images_dir: PathBuf,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Length of each averaging window
    pub interval: TimeDelta,
    /// Distance between successive window starts
    pub spacing: TimeDelta,
    pub bounding_box: Option<BoundingBox>,
    pub resolution: f64,
    pub projection: String,
    pub gdal_format: String,
    pub min_records: usize,
    pub colour_image: bool,
    pub max_sm_col: f64,
    pub aux_date_layer: String,
    pub source: SourceConfig,
    pub layers: LayerSet,
    pub debug: bool,
}

impl UpscalingConfig {
    /// Read and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let ini = Ini::load_from_file(path)?;
        log::info!("Read config from {}", path.display());
        Self::from_ini(&ini)
    }

    /// Parse config from a string, mainly for tests and embedded configs.
    pub fn from_ini_str(s: &str) -> Result<Self> {
        let ini = Ini::load_from_str(s).map_err(ini::Error::Parse)?;
        Self::from_ini(&ini)
    }

    pub fn from_ini(ini: &Ini) -> Result<Self> {
        let default = ini
            .section(Some(DEFAULT_SECTION))
            .ok_or_else(|| ConfigError::MissingSection(DEFAULT_SECTION.to_string()))?;

        let out_dir = PathBuf::from(required(default, "outdir")?);
        let stats_dir = optional(default, "out_stats_dir")
            .map(PathBuf::from)
            .unwrap_or_else(|| out_dir.join("stats"));
        let csv_dir = optional(default, "out_csv_dir")
            .map(PathBuf::from)
            .unwrap_or_else(|| out_dir.join("csv"));
        let images_dir = optional(default, "out_images_dir")
            .map(PathBuf::from)
            .unwrap_or_else(|| out_dir.join("images"));

        let start = parse_timestamp(default, "starttime")?;
        let end = parse_timestamp(default, "endtime")?;
        let interval = parse_duration(default, "time_interval_hours", 3_600.0, 24.0)?;
        let spacing = parse_duration(default, "predict_spacing_days", 86_400.0, 1.0)?;

        let bounding_box = optional(default, "bounding_box")
            .map(BoundingBox::parse)
            .transpose()?;

        let resolution = parse_number(default, "upscaling_res")?.unwrap_or(DEFAULT_RESOLUTION);
        let projection = optional(default, "upscaling_proj")
            .unwrap_or(EASE2_PROJ4)
            .to_string();
        let gdal_format = optional(default, "gdal_format")
            .unwrap_or(DEFAULT_GDAL_FORMAT)
            .to_string();
        let min_records = parse_number(default, "min_records")?
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_MIN_RECORDS);
        let colour_image = match optional(default, "colour_image") {
            Some(v) => parse_bool(v).ok_or_else(|| invalid(DEFAULT_SECTION, "colour_image", v))?,
            None => true,
        };
        let max_sm_col = parse_number(default, "max_sm_col")?.unwrap_or(DEFAULT_MAX_SM_COL);
        if ![0.3, 0.4, 0.5].contains(&max_sm_col) {
            return Err(invalid(DEFAULT_SECTION, "max_sm_col", &max_sm_col.to_string()));
        }
        let aux_date_layer = optional(default, "aux_date_layer")
            .unwrap_or(DEFAULT_AUX_DATE_LAYER)
            .to_string();

        let source = parse_source(default)?;
        let layers = parse_layers(ini)?;

        let config = UpscalingConfig {
            out_dir,
            stats_dir,
            csv_dir,
            images_dir,
            start,
            end,
            interval,
            spacing,
            bounding_box,
            resolution,
            projection,
            gdal_format,
            min_records,
            colour_image,
            max_sm_col,
            aux_date_layer,
            source,
            layers,
            debug: false,
        };
        config.validate_time_range()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(proj) = lookup(ENV_PROJ) {
            log::debug!("{} overrides projection", ENV_PROJ);
            self.projection = proj;
        }
        if let Some(res) = lookup(ENV_RES) {
            self.resolution = res
                .trim()
                .parse::<f64>()
                .map_err(|_| invalid("environment", ENV_RES, &res))?;
        }
        if let Some(format) = lookup(ENV_GDAL_FORMAT) {
            self.gdal_format = format;
        }
        Ok(self)
    }

    /// Apply command line overrides.
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Result<Self> {
        if let Some(start) = overrides.start {
            self.start = start;
        }
        if let Some(end) = overrides.end {
            self.end = end;
        }
        self.debug = overrides.debug;
        self.validate_time_range()?;
        Ok(self)
    }

    /// Averaging windows for the whole run.
    pub fn schedule(&self) -> WindowSchedule {
        WindowSchedule::new(self.start, self.end, self.interval, self.spacing)
    }

    fn validate_time_range(&self) -> Result<()> {
        if self.end < self.start {
            return Err(ConfigError::InvalidTimeRange(format!(
                "endtime {} precedes starttime {}",
                self.end, self.start
            )));
        }
        if self.spacing <= TimeDelta::zero() || self.interval <= TimeDelta::zero() {
            return Err(ConfigError::InvalidTimeRange(
                "time_interval_hours and predict_spacing_days must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn optional<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(section: &'a Properties, key: &str) -> Result<&'a str> {
    optional(section, key).ok_or_else(|| ConfigError::MissingField {
        section: DEFAULT_SECTION.to_string(),
        key: key.to_string(),
    })
}

fn invalid(section: &str, key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_number(section: &Properties, key: &str) -> Result<Option<f64>> {
    optional(section, key)
        .map(|v| v.parse::<f64>().map_err(|_| invalid(DEFAULT_SECTION, key, v)))
        .transpose()
}

fn parse_timestamp(section: &Properties, key: &str) -> Result<NaiveDateTime> {
    let value = required(section, key)?;
    ssu_utils::dates::parse_datetime(value).map_err(|_| invalid(DEFAULT_SECTION, key, value))
}

fn parse_duration(section: &Properties, key: &str, unit_seconds: f64, default: f64) -> Result<TimeDelta> {
    let amount = parse_number(section, key)?.unwrap_or(default);
    TimeDelta::try_milliseconds((amount * unit_seconds * 1_000.0).round() as i64)
        .ok_or_else(|| invalid(DEFAULT_SECTION, key, &amount.to_string()))
}

fn parse_id_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| v.split_whitespace().map(String::from).collect())
        .unwrap_or_default()
}

fn parse_sensor_number(section: &Properties) -> Result<u8> {
    match optional(section, "sensor_number") {
        Some(v) => v
            .parse::<u8>()
            .map_err(|_| invalid(DEFAULT_SECTION, "sensor_number", v)),
        None => Ok(1),
    }
}

fn parse_source(section: &Properties) -> Result<SourceConfig> {
    let kind = match optional(section, "source") {
        Some(kind) => kind.to_lowercase(),
        None if optional(section, "sqlite_db").is_some() => "db".to_string(),
        None if optional(section, "txson_dir").is_some() => "txson".to_string(),
        None if optional(section, "station_csv").is_some() => "csv".to_string(),
        None => {
            return Err(ConfigError::MissingField {
                section: DEFAULT_SECTION.to_string(),
                key: "source".to_string(),
            })
        }
    };
    match kind.as_str() {
        "db" => Ok(SourceConfig::Database {
            sqlite_db: PathBuf::from(required(section, "sqlite_db")?),
            sensor_ids: parse_id_list(optional(section, "sensor_ids")),
            sensor_number: parse_sensor_number(section)?,
        }),
        "txson" => Ok(SourceConfig::TxSon {
            dir: PathBuf::from(required(section, "txson_dir")?),
            site_ids: parse_id_list(optional(section, "site_ids")),
            sensor_number: parse_sensor_number(section)?,
        }),
        "csv" => Ok(SourceConfig::WideCsv {
            path: PathBuf::from(required(section, "station_csv")?),
            station_ids: optional(section, "station_ids").map(|v| parse_id_list(Some(v))),
        }),
        other => Err(invalid(DEFAULT_SECTION, "source", other)),
    }
}

fn parse_layers(ini: &Ini) -> Result<LayerSet> {
    let mut descriptors = Vec::new();
    for (name, props) in ini.iter() {
        if let Some(name) = name {
            if name.starts_with(LAYER_SECTION_PREFIX) {
                descriptors.push(LayerDescriptor::from_pairs(name, props.iter(), LayerKind::Static)?);
            }
        }
    }
    let mask = ini
        .section(Some(MASK_SECTION))
        .ok_or_else(|| ConfigError::MissingSection(MASK_SECTION.to_string()))?;
    descriptors.push(LayerDescriptor::from_pairs(MASK_SECTION, mask.iter(), LayerKind::Mask)?);
    LayerSet::new(descriptors)
}
