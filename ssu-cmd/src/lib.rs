//! Command implementations for the soil moisture upscaling CLI.
//!
//! Provides a series run over the configured time range and a single-date
//! run from an existing sensor table.

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use clap::Subcommand;
use ssu_core::{ConfigOverrides, UpscalingConfig};
use ssu_raster::RasterBackend;
use std::path::{Path, PathBuf};

pub mod outputs;
pub mod run;
pub mod single;

#[derive(Subcommand)]
pub enum Command {
    /// Upscale every averaging window between the configured start and end times
    Run {
        /// Config file
        config: PathBuf,

        /// Override the start time (YYYY-MM-DD hh:mm:ss)
        #[arg(long, value_parser = parse_timestamp)]
        start: Option<NaiveDateTime>,

        /// Override the end time (YYYY-MM-DD hh:mm:ss)
        #[arg(long, value_parser = parse_timestamp)]
        end: Option<NaiveDateTime>,
    },

    /// Upscale one date from an existing sensor CSV (siteID,Latitude,Longitude,value)
    Single {
        /// Config file
        config: PathBuf,

        /// Target date (YYYY-MM-DD)
        #[arg(short = 'd', long, value_parser = parse_day)]
        date: NaiveDate,

        /// Sensor measurements for the date
        #[arg(short = 's', long)]
        sensor_csv: PathBuf,
    },
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, String> {
    ssu_utils::dates::parse_datetime(s).map_err(|_| format!("expected YYYY-MM-DD hh:mm:ss, got '{}'", s))
}

fn parse_day(s: &str) -> Result<NaiveDate, String> {
    ssu_utils::dates::parse_date(s).map_err(|_| format!("expected YYYY-MM-DD, got '{}'", s))
}

/// Defaults, config file, environment, then command line.
pub fn load_config(path: &Path, overrides: &ConfigOverrides) -> anyhow::Result<UpscalingConfig> {
    let config = UpscalingConfig::from_file(path)
        .with_context(|| format!("Failed to load {}", path.display()))?
        .with_env(|key| std::env::var(key).ok())?
        .with_overrides(overrides)?;
    Ok(config)
}

pub fn run(command: Command, debug: bool) -> anyhow::Result<()> {
    let backend = default_backend()?;
    match command {
        Command::Run { config, start, end } => {
            let config = load_config(&config, &ConfigOverrides { start, end, debug })?;
            let source = ssu_sensors::from_config(&config.source)?;
            let summary = run::run_series(backend.as_ref(), &config, source.as_ref())?;
            if summary.processed == 0 {
                log::warn!("No dates were upscaled");
            }
            Ok(())
        }
        Command::Single {
            config,
            date,
            sensor_csv,
        } => {
            let config = load_config(
                &config,
                &ConfigOverrides {
                    debug,
                    ..Default::default()
                },
            )?;
            let result = single::run_single(backend.as_ref(), &config, date, &sensor_csv)?;
            println!("Average SM train: {:.3}", result.train_mean);
            println!("Average SM predict: {:.3}", result.predict_mean);
            Ok(())
        }
    }
}

#[cfg(feature = "gdal")]
fn default_backend() -> anyhow::Result<Box<dyn RasterBackend>> {
    Ok(Box::new(ssu_raster::gdal_backend::GdalBackend::new()))
}

#[cfg(not(feature = "gdal"))]
fn default_backend() -> anyhow::Result<Box<dyn RasterBackend>> {
    anyhow::bail!("built without the `gdal` feature: no raster backend available")
}
