//! Upscaling over a series of averaging windows.
//!
//! Each window gets its own temporary working directory, removed when the
//! window is done whether it succeeded or not. A failing window is logged
//! and skipped, unless the run is in debug mode, in which case the error
//! ends the run.

use crate::outputs::ResultFiles;
use anyhow::Context;
use log::{error, info, warn};
use ssu_core::{TimeWindow, UpscalingConfig};
use ssu_model::{colour_image, fit_and_apply, ColourTable};
use ssu_raster::format::extension_for_driver;
use ssu_raster::RasterBackend;
use ssu_sensors::SensorSource;
use ssu_stack::{build_stack, extract_file, StackRequest};
use ssu_utils::dates::format_compact;
use ssu_utils::fs::ensure_dir;
use std::path::Path;

const TEMP_PREFIX: &str = "soilscape_upscaling";

/// What happened to each window of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    /// Too few sensor records
    pub skipped: usize,
    pub failed: usize,
}

enum WindowOutcome {
    Processed,
    TooFewRecords(usize),
}

/// Run every window of the configured schedule.
pub fn run_series<B: RasterBackend + ?Sized>(
    backend: &B,
    config: &UpscalingConfig,
    source: &dyn SensorSource,
) -> anyhow::Result<RunSummary> {
    for dir in [&config.out_dir, &config.stats_dir, &config.csv_dir, &config.images_dir] {
        ensure_dir(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let colour = config
        .colour_image
        .then(|| ColourTable::for_max(config.max_sm_col))
        .transpose()?;
    let mut results = ResultFiles::create(&config.stats_dir)?;
    let mut summary = RunSummary::default();

    info!("Upscaling {} from {} to {}", source.describe(), config.start, config.end);
    for window in config.schedule() {
        let label = format_compact(&window.date());
        let work = tempfile::Builder::new().prefix(TEMP_PREFIX).tempdir()?;
        let outcome = process_window(
            backend,
            config,
            source,
            &window,
            work.path(),
            &mut results,
            colour.as_ref(),
        );
        if let Err(e) = work.close() {
            warn!("Could not remove working directory: {}", e);
        }

        match outcome {
            Ok(WindowOutcome::Processed) => summary.processed += 1,
            Ok(WindowOutcome::TooFewRecords(n)) => {
                info!("{}: only {} sensor records, skipping", label, n);
                summary.skipped += 1;
            }
            Err(e) if config.debug => return Err(e.context(format!("Failed on {}", label))),
            Err(e) => {
                error!("{}: {:#}", label, e);
                summary.failed += 1;
            }
        }
    }
    info!(
        "Finished: {} processed, {} skipped, {} failed",
        summary.processed, summary.skipped, summary.failed
    );
    Ok(summary)
}

fn process_window<B: RasterBackend + ?Sized>(
    backend: &B,
    config: &UpscalingConfig,
    source: &dyn SensorSource,
    window: &TimeWindow,
    work_dir: &Path,
    results: &mut ResultFiles,
    colour: Option<&ColourTable>,
) -> anyhow::Result<WindowOutcome> {
    let label = format_compact(&window.date());
    let sensor_csv = work_dir.join(format!("{}_sensor_data.csv", label));
    let n_records = ssu_sensors::assemble(source, window, &sensor_csv)
        .with_context(|| format!("Failed to extract sensor data for {}", label))?;
    if n_records < config.min_records {
        return Ok(WindowOutcome::TooFewRecords(n_records));
    }
    info!("***** {} *****", label);

    let request = StackRequest {
        out_dir: work_dir,
        bounding_box: config.bounding_box.as_ref(),
        resolution: config.resolution,
        projection: &config.projection,
        gdal_format: &config.gdal_format,
    };
    let stack = build_stack(backend, &config.layers, Some(&window.start), &request)?;

    let training_csv = config.csv_dir.join(format!("{}_sensor_data.csv", label));
    extract_file(backend, &stack, &sensor_csv, &training_csv)?;

    let ext = extension_for_driver(&config.gdal_format);
    let image = config.images_dir.join(format!("{}_predict_sm.{}", label, ext));
    let result = fit_and_apply(
        backend,
        &training_csv,
        &stack.path,
        &image,
        &config.layers,
        &config.gdal_format,
    )?;
    info!(
        "{}: {} samples, RMSE {:.4}, bias {:.4}, R² {:.3}",
        label, result.n_samples, result.rmse, result.bias, result.r_squared
    );
    results.append(
        &window.date(),
        &result,
        stack.matched_date(&config.aux_date_layer),
    )?;

    if let Some(table) = colour {
        let coloured = config
            .images_dir
            .join(format!("{}_predict_sm_col.{}", label, ext));
        colour_image(backend, &image, &coloured, table, &config.gdal_format)?;
    }
    Ok(WindowOutcome::Processed)
}
