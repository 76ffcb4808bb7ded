//! Upscaling for one date from an existing sensor table.

use ssu_core::UpscalingConfig;
use ssu_model::{fit_and_apply, FitResult};
use ssu_raster::format::extension_for_driver;
use ssu_raster::RasterBackend;
use ssu_stack::{build_stack, extract_file, StackRequest};
use ssu_utils::dates::start_of_day;
use ssu_utils::fs::ensure_dir;
use chrono::NaiveDate;
use std::path::Path;

pub const EXTRACTED_CSV: &str = "sensor_layer_data.csv";
pub const IMAGE_STEM: &str = "upscaled_sm_image";

/// Build the stack for `date` in the output directory, sample it at the
/// sensors of `sensor_csv` and upscale.
pub fn run_single<B: RasterBackend + ?Sized>(
    backend: &B,
    config: &UpscalingConfig,
    date: NaiveDate,
    sensor_csv: &Path,
) -> anyhow::Result<FitResult> {
    ensure_dir(&config.out_dir)?;
    let request = StackRequest {
        out_dir: &config.out_dir,
        bounding_box: config.bounding_box.as_ref(),
        resolution: config.resolution,
        projection: &config.projection,
        gdal_format: &config.gdal_format,
    };
    let stack = build_stack(backend, &config.layers, Some(&start_of_day(&date)), &request)?;

    let extracted = config.out_dir.join(EXTRACTED_CSV);
    extract_file(backend, &stack, sensor_csv, &extracted)?;

    let image = config.out_dir.join(format!(
        "{}.{}",
        IMAGE_STEM,
        extension_for_driver(&config.gdal_format)
    ));
    Ok(fit_and_apply(
        backend,
        &extracted,
        &stack.path,
        &image,
        &config.layers,
        &config.gdal_format,
    )?)
}
