//! Layer stack building.
//!
//! Every active layer is resolved to a file for the target date, dynamic
//! layers are warped onto the output grid individually, and all layers are
//! merged through a virtual stack into one physical multi-band raster whose
//! bands are named after the layers, mask last.

use crate::error::StackError;
use crate::locator::{locate_in_family, SourceFamily};
use chrono::{NaiveDate, NaiveDateTime};
use ssu_core::{BoundingBox, LayerDescriptor, LayerSet, ResampleMethod, ResolvedLayer};
use ssu_raster::format::extension_for_driver;
use ssu_raster::{PixelType, RasterBackend, WarpRequest};
use ssu_utils::dates::start_of_day;
use std::path::{Path, PathBuf};

type Result<T> = std::result::Result<T, StackError>;

const STACK_STEM: &str = "upscaling_layers_stack";

/// No-data value written into warped dynamic layers.
const SUBSET_NODATA: f64 = 0.0;

/// Output grid and location of a stack build.
#[derive(Debug, Clone)]
pub struct StackRequest<'a> {
    /// Working directory; owned and cleaned up by the caller
    pub out_dir: &'a Path,
    pub bounding_box: Option<&'a BoundingBox>,
    pub resolution: f64,
    pub projection: &'a str,
    pub gdal_format: &'a str,
}

impl StackRequest<'_> {
    fn output_path(&self, stem: &str) -> PathBuf {
        self.out_dir
            .join(format!("{}.{}", stem, extension_for_driver(self.gdal_format)))
    }

    fn warp_request(&self, resample: ResampleMethod) -> WarpRequest<'_> {
        WarpRequest {
            resample,
            resolution: self.resolution,
            projection: self.projection,
            bounding_box: self.bounding_box,
            dst_nodata: None,
            output_type: None,
            format: self.gdal_format,
        }
    }
}

/// A built stack: one band per resolved layer, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerStack {
    pub path: PathBuf,
    pub vrt_path: PathBuf,
    pub layers: Vec<ResolvedLayer>,
}

impl LayerStack {
    pub fn band_names(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.name.clone()).collect()
    }

    /// Date the named layer was matched to, if it has one.
    pub fn matched_date(&self, name: &str) -> Option<NaiveDate> {
        self.layers
            .iter()
            .find(|l| l.name == name)
            .and_then(|l| l.matched_date)
    }
}

/// Resolve one layer for `target`, warping it onto the output grid if it
/// had to be located.
pub fn resolve_layer<B: RasterBackend + ?Sized>(
    backend: &B,
    layer: &LayerDescriptor,
    target: Option<&NaiveDateTime>,
    request: &StackRequest<'_>,
) -> Result<ResolvedLayer> {
    if let Some(path) = &layer.path {
        return Ok(ResolvedLayer {
            name: layer.name.clone(),
            path: path.clone(),
            matched_date: layer.date,
        });
    }
    if !layer.is_dynamic() {
        return Err(StackError::MissingPath(layer.name.clone()));
    }
    let dir = layer
        .search_dir
        .as_deref()
        .ok_or_else(|| StackError::MissingSearchDir(layer.name.clone()))?;
    let target = match (layer.date, target) {
        (Some(date), _) => start_of_day(&date),
        (None, Some(target)) => *target,
        (None, None) => return Err(StackError::DynamicLayerNeedsDate(layer.name.clone())),
    };

    let family = SourceFamily::for_layer(&layer.name, layer.family.as_deref())?;
    let located = locate_in_family(&family, &layer.name, dir, &target)?;
    let resample = layer
        .resample_method
        .unwrap_or_else(|| family.default_resample());

    let subset = request.output_path(&format!("{}_subset", layer.name));
    let warp = WarpRequest {
        dst_nodata: Some(SUBSET_NODATA),
        ..request.warp_request(resample)
    };
    log::info!(
        "Warping {} ({}) to {}",
        located.path.display(),
        resample,
        subset.display()
    );
    backend.warp(&located.path, &subset, &warp)?;

    Ok(ResolvedLayer {
        name: layer.name.clone(),
        path: subset,
        matched_date: Some(located.matched_date),
    })
}

/// Build the stack of all active layers for `target`.
///
/// Writes a virtual stack and the final raster to `request.out_dir`.
pub fn build_stack<B: RasterBackend + ?Sized>(
    backend: &B,
    layers: &LayerSet,
    target: Option<&NaiveDateTime>,
    request: &StackRequest<'_>,
) -> Result<LayerStack> {
    std::fs::create_dir_all(request.out_dir)?;

    let resolved = layers
        .layers()
        .iter()
        .map(|layer| resolve_layer(backend, layer, target, request))
        .collect::<Result<Vec<ResolvedLayer>>>()?;

    let sources: Vec<PathBuf> = resolved.iter().map(|l| l.path.clone()).collect();
    let vrt_path = request.out_dir.join(format!("{}.vrt", STACK_STEM));
    backend.build_virtual_stack(&sources, &vrt_path)?;

    let path = request.output_path(STACK_STEM);
    let warp = WarpRequest {
        output_type: Some(PixelType::Float32),
        ..request.warp_request(ResampleMethod::Nearest)
    };
    backend.warp(&vrt_path, &path, &warp)?;

    let names: Vec<String> = resolved.iter().map(|l| l.name.clone()).collect();
    backend.set_band_names(&path, &names)?;
    let found = backend.band_names(&path)?;
    if found != names {
        return Err(StackError::BandNames {
            path,
            expected: names,
            found,
        });
    }
    log::info!("Built stack {} with bands {}", path.display(), names.join(", "));

    Ok(LayerStack {
        path,
        vrt_path,
        layers: resolved,
    })
}
