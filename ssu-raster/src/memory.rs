//! In-process raster store keyed by path.
//!
//! Grids use geographic coordinates directly: x is longitude, y is
//! latitude. Warping copies the source grid unchanged (no reprojection),
//! which keeps pipeline tests independent of a native GDAL install while
//! still exercising every call the pipeline makes.

use crate::backend::{GridReader, GridWriter, RasterBackend, WarpRequest};
use crate::error::{RasterError, Result};
use crate::grid::{GeoTransform, GridInfo, PixelType, Window};
use ndarray::{s, Array2, Array3, Axis};
use ssu_core::ResampleMethod;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A raster held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryGrid {
    pub info: GridInfo,
    pub bands: Vec<Array2<f64>>,
    pub names: Vec<String>,
    pub nodata: Vec<Option<f64>>,
}

impl MemoryGrid {
    /// Build a grid from bands that all share one shape `(rows, cols)`.
    pub fn new(geo_transform: GeoTransform, bands: Vec<Array2<f64>>) -> Result<Self> {
        let (height, width) = bands.first().map(|b| b.dim()).unwrap_or((0, 0));
        if bands.iter().any(|b| b.dim() != (height, width)) {
            return Err(RasterError::GridMismatch(
                "bands have different shapes".to_string(),
            ));
        }
        let band_count = bands.len();
        Ok(MemoryGrid {
            info: GridInfo {
                width,
                height,
                band_count,
                geo_transform,
                projection: String::new(),
            },
            bands,
            names: vec![String::new(); band_count],
            nodata: vec![None; band_count],
        })
    }

    /// Grid where band `i` holds `values[i]` everywhere.
    pub fn constant(width: usize, height: usize, geo_transform: GeoTransform, values: &[f64]) -> Self {
        let bands: Vec<Array2<f64>> = values
            .iter()
            .map(|v| Array2::from_elem((height, width), *v))
            .collect();
        let band_count = bands.len();
        MemoryGrid {
            info: GridInfo {
                width,
                height,
                band_count,
                geo_transform,
                projection: String::new(),
            },
            bands,
            names: vec![String::new(); band_count],
            nodata: vec![None; band_count],
        }
    }

    /// Declare a nodata value on band `band` (1-based).
    pub fn with_nodata(mut self, band: usize, value: f64) -> Self {
        if let Some(slot) = band.checked_sub(1).and_then(|i| self.nodata.get_mut(i)) {
            *slot = Some(value);
        }
        self
    }

    fn zeros(like: &GridInfo, bands: usize) -> Self {
        let mut grid = MemoryGrid::constant(
            like.width,
            like.height,
            like.geo_transform,
            &vec![0.0; bands],
        );
        grid.info.projection = like.projection.clone();
        grid
    }
}

/// Call made against a [`MemoryBackend`], recorded for assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Warp {
        src: PathBuf,
        dst: PathBuf,
        resample: ResampleMethod,
        output_type: Option<PixelType>,
        dst_nodata: Option<f64>,
    },
    BuildVirtualStack {
        sources: Vec<PathBuf>,
        dst: PathBuf,
    },
    SetBandNames {
        path: PathBuf,
        names: Vec<String>,
    },
    CreateGrid {
        path: PathBuf,
        bands: usize,
        pixel: PixelType,
    },
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    grids: RefCell<BTreeMap<PathBuf, MemoryGrid>>,
    calls: RefCell<Vec<BackendCall>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, grid: MemoryGrid) {
        self.grids.borrow_mut().insert(path.into(), grid);
    }

    pub fn get(&self, path: &Path) -> Option<MemoryGrid> {
        self.grids.borrow().get(path).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.grids.borrow().contains_key(path)
    }

    /// Calls made so far, oldest first.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.borrow().clone()
    }

    fn fetch(&self, path: &Path) -> Result<MemoryGrid> {
        self.get(path)
            .ok_or_else(|| RasterError::NotFound(path.to_path_buf()))
    }

    fn record(&self, call: BackendCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl RasterBackend for MemoryBackend {
    fn warp(&self, src: &Path, dst: &Path, request: &WarpRequest<'_>) -> Result<()> {
        let mut grid = self.fetch(src)?;
        grid.info.projection = request.projection.to_string();
        if let Some(nodata) = request.dst_nodata {
            grid.nodata = vec![Some(nodata); grid.bands.len()];
        }
        if let Some(pixel) = request.output_type {
            for band in grid.bands.iter_mut() {
                band.mapv_inplace(|v| pixel.quantize(v));
            }
        }
        self.record(BackendCall::Warp {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            resample: request.resample,
            output_type: request.output_type,
            dst_nodata: request.dst_nodata,
        });
        self.insert(dst, grid);
        Ok(())
    }

    fn build_virtual_stack(&self, sources: &[PathBuf], dst: &Path) -> Result<()> {
        let mut bands = Vec::with_capacity(sources.len());
        let mut nodata = Vec::with_capacity(sources.len());
        let mut first: Option<GridInfo> = None;
        for source in sources {
            let grid = self.fetch(source)?;
            let info = first.get_or_insert_with(|| grid.info.clone());
            if info.width != grid.info.width
                || info.height != grid.info.height
                || info.geo_transform != grid.info.geo_transform
            {
                return Err(RasterError::GridMismatch(format!(
                    "{} does not share the grid of {}",
                    source.display(),
                    sources[0].display()
                )));
            }
            let band = grid
                .bands
                .first()
                .cloned()
                .ok_or_else(|| RasterError::BandIndex {
                    path: source.clone(),
                    band: 1,
                })?;
            bands.push(band);
            nodata.push(grid.nodata.first().copied().flatten());
        }
        let info = first.ok_or_else(|| {
            RasterError::GridMismatch("no sources for virtual stack".to_string())
        })?;
        let mut stack = MemoryGrid::new(info.geo_transform, bands)?;
        stack.info.projection = info.projection;
        stack.nodata = nodata;
        self.record(BackendCall::BuildVirtualStack {
            sources: sources.to_vec(),
            dst: dst.to_path_buf(),
        });
        self.insert(dst, stack);
        Ok(())
    }

    fn set_band_names(&self, path: &Path, names: &[String]) -> Result<()> {
        let mut grids = self.grids.borrow_mut();
        let grid = grids
            .get_mut(path)
            .ok_or_else(|| RasterError::NotFound(path.to_path_buf()))?;
        if names.len() > grid.bands.len() {
            return Err(RasterError::BandIndex {
                path: path.to_path_buf(),
                band: grid.bands.len() + 1,
            });
        }
        for (slot, name) in grid.names.iter_mut().zip(names) {
            *slot = name.clone();
        }
        drop(grids);
        self.record(BackendCall::SetBandNames {
            path: path.to_path_buf(),
            names: names.to_vec(),
        });
        Ok(())
    }

    fn band_names(&self, path: &Path) -> Result<Vec<String>> {
        Ok(self.fetch(path)?.names)
    }

    fn query_point(&self, path: &Path, latitude: f64, longitude: f64) -> Result<Vec<f64>> {
        let grid = self.fetch(path)?;
        Ok(match grid.info.pixel_of(longitude, latitude) {
            Some((col, row)) => grid.bands.iter().map(|b| b[[row, col]]).collect(),
            None => Vec::new(),
        })
    }

    fn open_grid(&self, path: &Path) -> Result<Box<dyn GridReader + '_>> {
        Ok(Box::new(MemoryReader {
            grid: self.fetch(path)?,
        }))
    }

    fn create_grid(
        &self,
        path: &Path,
        like: &GridInfo,
        bands: usize,
        pixel: PixelType,
        _format: &str,
    ) -> Result<Box<dyn GridWriter + '_>> {
        self.record(BackendCall::CreateGrid {
            path: path.to_path_buf(),
            bands,
            pixel,
        });
        Ok(Box::new(MemoryWriter {
            backend: self,
            path: path.to_path_buf(),
            grid: MemoryGrid::zeros(like, bands),
            pixel,
        }))
    }
}

struct MemoryReader {
    grid: MemoryGrid,
}

impl GridReader for MemoryReader {
    fn info(&self) -> &GridInfo {
        &self.grid.info
    }

    fn read_window(&self, window: &Window) -> Result<Array3<f64>> {
        if !window.fits(self.grid.info.width, self.grid.info.height) {
            return Err(RasterError::Window(window.to_string()));
        }
        let mut block = Array3::zeros((self.grid.bands.len(), window.height, window.width));
        for (i, band) in self.grid.bands.iter().enumerate() {
            block.index_axis_mut(Axis(0), i).assign(&band.slice(s![
                window.y..window.y + window.height,
                window.x..window.x + window.width
            ]));
        }
        Ok(block)
    }
}

struct MemoryWriter<'a> {
    backend: &'a MemoryBackend,
    path: PathBuf,
    grid: MemoryGrid,
    pixel: PixelType,
}

impl GridWriter for MemoryWriter<'_> {
    fn write_window(&mut self, band: usize, window: &Window, data: &Array2<f64>) -> Result<()> {
        let index = band
            .checked_sub(1)
            .filter(|i| *i < self.grid.bands.len())
            .ok_or_else(|| RasterError::BandIndex {
                path: self.path.clone(),
                band,
            })?;
        if !window.fits(self.grid.info.width, self.grid.info.height)
            || data.dim() != (window.height, window.width)
        {
            return Err(RasterError::Window(window.to_string()));
        }
        let pixel = self.pixel;
        self.grid.bands[index]
            .slice_mut(s![
                window.y..window.y + window.height,
                window.x..window.x + window.width
            ])
            .assign(&data.mapv(|v| pixel.quantize(v)));
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let MemoryWriter {
            backend,
            path,
            grid,
            ..
        } = *self;
        backend.insert(path, grid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GT: GeoTransform = [-121.0, 0.5, 0.0, 39.0, 0.0, -0.5];

    fn request() -> WarpRequest<'static> {
        WarpRequest {
            resample: ResampleMethod::Average,
            resolution: 100.0,
            projection: "EPSG:6933",
            bounding_box: None,
            dst_nodata: Some(0.0),
            output_type: None,
            format: "KEA",
        }
    }

    #[test]
    fn test_warp_copies_grid_and_records_call() {
        let backend = MemoryBackend::new();
        backend.insert("/in/a.kea", MemoryGrid::constant(4, 3, GT, &[5.0]));
        backend
            .warp(Path::new("/in/a.kea"), Path::new("/out/a.kea"), &request())
            .unwrap();
        let out = backend.get(Path::new("/out/a.kea")).unwrap();
        assert_eq!(out.info.width, 4);
        assert_eq!(out.nodata, vec![Some(0.0)]);
        assert_eq!(out.info.projection, "EPSG:6933");
        assert!(matches!(
            backend.calls()[0],
            BackendCall::Warp {
                resample: ResampleMethod::Average,
                ..
            }
        ));
    }

    #[test]
    fn test_warp_missing_source() {
        let backend = MemoryBackend::new();
        let err = backend
            .warp(Path::new("/in/none.kea"), Path::new("/out/a.kea"), &request())
            .unwrap_err();
        assert!(matches!(err, RasterError::NotFound(_)));
    }

    #[test]
    fn test_virtual_stack_orders_bands() {
        let backend = MemoryBackend::new();
        backend.insert("/a", MemoryGrid::constant(4, 3, GT, &[1.0]).with_nodata(1, -9999.0));
        backend.insert("/b", MemoryGrid::constant(4, 3, GT, &[2.0, 7.0]));
        backend
            .build_virtual_stack(&[PathBuf::from("/b"), PathBuf::from("/a")], Path::new("/s.vrt"))
            .unwrap();
        let stack = backend.get(Path::new("/s.vrt")).unwrap();
        assert_eq!(stack.info.band_count, 2);
        assert_eq!(stack.bands[0][[0, 0]], 2.0);
        assert_eq!(stack.bands[1][[0, 0]], 1.0);
        assert_eq!(stack.nodata, vec![None, Some(-9999.0)]);
    }

    #[test]
    fn test_virtual_stack_grid_mismatch() {
        let backend = MemoryBackend::new();
        backend.insert("/a", MemoryGrid::constant(4, 3, GT, &[1.0]));
        backend.insert("/b", MemoryGrid::constant(5, 3, GT, &[1.0]));
        let err = backend
            .build_virtual_stack(&[PathBuf::from("/a"), PathBuf::from("/b")], Path::new("/s.vrt"))
            .unwrap_err();
        assert!(matches!(err, RasterError::GridMismatch(_)));
    }

    #[test]
    fn test_band_names_too_many() {
        let backend = MemoryBackend::new();
        backend.insert("/a", MemoryGrid::constant(4, 3, GT, &[1.0, 2.0]));
        let names = vec!["x".to_string(), "y".to_string()];
        backend.set_band_names(Path::new("/a"), &names).unwrap();
        assert_eq!(backend.band_names(Path::new("/a")).unwrap(), names);

        let three = vec!["x".to_string(), "y".to_string(), "z".to_string()];
        let err = backend.set_band_names(Path::new("/a"), &three).unwrap_err();
        assert!(matches!(err, RasterError::BandIndex { band: 3, .. }));
    }

    #[test]
    fn test_query_point() {
        let backend = MemoryBackend::new();
        backend.insert("/a", MemoryGrid::constant(4, 3, GT, &[1.0, 2.0]));
        assert_eq!(
            backend.query_point(Path::new("/a"), 38.2, -120.2).unwrap(),
            vec![1.0, 2.0]
        );
        assert!(backend
            .query_point(Path::new("/a"), 45.0, -120.2)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_blockwise_write_then_read() {
        let backend = MemoryBackend::new();
        let like = MemoryGrid::constant(4, 3, GT, &[0.0]).info;
        let mut writer = backend
            .create_grid(Path::new("/o.kea"), &like, 1, PixelType::Byte, "KEA")
            .unwrap();
        let window = Window::new(2, 1, 2, 2);
        writer
            .write_window(1, &window, &Array2::from_elem((2, 2), 17.6))
            .unwrap();
        assert!(writer
            .write_window(2, &window, &Array2::zeros((2, 2)))
            .is_err());
        writer.finish().unwrap();

        let reader = backend.open_grid(Path::new("/o.kea")).unwrap();
        let block = reader.read_window(&Window::new(0, 0, 4, 3)).unwrap();
        assert_eq!(block.dim(), (1, 3, 4));
        assert_eq!(block[[0, 2, 3]], 18.0);
        assert_eq!(block[[0, 0, 0]], 0.0);
        assert!(reader.read_window(&Window::new(3, 0, 2, 1)).is_err());
    }
}
