//! Native backend: GDAL command line tools for warping, virtual stacks and
//! point queries, libgdal for band metadata and block I/O.

use crate::backend::{GridReader, GridWriter, RasterBackend, WarpRequest};
use crate::error::{RasterError, Result};
use crate::grid::{GridInfo, PixelType, Window};
use gdal::raster::Buffer;
use gdal::{Dataset, DatasetOptions, DriverManager, GdalOpenFlags, Metadata};
use ndarray::{Array2, Array3, Axis};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Default, Clone, Copy)]
pub struct GdalBackend;

impl GdalBackend {
    pub fn new() -> Self {
        GdalBackend
    }
}

/// Run a GDAL utility, returning stdout on success.
fn run_tool(program: &str, args: &[OsString]) -> Result<String> {
    log::debug!(
        "{} {}",
        program,
        args.iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| RasterError::Spawn {
            program: program.to_string(),
            source,
        })?;
    if !output.status.success() {
        return Err(RasterError::Command {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn warp_args(src: &Path, dst: &Path, request: &WarpRequest<'_>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-overwrite".into(),
        "-r".into(),
        request.resample.as_gdal_str().into(),
        "-of".into(),
        request.format.into(),
    ];
    if let Some(pixel) = request.output_type {
        args.push("-ot".into());
        args.push(pixel.as_gdal_str().into());
    }
    if let Some(bbox) = request.bounding_box {
        args.push("-te".into());
        args.extend(bbox.as_te_args().into_iter().map(OsString::from));
    }
    if let Some(nodata) = request.dst_nodata {
        args.push("-dstnodata".into());
        args.push(nodata.to_string().into());
    }
    let resolution = request.resolution.to_string();
    args.extend([
        "-t_srs".into(),
        request.projection.into(),
        "-tr".into(),
        resolution.clone().into(),
        resolution.into(),
        src.as_os_str().to_owned(),
        dst.as_os_str().to_owned(),
    ]);
    args
}

/// Parse `gdallocationinfo -valonly` output: one value per band.
fn parse_location_values(output: &str) -> Result<Vec<f64>> {
    output
        .split_whitespace()
        .map(|v| {
            v.parse::<f64>().map_err(|_| RasterError::Parse {
                program: "gdallocationinfo".to_string(),
                output: output.trim().to_string(),
            })
        })
        .collect()
}

impl RasterBackend for GdalBackend {
    fn warp(&self, src: &Path, dst: &Path, request: &WarpRequest<'_>) -> Result<()> {
        run_tool("gdalwarp", &warp_args(src, dst, request))?;
        Ok(())
    }

    fn build_virtual_stack(&self, sources: &[PathBuf], dst: &Path) -> Result<()> {
        let mut args: Vec<OsString> = vec!["-separate".into(), dst.as_os_str().to_owned()];
        args.extend(sources.iter().map(|s| s.as_os_str().to_owned()));
        run_tool("gdalbuildvrt", &args)?;
        Ok(())
    }

    fn set_band_names(&self, path: &Path, names: &[String]) -> Result<()> {
        let dataset = Dataset::open_ex(
            path,
            DatasetOptions {
                open_flags: GdalOpenFlags::GDAL_OF_UPDATE,
                ..Default::default()
            },
        )?;
        for (i, name) in names.iter().enumerate() {
            let mut band = dataset
                .rasterband(i as isize + 1)
                .map_err(|_| RasterError::BandIndex {
                    path: path.to_path_buf(),
                    band: i + 1,
                })?;
            band.set_description(name)?;
        }
        Ok(())
    }

    fn band_names(&self, path: &Path) -> Result<Vec<String>> {
        let dataset = Dataset::open(path)?;
        (1..=dataset.raster_count())
            .map(|i| {
                let band = dataset.rasterband(i)?;
                Ok(band.description().unwrap_or_default())
            })
            .collect()
    }

    fn query_point(&self, path: &Path, latitude: f64, longitude: f64) -> Result<Vec<f64>> {
        let args: Vec<OsString> = vec![
            "-valonly".into(),
            "-geoloc".into(),
            "-wgs84".into(),
            path.as_os_str().to_owned(),
            longitude.to_string().into(),
            latitude.to_string().into(),
        ];
        parse_location_values(&run_tool("gdallocationinfo", &args)?)
    }

    fn open_grid(&self, path: &Path) -> Result<Box<dyn GridReader + '_>> {
        let dataset = Dataset::open(path)?;
        let (width, height) = dataset.raster_size();
        let info = GridInfo {
            width,
            height,
            band_count: dataset.raster_count() as usize,
            geo_transform: dataset.geo_transform()?,
            projection: dataset.projection(),
        };
        Ok(Box::new(GdalReader { dataset, info }))
    }

    fn create_grid(
        &self,
        path: &Path,
        like: &GridInfo,
        bands: usize,
        pixel: PixelType,
        format: &str,
    ) -> Result<Box<dyn GridWriter + '_>> {
        let driver = DriverManager::get_driver_by_name(format)?;
        let (w, h, n) = (like.width as isize, like.height as isize, bands as isize);
        let mut dataset = match pixel {
            PixelType::Float32 => driver.create_with_band_type::<f32, _>(path, w, h, n)?,
            PixelType::Byte => driver.create_with_band_type::<u8, _>(path, w, h, n)?,
        };
        dataset.set_geo_transform(&like.geo_transform)?;
        dataset.set_projection(&like.projection)?;
        Ok(Box::new(GdalWriter {
            dataset,
            path: path.to_path_buf(),
            bands,
            pixel,
        }))
    }
}

struct GdalReader {
    dataset: Dataset,
    info: GridInfo,
}

impl GridReader for GdalReader {
    fn info(&self) -> &GridInfo {
        &self.info
    }

    fn read_window(&self, window: &Window) -> Result<Array3<f64>> {
        if !window.fits(self.info.width, self.info.height) {
            return Err(RasterError::Window(window.to_string()));
        }
        let size = (window.width, window.height);
        let mut block = Array3::zeros((self.info.band_count, window.height, window.width));
        for i in 0..self.info.band_count {
            let band = self.dataset.rasterband(i as isize + 1)?;
            let buffer =
                band.read_as::<f64>((window.x as isize, window.y as isize), size, size, None)?;
            let data = Array2::from_shape_vec((window.height, window.width), buffer.data)
                .map_err(|e| RasterError::GridMismatch(e.to_string()))?;
            block.index_axis_mut(Axis(0), i).assign(&data);
        }
        Ok(block)
    }
}

struct GdalWriter {
    dataset: Dataset,
    path: PathBuf,
    bands: usize,
    pixel: PixelType,
}

impl GridWriter for GdalWriter {
    fn write_window(&mut self, band: usize, window: &Window, data: &Array2<f64>) -> Result<()> {
        if band == 0 || band > self.bands {
            return Err(RasterError::BandIndex {
                path: self.path.clone(),
                band,
            });
        }
        if data.dim() != (window.height, window.width) {
            return Err(RasterError::Window(window.to_string()));
        }
        let mut raster_band = self.dataset.rasterband(band as isize)?;
        let offset = (window.x as isize, window.y as isize);
        let size = (window.width, window.height);
        // iter() on a standard-layout array is row-major, matching GDAL
        match self.pixel {
            PixelType::Float32 => {
                let values: Vec<f32> = data.iter().map(|v| *v as f32).collect();
                raster_band.write(offset, size, &Buffer::new(size, values))?;
            }
            PixelType::Byte => {
                let values: Vec<u8> = data
                    .iter()
                    .map(|v| PixelType::Byte.quantize(*v) as u8)
                    .collect();
                raster_band.write(offset, size, &Buffer::new(size, values))?;
            }
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        log::debug!("Closing {}", self.path.display());
        drop(self.dataset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssu_core::{BoundingBox, ResampleMethod};

    #[test]
    fn test_warp_args() {
        let bbox = BoundingBox {
            xmin: -1.0,
            ymin: -2.0,
            xmax: 3.0,
            ymax: 4.0,
        };
        let request = WarpRequest {
            resample: ResampleMethod::Bilinear,
            resolution: 100.0,
            projection: "EPSG:6933",
            bounding_box: Some(&bbox),
            dst_nodata: Some(0.0),
            output_type: None,
            format: "KEA",
        };
        let args: Vec<String> = warp_args(Path::new("in.bil"), Path::new("out.kea"), &request)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(&args[..5], &["-overwrite", "-r", "bilinear", "-of", "KEA"]);
        assert!(args.windows(2).any(|w| w == ["-dstnodata", "0"]));
        assert!(!args.contains(&"-ot".to_string()));
        assert_eq!(args[args.len() - 2..], ["in.bil", "out.kea"]);
        let te = args.iter().position(|a| a == "-te").unwrap();
        assert_eq!(args[te + 1..te + 5], ["-1", "-2", "3", "4"]);
    }

    #[test]
    fn test_parse_location_values() {
        assert_eq!(
            parse_location_values("0.25\n-9999\n1\n").unwrap(),
            vec![0.25, -9999.0, 1.0]
        );
        assert!(parse_location_values("").unwrap().is_empty());
        assert!(parse_location_values("abc").is_err());
    }
}
