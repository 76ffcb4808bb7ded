//! Raster format selection.
//!
//! Driver names follow GDAL (`KEA`, `GTiff`, `HFA`, `ENVI`).

/// File extension to use for a GDAL driver name.
pub fn extension_for_driver(driver: &str) -> String {
    match driver {
        "ENVI" => "bsq".to_string(),
        "GTiff" => "tif".to_string(),
        "HFA" => "img".to_string(),
        other => other.to_lowercase(),
    }
}
