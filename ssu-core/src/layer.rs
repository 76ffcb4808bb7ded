use crate::error::{ConfigError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, collections::HashSet, fmt, path::PathBuf, str::FromStr};

/// Name every mask layer must carry.
pub const MASK_NAME: &str = "mask";

/// Whether a layer is a fixed raster, one chosen per target date, or the
/// training-region mask.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    Static,
    Dynamic,
    Mask,
}

impl FromStr for LayerKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "static" => Ok(LayerKind::Static),
            "dynamic" => Ok(LayerKind::Dynamic),
            "mask" => Ok(LayerKind::Mask),
            _ => Err(()),
        }
    }
}

/// Resampling kernels understood by the warp operation.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum ResampleMethod {
    Nearest,
    Bilinear,
    Cubic,
    CubicSpline,
    Lanczos,
    Average,
    Mode,
}

impl ResampleMethod {
    /// Name used on the `gdalwarp -r` command line.
    pub fn as_gdal_str(&self) -> &'static str {
        match self {
            ResampleMethod::Nearest => "near",
            ResampleMethod::Bilinear => "bilinear",
            ResampleMethod::Cubic => "cubic",
            ResampleMethod::CubicSpline => "cubicspline",
            ResampleMethod::Lanczos => "lanczos",
            ResampleMethod::Average => "average",
            ResampleMethod::Mode => "mode",
        }
    }
}

impl FromStr for ResampleMethod {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "near" | "nearest" => Ok(ResampleMethod::Nearest),
            "bilinear" => Ok(ResampleMethod::Bilinear),
            "cubic" => Ok(ResampleMethod::Cubic),
            "cubicspline" => Ok(ResampleMethod::CubicSpline),
            "lanczos" => Ok(ResampleMethod::Lanczos),
            "average" => Ok(ResampleMethod::Average),
            "mode" => Ok(ResampleMethod::Mode),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ResampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_gdal_str())
    }
}

/// Declaration of one covariate source, as read from a config section.
///
/// Immutable once built. Resolution against a target date produces a
/// separate [`ResolvedLayer`].
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDescriptor {
    /// Band name, unique across active layers
    pub name: String,
    pub kind: LayerKind,
    /// Raster path; required for static and mask layers
    pub path: Option<PathBuf>,
    /// Directory searched for dynamic layers without a declared path
    pub search_dir: Option<PathBuf>,
    pub nodata: Option<f64>,
    /// Fixed date for this layer, overriding the run's target date
    pub date: Option<NaiveDate>,
    /// Only valid for dynamic layers; the source family default is used otherwise
    pub resample_method: Option<ResampleMethod>,
    /// Source family of a dynamic layer when its name does not start with one
    pub family: Option<String>,
    pub use_layer: bool,
}

impl LayerDescriptor {
    /// Build a descriptor from the key/value pairs of one config section.
    ///
    /// `default_kind` is used when the section has no `type` key.
    pub fn from_pairs<'a, I>(section: &str, pairs: I, default_kind: LayerKind) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let map: BTreeMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
            .collect();
        let get = |key: &str| map.get(key).map(String::as_str).filter(|v| !v.is_empty());

        let name = get("name")
            .ok_or_else(|| ConfigError::MissingField {
                section: section.to_string(),
                key: "name".to_string(),
            })?
            .to_string();

        let kind = match get("type") {
            Some(value) => value
                .parse::<LayerKind>()
                .map_err(|_| ConfigError::UnknownLayerKind {
                    section: section.to_string(),
                    value: value.to_string(),
                })?,
            None => default_kind,
        };
        if kind == LayerKind::Mask && name != MASK_NAME {
            return Err(ConfigError::MaskNaming(name));
        }

        let path = get("path").map(PathBuf::from);
        if path.is_none() && kind != LayerKind::Dynamic {
            return Err(ConfigError::MissingField {
                section: section.to_string(),
                key: "path".to_string(),
            });
        }

        let search_dir = get("dir").map(PathBuf::from);
        if kind == LayerKind::Dynamic && path.is_none() && search_dir.is_none() {
            return Err(ConfigError::MissingField {
                section: section.to_string(),
                key: "dir".to_string(),
            });
        }

        let nodata = match get("nodata") {
            Some(value) => Some(value.parse::<f64>().map_err(|_| ConfigError::InvalidValue {
                section: section.to_string(),
                key: "nodata".to_string(),
                value: value.to_string(),
            })?),
            None => None,
        };

        let use_layer = match get("uselayer") {
            Some(value) => parse_bool(value).ok_or_else(|| ConfigError::InvalidValue {
                section: section.to_string(),
                key: "uselayer".to_string(),
                value: value.to_string(),
            })?,
            None => true,
        };

        let date = match get("date") {
            Some(value) => Some(
                ssu_utils::dates::parse_date(value).map_err(|_| ConfigError::InvalidDate {
                    layer: name.clone(),
                    value: value.to_string(),
                })?,
            ),
            None => None,
        };

        let resample_method = match get("resample_method") {
            Some(value) => {
                if kind != LayerKind::Dynamic {
                    return Err(ConfigError::ResampleOnNonDynamic(name));
                }
                Some(value.parse::<ResampleMethod>().map_err(|_| ConfigError::InvalidValue {
                    section: section.to_string(),
                    key: "resample_method".to_string(),
                    value: value.to_string(),
                })?)
            }
            None => None,
        };

        let family = match get("family") {
            Some(_) if kind != LayerKind::Dynamic => {
                return Err(ConfigError::InvalidValue {
                    section: section.to_string(),
                    key: "family".to_string(),
                    value: "only dynamic layers have a source family".to_string(),
                });
            }
            value => value.map(str::to_lowercase),
        };

        Ok(LayerDescriptor {
            name,
            kind,
            path,
            search_dir,
            nodata,
            date,
            resample_method,
            family,
            use_layer,
        })
    }

    pub fn is_dynamic(&self) -> bool {
        self.kind == LayerKind::Dynamic
    }

    pub fn is_mask(&self) -> bool {
        self.kind == LayerKind::Mask
    }
}

/// Parse the boolean spellings accepted in config files.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Validated, ordered set of active layer descriptors.
///
/// Invariants: names are unique, exactly one mask exists and it is the
/// last element. Band `i` of a stack built from this set is layer `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSet {
    layers: Vec<LayerDescriptor>,
}

impl LayerSet {
    /// Validate descriptors and move the mask to the end. Inactive layers
    /// (`uselayer = false`) are dropped before validation.
    pub fn new(descriptors: Vec<LayerDescriptor>) -> Result<Self> {
        let active: Vec<LayerDescriptor> =
            descriptors.into_iter().filter(|d| d.use_layer).collect();

        let mut seen = HashSet::new();
        for layer in &active {
            if !seen.insert(layer.name.as_str()) {
                return Err(ConfigError::DuplicateBandName(layer.name.clone()));
            }
        }

        let (mut masks, mut layers): (Vec<_>, Vec<_>) =
            active.into_iter().partition(LayerDescriptor::is_mask);
        match masks.len() {
            0 => return Err(ConfigError::MissingMask),
            1 => {}
            n => return Err(ConfigError::MultipleMasks(n)),
        }
        layers.append(&mut masks);
        Ok(LayerSet { layers })
    }

    /// All layers in band order, mask last.
    pub fn layers(&self) -> &[LayerDescriptor] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Band names in stack order.
    pub fn band_names(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.name.clone()).collect()
    }

    /// Band names used as regression features: every band except the mask.
    pub fn feature_names(&self) -> Vec<String> {
        self.layers
            .iter()
            .filter(|l| !l.is_mask())
            .map(|l| l.name.clone())
            .collect()
    }

    /// Declared no-data value of every band, in stack order.
    pub fn nodata_values(&self) -> Vec<Option<f64>> {
        self.layers.iter().map(|l| l.nodata).collect()
    }

    pub fn mask(&self) -> &LayerDescriptor {
        // LayerSet::new guarantees a trailing mask
        &self.layers[self.layers.len() - 1]
    }
}

/// A layer bound to a concrete file for one target date.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLayer {
    pub name: String,
    pub path: PathBuf,
    /// Date of the matched source file, where one is known
    pub matched_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(pairs: &[(&str, &str)]) -> Result<LayerDescriptor> {
        LayerDescriptor::from_pairs("layer1", pairs.iter().copied(), LayerKind::Static)
    }

    #[test]
    fn test_static_layer_defaults() {
        let layer = descriptor(&[("name", "ndvi"), ("path", "/data/ndvi.kea"), ("nodata", "-9999")])
            .unwrap();
        assert_eq!(layer.kind, LayerKind::Static);
        assert_eq!(layer.nodata, Some(-9999.0));
        assert!(layer.use_layer);
        assert!(layer.date.is_none());
    }

    #[test]
    fn test_name_is_required() {
        let err = descriptor(&[("path", "/data/ndvi.kea")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref key, .. } if key == "name"));
    }

    #[test]
    fn test_static_requires_path() {
        assert!(descriptor(&[("name", "ndvi")]).is_err());
    }

    #[test]
    fn test_dynamic_requires_dir_without_path() {
        let err = descriptor(&[("name", "airmoss_hh"), ("type", "dynamic")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref key, .. } if key == "dir"));

        let layer = descriptor(&[("name", "airmoss_hh"), ("type", "dynamic"), ("dir", "/radar")])
            .unwrap();
        assert!(layer.is_dynamic());
        assert!(layer.path.is_none());
    }

    #[test]
    fn test_mask_must_be_named_mask() {
        let err = descriptor(&[("name", "region"), ("type", "mask"), ("path", "/m.kea")]).unwrap_err();
        assert!(matches!(err, ConfigError::MaskNaming(_)));
    }

    #[test]
    fn test_resample_only_for_dynamic() {
        let err = descriptor(&[("name", "ndvi"), ("path", "/a"), ("resample_method", "average")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::ResampleOnNonDynamic(_)));

        let layer = descriptor(&[
            ("name", "prism_ppt"),
            ("type", "dynamic"),
            ("dir", "/prism"),
            ("resample_method", "cubic"),
        ])
        .unwrap();
        assert_eq!(layer.resample_method, Some(ResampleMethod::Cubic));
    }

    #[test]
    fn test_bad_date_and_nodata() {
        let err = descriptor(&[("name", "ndvi"), ("path", "/a"), ("date", "22/07/2015")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDate { .. }));

        let err = descriptor(&[("name", "ndvi"), ("path", "/a"), ("nodata", "none")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_family_only_for_dynamic() {
        let layer = descriptor(&[
            ("name", "radar_hh"),
            ("type", "dynamic"),
            ("dir", "/radar"),
            ("family", "AirMOSS"),
        ])
        .unwrap();
        assert_eq!(layer.family.as_deref(), Some("airmoss"));

        let err = descriptor(&[("name", "ndvi"), ("path", "/a"), ("family", "prism")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "family"));
    }

    fn mask() -> LayerDescriptor {
        LayerDescriptor::from_pairs("mask", [("name", "mask"), ("path", "/m.kea")], LayerKind::Mask)
            .unwrap()
    }

    #[test]
    fn test_layer_set_moves_mask_last() {
        let ndvi = descriptor(&[("name", "ndvi"), ("path", "/a")]).unwrap();
        let radar = descriptor(&[("name", "radar_hh"), ("type", "dynamic"), ("dir", "/b")]).unwrap();
        let set = LayerSet::new(vec![mask(), ndvi, radar]).unwrap();
        assert_eq!(set.band_names(), vec!["ndvi", "radar_hh", "mask"]);
        assert_eq!(set.feature_names(), vec!["ndvi", "radar_hh"]);
        assert_eq!(set.mask().name, "mask");
    }

    #[test]
    fn test_layer_set_rejects_duplicates_and_mask_count() {
        let ndvi = descriptor(&[("name", "ndvi"), ("path", "/a")]).unwrap();
        let err = LayerSet::new(vec![ndvi.clone(), ndvi.clone(), mask()]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateBandName(_)));

        let err = LayerSet::new(vec![ndvi.clone()]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingMask));

        // Two masks are also duplicate names; the name check fires first
        let err = LayerSet::new(vec![ndvi, mask(), mask()]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateBandName(_)));
    }

    #[test]
    fn test_inactive_layers_are_dropped() {
        let ndvi = descriptor(&[("name", "ndvi"), ("path", "/a"), ("uselayer", "false")]).unwrap();
        let dem = descriptor(&[("name", "dem"), ("path", "/d")]).unwrap();
        let set = LayerSet::new(vec![ndvi, dem, mask()]).unwrap();
        assert_eq!(set.band_names(), vec!["dem", "mask"]);
    }
}
