//! Dynamic layer location.
//!
//! A dynamic layer's name selects its source family by prefix:
//!
//! | prefix    | files                                | match       |
//! |-----------|--------------------------------------|-------------|
//! | `airmoss` | `*_hh_*vrt`, date in 3rd `_` element | nearest day |
//! | `uavsar`  | `*_HHHH_*kea`, date in 2nd element   | nearest day |
//! | `prism`   | `PRISM_<var>_*_<YYYYMMDD>_bil.bil`   | exact day   |
//! | `ecmwf`   | `*<YYYYMMDD>_<HH>_100m.kea`          | exact hour  |
//!
//! A layer may name its family explicitly instead (`family = airmoss`), in
//! which case the prefix of the layer name is not consulted.
//!
//! Radar families take the polarization from the last `_` element of the
//! layer name (`airmoss_vv`) and derive the sibling file by substituting the
//! polarization token into the matched HH file name. Siblings are not
//! checked for existence here.

use crate::error::LocateError;
use chrono::{NaiveDate, NaiveDateTime};
use glob::{glob, Pattern};
use ssu_core::ResampleMethod;
use ssu_utils::dates::{abs_diff_seconds, format_compact, parse_short_compact, start_of_day};
use std::path::{Path, PathBuf};

type Result<T> = std::result::Result<T, LocateError>;

/// Largest accepted distance between target and radar acquisition.
pub const MAX_TIME_DIFF_SECONDS: i64 = 10_000_000_000;

/// Minimum number of `.kea` files a UAVSAR date needs to be usable.
const UAVSAR_MIN_FILES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarization {
    Hh,
    Vv,
    Hv,
}

impl Polarization {
    fn parse(layer: &str, token: &str) -> Result<Self> {
        match token.to_uppercase().as_str() {
            "HH" => Ok(Polarization::Hh),
            "VV" => Ok(Polarization::Vv),
            "HV" => Ok(Polarization::Hv),
            _ => Err(LocateError::UnknownPolarization {
                layer: layer.to_string(),
                polarization: token.to_string(),
            }),
        }
    }
}

/// Where a dynamic layer's files come from and how they are matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFamily {
    Airmoss(Polarization),
    Uavsar(Polarization),
    Prism { variable: String },
    Ecmwf,
}

/// A located source file and the date it was acquired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub path: PathBuf,
    pub matched_date: NaiveDate,
}

impl SourceFamily {
    pub fn from_layer_name(name: &str) -> Result<Self> {
        Self::for_layer(name, None)
    }

    /// Family for layer `name`, taken from `family` when given and from the
    /// name prefix otherwise.
    pub fn for_layer(name: &str, family: Option<&str>) -> Result<Self> {
        let key = family.unwrap_or(name);
        let last = name.rsplit('_').next().unwrap_or(name);
        if key.starts_with("airmoss") {
            Ok(SourceFamily::Airmoss(Polarization::parse(name, last)?))
        } else if key.starts_with("uavsar") {
            Ok(SourceFamily::Uavsar(Polarization::parse(name, last)?))
        } else if key.starts_with("prism") {
            Ok(SourceFamily::Prism {
                variable: last.to_string(),
            })
        } else if key.starts_with("ecmwf") {
            Ok(SourceFamily::Ecmwf)
        } else {
            Err(LocateError::UnknownFamily(key.to_string()))
        }
    }

    /// Resampling used when the layer does not declare one.
    pub fn default_resample(&self) -> ResampleMethod {
        match self {
            SourceFamily::Airmoss(_) | SourceFamily::Uavsar(_) => ResampleMethod::Average,
            SourceFamily::Prism { .. } => ResampleMethod::Bilinear,
            // already resampled with cubic convolution upstream
            SourceFamily::Ecmwf => ResampleMethod::Nearest,
        }
    }

    pub fn locate(&self, layer: &str, dir: &Path, target: &NaiveDateTime) -> Result<Located> {
        let not_found = || LocateError::NotFound {
            layer: layer.to_string(),
            target: *target,
        };
        match self {
            SourceFamily::Airmoss(pol) => {
                let candidates = radar_candidates(dir, "*_hh_*vrt", 2)?;
                let (path, date) = nearest(candidates, target).ok_or_else(not_found)?;
                let sibling = match pol {
                    Polarization::Hh => "_hh_",
                    Polarization::Vv => "_vv_",
                    Polarization::Hv => "_hv_",
                };
                Ok(Located {
                    path: substitute(&path, "_hh_", sibling),
                    matched_date: date,
                })
            }
            SourceFamily::Uavsar(pol) => {
                let candidates = radar_candidates(dir, "*_HHHH_*kea", 1)?
                    .into_iter()
                    .filter(|(_, date)| {
                        count_files(dir, &format!("*{}*kea", short_date(date)))
                            >= UAVSAR_MIN_FILES
                    })
                    .collect();
                let (path, date) = nearest(candidates, target).ok_or_else(not_found)?;
                let sibling = match pol {
                    Polarization::Hh => "_HHHH_",
                    Polarization::Vv => "_VVVV_",
                    Polarization::Hv => "_HVHV_",
                };
                Ok(Located {
                    path: substitute(&path, "_HHHH_", sibling),
                    matched_date: date,
                })
            }
            SourceFamily::Prism { variable } => {
                let pattern = format!(
                    "PRISM_{}_*_{}_bil.bil",
                    variable,
                    format_compact(&target.date())
                );
                let path = first_match(dir, &pattern)?.ok_or_else(not_found)?;
                Ok(Located {
                    path,
                    matched_date: target.date(),
                })
            }
            SourceFamily::Ecmwf => {
                let pattern = format!(
                    "*{}_{}_100m.kea",
                    format_compact(&target.date()),
                    target.format("%H")
                );
                let path = first_match(dir, &pattern)?.ok_or_else(not_found)?;
                Ok(Located {
                    path,
                    matched_date: target.date(),
                })
            }
        }
    }
}

/// Locate the source file for dynamic layer `layer` closest to `target`.
pub fn locate(layer: &str, dir: &Path, target: &NaiveDateTime) -> Result<Located> {
    locate_in_family(&SourceFamily::from_layer_name(layer)?, layer, dir, target)
}

pub fn locate_in_family(
    family: &SourceFamily,
    layer: &str,
    dir: &Path,
    target: &NaiveDateTime,
) -> Result<Located> {
    let located = family.locate(layer, dir, target)?;
    log::debug!(
        "Layer {} matched {} ({})",
        layer,
        located.path.display(),
        located.matched_date
    );
    Ok(located)
}

/// Files in `dir` matching `pattern`, sorted by path. Only `pattern` is
/// treated as a glob.
fn sorted_matches(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = Path::new(&Pattern::escape(&dir.to_string_lossy())).join(pattern);
    let mut paths = Vec::new();
    for entry in glob(&full.to_string_lossy())? {
        match entry {
            Ok(path) => paths.push(path),
            Err(e) => log::warn!("Bad path from glob: {:?}", e),
        }
    }
    paths.sort();
    Ok(paths)
}

fn first_match(dir: &Path, pattern: &str) -> Result<Option<PathBuf>> {
    Ok(sorted_matches(dir, pattern)?.into_iter().next())
}

fn count_files(dir: &Path, pattern: &str) -> usize {
    sorted_matches(dir, pattern).map(|p| p.len()).unwrap_or(0)
}

/// Sorted radar files with the date parsed from `_`-element `date_index`.
/// Files whose names do not carry a date there are skipped.
fn radar_candidates(
    dir: &Path,
    pattern: &str,
    date_index: usize,
) -> Result<Vec<(PathBuf, NaiveDate)>> {
    let paths = sorted_matches(dir, pattern)?;
    if paths.is_empty() {
        return Err(LocateError::NoCandidates {
            dir: dir.to_path_buf(),
            pattern: pattern.to_string(),
        });
    }
    Ok(paths
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            match name
                .split('_')
                .nth(date_index)
                .and_then(|token| parse_short_compact(token).ok())
            {
                Some(date) => Some((path, date)),
                None => {
                    log::debug!("Skipping {}: no date in name", name);
                    None
                }
            }
        })
        .collect())
}

/// Candidate closest in time to `target`. Candidates are visited in order
/// and replace the current best only when strictly closer, so ties go to
/// the earliest.
fn nearest(
    candidates: Vec<(PathBuf, NaiveDate)>,
    target: &NaiveDateTime,
) -> Option<(PathBuf, NaiveDate)> {
    let mut min_diff = MAX_TIME_DIFF_SECONDS;
    let mut best = None;
    for (path, date) in candidates {
        let diff = abs_diff_seconds(&start_of_day(&date), target);
        if diff < min_diff {
            min_diff = diff;
            best = Some((path, date));
        }
    }
    best
}

fn short_date(date: &NaiveDate) -> String {
    date.format("%y%m%d").to_string()
}

/// Replace `from` with `to` in the file name only.
fn substitute(path: &Path, from: &str, to: &str) -> PathBuf {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => path.with_file_name(name.replace(from, to)),
        None => path.to_path_buf(),
    }
}
