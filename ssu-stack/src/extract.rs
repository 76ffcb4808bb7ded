//! Point extraction: sample the stack at each sensor location.
//!
//! The input table's first three columns are site id, latitude and
//! longitude; any further columns (the measured value) are carried through
//! untouched. Output rows are the input rows with one value per band
//! appended, in input order.

use crate::builder::LayerStack;
use crate::error::ExtractError;
use csv::{ReaderBuilder, StringRecord, Writer};
use ssu_raster::RasterBackend;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

type Result<T> = std::result::Result<T, ExtractError>;

/// Counts of rows written and points skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub written: usize,
    pub skipped: usize,
}

fn coordinates(record: &StringRecord) -> Option<(f64, f64)> {
    let latitude = record.get(1)?.trim().parse::<f64>().ok()?;
    let longitude = record.get(2)?.trim().parse::<f64>().ok()?;
    Some((latitude, longitude))
}

/// Sample `stack_path` at every row of `input` and write the joined table to
/// `output`. Points outside the raster, or whose query fails, are skipped
/// with a warning.
pub fn extract<B, R, W>(
    backend: &B,
    stack_path: &Path,
    band_names: &[String],
    input: R,
    output: W,
) -> Result<ExtractSummary>
where
    B: RasterBackend + ?Sized,
    R: Read,
    W: Write,
{
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(input);
    let header = rdr.headers()?.clone();
    if header.len() < 3 {
        return Err(ExtractError::MissingColumns(
            header.iter().collect::<Vec<_>>().join(","),
        ));
    }

    let mut wtr = Writer::from_writer(output);
    let mut out_header = header.clone();
    for name in band_names {
        out_header.push_field(name);
    }
    wtr.write_record(&out_header)?;

    let mut summary = ExtractSummary::default();
    for result in rdr.records() {
        let record = result?;
        let site = record.get(0).unwrap_or_default().to_string();
        let Some((latitude, longitude)) = coordinates(&record) else {
            log::warn!("Skipping {}: unreadable coordinates", site);
            summary.skipped += 1;
            continue;
        };
        let values = match backend.query_point(stack_path, latitude, longitude) {
            Ok(values) if values.is_empty() => {
                log::warn!(
                    "Skipping {}: no data at {}, {} (outside {}?)",
                    site,
                    latitude,
                    longitude,
                    stack_path.display()
                );
                summary.skipped += 1;
                continue;
            }
            Ok(values) if values.len() != band_names.len() => {
                log::warn!(
                    "Skipping {}: {} values returned for {} bands",
                    site,
                    values.len(),
                    band_names.len()
                );
                summary.skipped += 1;
                continue;
            }
            Ok(values) => values,
            Err(e) => {
                log::warn!("Skipping {}: {}", site, e);
                summary.skipped += 1;
                continue;
            }
        };
        let mut row = record.clone();
        for value in values {
            row.push_field(&value.to_string());
        }
        wtr.write_record(&row)?;
        summary.written += 1;
    }
    wtr.flush()?;
    Ok(summary)
}

/// [`extract`] between files, using the stack's band names.
pub fn extract_file<B: RasterBackend + ?Sized>(
    backend: &B,
    stack: &LayerStack,
    input: &Path,
    output: &Path,
) -> Result<ExtractSummary> {
    let summary = extract(
        backend,
        &stack.path,
        &stack.band_names(),
        File::open(input)?,
        File::create(output)?,
    )?;
    log::info!(
        "Extracted {} points to {} ({} skipped)",
        summary.written,
        output.display(),
        summary.skipped
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssu_raster::memory::{MemoryBackend, MemoryGrid};

    const GT: [f64; 6] = [-121.0, 0.5, 0.0, 39.0, 0.0, -0.5];

    const POINTS: &str = "\
siteID,Latitude,Longitude,SM
a1,38.8,-120.8,0.21
out,45.0,-120.8,0.30
b2,37.6,-119.2,0.05
bad,north,-120.0,0.10
";

    fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.insert("/stack.kea", MemoryGrid::constant(4, 3, GT, &[0.5, -12.25, 1.0]));
        backend
    }

    fn names() -> Vec<String> {
        vec!["ndvi".into(), "airmoss_hh".into(), "mask".into()]
    }

    fn run(backend: &MemoryBackend) -> (ExtractSummary, String) {
        let mut out = Vec::new();
        let summary = extract(
            backend,
            Path::new("/stack.kea"),
            &names(),
            POINTS.as_bytes(),
            &mut out,
        )
        .unwrap();
        (summary, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_extract_appends_bands_and_skips_misses() {
        let (summary, out) = run(&backend());
        assert_eq!(summary, ExtractSummary { written: 2, skipped: 2 });
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "siteID,Latitude,Longitude,SM,ndvi,airmoss_hh,mask");
        assert_eq!(lines[1], "a1,38.8,-120.8,0.21,0.5,-12.25,1");
        assert_eq!(lines[2], "b2,37.6,-119.2,0.05,0.5,-12.25,1");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_extract_is_repeatable() {
        let backend = backend();
        let (_, first) = run(&backend);
        let (_, second) = run(&backend);
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_stack_skips_every_point() {
        let (summary, out) = run(&MemoryBackend::new());
        assert_eq!(summary.written, 0);
        assert_eq!(summary.skipped, 4);
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn test_too_few_columns() {
        let err = extract(
            &backend(),
            Path::new("/stack.kea"),
            &names(),
            "siteID,Latitude\na,1\n".as_bytes(),
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ExtractError::MissingColumns(_)));
    }
}
