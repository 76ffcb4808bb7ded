//! Running result tables, appended to after every processed date.

use chrono::NaiveDate;
use csv::Writer;
use ssu_model::FitResult;
use ssu_utils::dates::format_compact;
use std::fs::File;
use std::path::Path;

pub const STATS_FILE: &str = "scaling_function_stats.csv";
pub const IMPORTANCE_FILE: &str = "scaling_function_var_importance.csv";

const STATS_HEADER: [&str; 10] = [
    "Date",
    "nSamples",
    "avgSM_train",
    "stdSM_train",
    "avgSM_predict",
    "stdSM_predict",
    "RMSE",
    "Bias",
    "RSq",
    "AuxDate",
];

/// Fit statistics and variable importances, one row per date.
pub struct ResultFiles {
    stats: Writer<File>,
    importance: Writer<File>,
    importance_header: bool,
}

impl ResultFiles {
    /// Create both files in `dir`, truncating existing ones.
    pub fn create(dir: &Path) -> anyhow::Result<Self> {
        let mut stats = Writer::from_path(dir.join(STATS_FILE))?;
        stats.write_record(STATS_HEADER)?;
        stats.flush()?;
        let importance = Writer::from_path(dir.join(IMPORTANCE_FILE))?;
        Ok(ResultFiles {
            stats,
            importance,
            importance_header: false,
        })
    }

    /// Append the rows for `date`. The importance header is taken from the
    /// first result written.
    pub fn append(&mut self, date: &NaiveDate, result: &FitResult, aux_date: Option<NaiveDate>) -> anyhow::Result<()> {
        let aux = aux_date
            .map(|d| format_compact(&d))
            .unwrap_or_else(|| "NA".to_string());
        self.stats.write_record([
            format_compact(date),
            result.n_samples.to_string(),
            result.train_mean.to_string(),
            result.train_std.to_string(),
            result.predict_mean.to_string(),
            result.predict_std.to_string(),
            result.rmse.to_string(),
            result.bias.to_string(),
            result.r_squared.to_string(),
            aux,
        ])?;
        self.stats.flush()?;

        if !self.importance_header {
            self.importance.write_record(&result.feature_names)?;
            self.importance_header = true;
        }
        self.importance
            .write_record(result.importances.iter().map(|v| v.to_string()))?;
        self.importance.flush()?;
        Ok(())
    }
}
