//! Random forest regressor wrapper.

use crate::error::{ModelError, Result};
use crate::stats;
use crate::table::TrainingTable;
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

pub const N_TREES: usize = 300;
pub const MAX_FEATURES: usize = 3;
pub const SEED: u64 = 17;

type Model = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// A fitted forest and the feature order it expects.
pub struct Forest {
    model: Model,
    feature_names: Vec<String>,
}

impl Forest {
    /// Fit on every row of `table`. Out-of-bag samples are retained.
    pub fn fit(table: &TrainingTable) -> Result<Self> {
        let n_features = table.feature_names.len();
        if n_features == 0 {
            return Err(ModelError::Fit("no feature bands".to_string()));
        }
        if table.is_empty() {
            return Err(ModelError::NoValidTrainingData);
        }
        let params = RandomForestRegressorParameters::default()
            .with_n_trees(N_TREES)
            .with_m(MAX_FEATURES.min(n_features))
            .with_keep_samples(true)
            .with_seed(SEED);
        let x = DenseMatrix::from_2d_vec(&table.features);
        let model = RandomForestRegressor::fit(&x, &table.target, params)
            .map_err(|e| ModelError::Fit(e.to_string()))?;
        log::debug!(
            "Fitted {} trees on {} samples of {} features",
            N_TREES,
            table.len(),
            n_features
        );
        Ok(Forest {
            model,
            feature_names: table.feature_names.clone(),
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Predict one value per row; rows are in `feature_names` order.
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let x = DenseMatrix::from_2d_vec(&rows.to_vec());
        self.model
            .predict(&x)
            .map_err(|e| ModelError::Fit(e.to_string()))
    }

    /// Out-of-bag prediction of each training row. Rows that were in the
    /// bag of every tree come back as NaN.
    pub fn predict_oob(&self, table: &TrainingTable) -> Result<Vec<f64>> {
        let x = DenseMatrix::from_2d_vec(&table.features);
        self.model
            .predict_oob(&x)
            .map_err(|e| ModelError::Fit(e.to_string()))
    }

    /// Permutation importance of each feature on `table`: the increase in
    /// mean squared error when that column is rotated by one row, clamped
    /// at zero and normalised to sum to one.
    pub fn importances(&self, table: &TrainingTable) -> Result<Vec<f64>> {
        let n_features = self.feature_names.len();
        let baseline = mse(&self.predict(&table.features)?, &table.target);
        let mut scores = Vec::with_capacity(n_features);
        for feature in 0..n_features {
            let rotated = rotate_column(&table.features, feature);
            let score = mse(&self.predict(&rotated)?, &table.target) - baseline;
            scores.push(score.max(0.0));
        }
        let total: f64 = scores.iter().sum();
        if total > 0.0 {
            scores.iter_mut().for_each(|s| *s /= total);
        }
        Ok(scores)
    }
}

fn mse(predicted: &[f64], observed: &[f64]) -> f64 {
    stats::rmse(predicted, observed).powi(2)
}

/// Copy of `rows` with column `index` shifted up by one row (wrapping).
fn rotate_column(rows: &[Vec<f64>], index: usize) -> Vec<Vec<f64>> {
    let n = rows.len();
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let mut row = row.clone();
            row[index] = rows[(i + 1) % n][index];
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Target depends on the first feature only; rows are shuffled so a
    /// one-row rotation scrambles it.
    fn table() -> TrainingTable {
        let features: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![((i * 13) % 40) as f64 / 40.0, ((i * 7) % 11) as f64])
            .collect();
        let target = features.iter().map(|r| 0.05 + 0.3 * r[0]).collect();
        TrainingTable {
            feature_names: vec!["ndvi".to_string(), "noise".to_string()],
            features,
            target,
        }
    }

    #[test]
    fn test_rotate_column() {
        let rows = vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]];
        let rotated = rotate_column(&rows, 1);
        assert_eq!(rotated, vec![vec![1.0, 20.0], vec![2.0, 30.0], vec![3.0, 10.0]]);
    }

    #[test]
    fn test_fit_predicts_within_target_range() {
        let table = table();
        let forest = Forest::fit(&table).unwrap();
        let predicted = forest.predict(&[vec![0.5, 3.0]]).unwrap();
        assert_eq!(predicted.len(), 1);
        assert!(predicted[0] >= 0.05 && predicted[0] <= 0.35);
        assert!(forest.predict(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_oob_predictions_one_per_row() {
        let table = table();
        let forest = Forest::fit(&table).unwrap();
        let oob = forest.predict_oob(&table).unwrap();
        assert_eq!(oob.len(), table.len());
        assert!(oob.iter().any(|v| v.is_finite()));
    }

    #[test]
    fn test_importances_favour_informative_feature() {
        let table = table();
        let forest = Forest::fit(&table).unwrap();
        let importances = forest.importances(&table).unwrap();
        assert_eq!(importances.len(), 2);
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_fit_without_features() {
        let table = TrainingTable {
            feature_names: vec![],
            features: vec![vec![]],
            target: vec![0.2],
        };
        assert!(matches!(Forest::fit(&table), Err(ModelError::Fit(_))));
    }

    #[test]
    fn test_fit_is_reproducible() {
        let table = table();
        let a = Forest::fit(&table).unwrap().predict(&table.features).unwrap();
        let b = Forest::fit(&table).unwrap().predict(&table.features).unwrap();
        assert_eq!(a, b);
    }
}
