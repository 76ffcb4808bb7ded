//! Summary statistics reported for each fit.

/// Running count, mean and population standard deviation.
///
/// Welford's update, so tiles can be folded in one at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    count: usize,
    mean: f64,
    m2: f64,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values<'a, I: IntoIterator<Item = &'a f64>>(values: I) -> Self {
        let mut summary = Summary::new();
        for v in values {
            summary.push(*v);
        }
        summary
    }

    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// NaN when empty.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.mean
        }
    }

    /// Population standard deviation; NaN when empty.
    pub fn std(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            (self.m2 / self.count as f64).sqrt()
        }
    }
}

/// Pairs with a finite prediction.
fn finite_pairs<'a>(predicted: &'a [f64], observed: &'a [f64]) -> impl Iterator<Item = (f64, f64)> + 'a {
    predicted
        .iter()
        .zip(observed)
        .filter(|(p, _)| p.is_finite())
        .map(|(p, o)| (*p, *o))
}

/// Root mean square of `predicted - observed`, skipping non-finite predictions.
pub fn rmse(predicted: &[f64], observed: &[f64]) -> f64 {
    let squared: Vec<f64> = finite_pairs(predicted, observed)
        .map(|(p, o)| (p - o).powi(2))
        .collect();
    Summary::from_values(squared.iter()).mean().sqrt()
}

/// Mean of `predicted - observed`, skipping non-finite predictions.
pub fn bias(predicted: &[f64], observed: &[f64]) -> f64 {
    let errors: Vec<f64> = finite_pairs(predicted, observed).map(|(p, o)| p - o).collect();
    Summary::from_values(errors.iter()).mean()
}

/// Coefficient of determination of `predicted` against `observed`.
pub fn r_squared(predicted: &[f64], observed: &[f64]) -> f64 {
    let mean = Summary::from_values(observed.iter()).mean();
    let ss_res: f64 = predicted
        .iter()
        .zip(observed)
        .map(|(p, o)| (o - p).powi(2))
        .sum();
    let ss_tot: f64 = observed.iter().map(|o| (o - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        // constant target: perfect only if every prediction matches it
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    }
}
