//! Empirical reference distribution, tail surprise and score calibration

use super::priors::Tail;
use crate::error::{NirejectError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Bootstrap resamples used to estimate the calibration scale
const N_RESAMPLES: usize = 50;

/// Per-feature sorted reference values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceDistribution {
    columns: Vec<Vec<f64>>,
}

impl ReferenceDistribution {
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        check_matrix(x)?;
        let columns = x
            .axis_iter(Axis(1))
            .map(|col| {
                let mut values = col.to_vec();
                values.sort_by(f64::total_cmp);
                values
            })
            .collect();
        Ok(Self { columns })
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// Mid-rank empirical CDF of `value` for one feature, strictly inside (0, 1)
    pub fn cdf(&self, feature: usize, value: f64) -> f64 {
        let sorted = &self.columns[feature];
        let less = sorted.partition_point(|&r| r < value);
        let less_equal = sorted.partition_point(|&r| r <= value);
        let equal = (less_equal - less) as f64;
        (less as f64 + 0.5 * equal + 0.5) / (sorted.len() as f64 + 1.0)
    }
}

/// Reference distribution plus the tails and calibration used to score
/// against it.
///
/// Per feature the tail probability `p` of a value is turned into a
/// surprise `-ln p`. The mean surprise `S` over features maps to
/// `1 - 2^(-S / scale)`, which lies in [0, 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailScorer {
    reference: ReferenceDistribution,
    tails: Vec<Tail>,
    scale: f64,
}

impl TailScorer {
    /// Fit on the reference rows.
    ///
    /// The scale is the median mean-surprise of the reference rows. Outside
    /// `dev` it is averaged over seeded bootstrap resamples of those rows.
    pub fn fit(reference: &Array2<f64>, tails: Vec<Tail>, dev: bool, seed: Option<u64>) -> Result<Self> {
        if tails.len() != reference.ncols() {
            return Err(NirejectError::ShapeError {
                expected: format!("{} tails", reference.ncols()),
                actual: format!("{} tails", tails.len()),
            });
        }

        let mut scorer = Self {
            reference: ReferenceDistribution::fit(reference)?,
            tails,
            scale: 1.0,
        };
        let aggregates = aggregate(&scorer.surprise(reference)?);

        let scale = if dev {
            median(aggregates.to_vec())
        } else {
            let mut rng = match seed {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            };
            let n = aggregates.len();
            (0..N_RESAMPLES)
                .map(|_| median((0..n).map(|_| aggregates[rng.gen_range(0..n)]).collect()))
                .sum::<f64>()
                / N_RESAMPLES as f64
        };
        scorer.scale = scale.max(1e-12);
        Ok(scorer)
    }

    pub fn tails(&self) -> &[Tail] {
        &self.tails
    }

    pub fn n_features(&self) -> usize {
        self.reference.n_features()
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Per-feature surprise `-ln p`, one row per row of `x`
    pub fn surprise(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        check_matrix(x)?;
        if x.ncols() != self.n_features() {
            return Err(NirejectError::ShapeError {
                expected: format!("{} features", self.n_features()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(Array2::from_shape_fn(x.dim(), |(i, j)| {
            let cdf = self.reference.cdf(j, x[[i, j]]);
            -self.tails[j].probability(cdf).ln()
        }))
    }

    /// Map per-feature surprises to scores in [0, 1]
    pub fn calibrate(&self, surprise: &Array2<f64>) -> Array1<f64> {
        aggregate(surprise).mapv(|s| 1.0 - 2f64.powf(-s / self.scale))
    }

    pub fn score(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.calibrate(&self.surprise(x)?))
    }
}

fn aggregate(surprise: &Array2<f64>) -> Array1<f64> {
    surprise
        .mean_axis(Axis(1))
        .unwrap_or_else(|| Array1::zeros(surprise.nrows()))
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    quantile_sorted(&values, 0.5)
}

/// Linearly interpolated quantile of `values`, `q` in [0, 1]
pub fn quantile(values: &Array1<f64>, q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, q)
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Non-empty matrix of finite values
pub(crate) fn check_matrix(x: &Array2<f64>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(NirejectError::Validation(format!(
            "Expected a non-empty feature matrix, got shape ({}, {})",
            x.nrows(),
            x.ncols()
        )));
    }
    if let Some(((i, j), v)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(NirejectError::Validation(format!(
            "Feature matrix holds a non-finite value {} at row {}, column {}",
            v, i, j
        )));
    }
    Ok(())
}
