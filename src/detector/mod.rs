//! Nireject bad-channel detector
//!
//! Scores observations as normal or anomalous under three supervision
//! regimes:
//! - Unsupervised (transductive): scores exist only jointly with a fit
//! - Semi-supervised (inductive): reference built from normal-labelled rows
//! - Supervised (inductive): reference built from all rows
//!
//! Every feature is ranked against an empirical reference distribution and
//! read in the tail given by its directional prior. Inductive regimes blend
//! this score with a label model, so fitted detectors answer post-fit
//! queries. All scores lie in [0, 1], higher meaning more anomalous.

mod config;
mod inductive;
mod label_model;
mod nireject;
mod priors;
mod reference;
mod task;
mod unsupervised;

pub use config::DetectorConfig;
pub use inductive::{InductiveNireject, Regime, SemiSupervised, SemiSupervisedNireject, Supervised, SupervisedNireject};
pub use label_model::SurpriseLogistic;
pub use nireject::Nireject;
pub use priors::{resolve_tails, tail_signs, Tail};
pub use reference::{quantile, ReferenceDistribution, TailScorer};
pub use task::{Task, TaskSpec};
pub use unsupervised::UnsupervisedNireject;

use crate::error::{NirejectError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Options of a fit call
#[derive(Debug, Clone, Default)]
pub struct FitOptions<'a> {
    /// One prior per feature; magnitudes are reduced to their sign
    pub tail_priors: Option<Vec<f64>>,
    /// Synthetic variants pooled into the reference distribution
    pub augmented: Option<&'a Array2<f64>>,
    /// Fixed-cost deterministic fitting path
    pub dev: bool,
}

impl<'a> FitOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tail_priors(mut self, priors: &[f64]) -> Self {
        self.tail_priors = Some(priors.to_vec());
        self
    }

    pub fn with_augmented(mut self, augmented: &'a Array2<f64>) -> Self {
        self.augmented = Some(augmented);
        self
    }

    pub fn with_dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }
}

/// Non-fatal findings of a fit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsistencyWarning {
    /// Augmented rows coincide value by value with the primary rows
    AugmentedMatchesPrimary { n_rows: usize },
}

impl fmt::Display for ConsistencyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyWarning::AugmentedMatchesPrimary { n_rows } => write!(
                f,
                "augmented data is identical to the primary data ({} rows); augmentation is expected to be distinct",
                n_rows
            ),
        }
    }
}

/// Mutable state of one detector instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorState {
    pub task: TaskSpec,
    pub seed: Option<u64>,
    pub fitted: bool,
    /// Effective priors after sign reduction
    pub tail_priors: Option<Array1<i8>>,
    /// Scores of the rows passed to the last fit
    pub decision_scores: Option<Array1<f64>>,
    pub threshold: Option<f64>,
    /// Whether the last fit ran the deterministic path
    pub dev: bool,
    pub warnings: Vec<ConsistencyWarning>,
}

impl DetectorState {
    pub fn new(task: TaskSpec, seed: Option<u64>) -> Self {
        Self {
            task,
            seed,
            fitted: false,
            tail_priors: None,
            decision_scores: None,
            threshold: None,
            dev: false,
            warnings: Vec::new(),
        }
    }
}

/// Capabilities shared by every supervision regime
pub trait Detector {
    fn state(&self) -> &DetectorState;

    /// Fit on `x`; `y` is required by the inductive regimes and ignored by
    /// the unsupervised one
    fn fit(&mut self, x: &Array2<f64>, y: Option<&Array1<i64>>, options: &FitOptions<'_>) -> Result<&mut Self>
    where
        Self: Sized;

    /// Score rows of `x`. Only the unsupervised regime uses `augmented`.
    fn decision_function(&self, x: &Array2<f64>, augmented: Option<&Array2<f64>>) -> Result<Array1<f64>>;

    fn fit_predict_proba(
        &mut self,
        x: &Array2<f64>,
        y: Option<&Array1<i64>>,
        options: &FitOptions<'_>,
    ) -> Result<Array1<f64>>
    where
        Self: Sized,
    {
        self.fit(x, y, options)?;
        self.decision_scores().cloned().ok_or(NirejectError::ModelNotFitted)
    }

    fn fit_predict(&mut self, x: &Array2<f64>, y: Option<&Array1<i64>>, options: &FitOptions<'_>) -> Result<Array1<i64>>
    where
        Self: Sized,
    {
        let scores = self.fit_predict_proba(x, y, options)?;
        self.threshold_scores(&scores)
    }

    fn decision_scores(&self) -> Option<&Array1<f64>> {
        self.state().decision_scores.as_ref()
    }

    fn tail_priors(&self) -> Option<&Array1<i8>> {
        self.state().tail_priors.as_ref()
    }

    fn is_fitted(&self) -> bool {
        self.state().fitted
    }

    /// 1 where the score exceeds the fitted threshold
    fn threshold_scores(&self, scores: &Array1<f64>) -> Result<Array1<i64>> {
        let threshold = self.state().threshold.ok_or(NirejectError::ModelNotFitted)?;
        Ok(scores.mapv(|s| i64::from(s > threshold)))
    }
}

/// Post-fit queries on arbitrary rows
pub trait InductiveDetector: Detector {
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        let scores = self.predict_proba(x)?;
        self.threshold_scores(&scores)
    }
}

/// Cross-check augmented rows against the primary rows.
///
/// Column counts must agree. Identical data is reported as a warning.
pub(crate) fn check_augmented(x: &Array2<f64>, augmented: &Array2<f64>) -> Result<Option<ConsistencyWarning>> {
    if augmented.ncols() != x.ncols() {
        return Err(NirejectError::ShapeError {
            expected: format!("augmented with {} features", x.ncols()),
            actual: format!("augmented with {} features", augmented.ncols()),
        });
    }
    if augmented.nrows() == x.nrows() && augmented == x {
        let warning = ConsistencyWarning::AugmentedMatchesPrimary { n_rows: x.nrows() };
        warn!("{}", warning);
        return Ok(Some(warning));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_identical_augmentation_warns() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let warning = check_augmented(&x, &x.clone()).unwrap();
        assert_eq!(warning, Some(ConsistencyWarning::AugmentedMatchesPrimary { n_rows: 2 }));

        let distinct = array![[1.5, 2.0], [3.0, 4.0]];
        assert_eq!(check_augmented(&x, &distinct).unwrap(), None);
    }

    #[test]
    fn test_augmented_width_checked() {
        let x = array![[1.0, 2.0]];
        assert!(check_augmented(&x, &array![[1.0]]).is_err());
    }

    #[test]
    fn test_fit_options_builder() {
        let aug = array![[0.0]];
        let options = FitOptions::new()
            .with_tail_priors(&[1.0])
            .with_augmented(&aug)
            .with_dev(true);
        assert!(options.dev);
        assert_eq!(options.tail_priors, Some(vec![1.0]));
        assert!(options.augmented.is_some());
    }
}
