//! Transductive unsupervised detector

use super::priors::{resolve_tails, tail_signs};
use super::reference::{check_matrix, quantile, TailScorer};
use super::task::{Task, TaskSpec};
use super::{check_augmented, Detector, DetectorState, FitOptions};
use crate::error::{NirejectError, Result};
use ndarray::{concatenate, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Unsupervised Nireject.
///
/// Scores come from ranking rows against the fitted rows pooled with any
/// augmented rows. There is no standalone query path: new rows are scored
/// with [`Detector::decision_function`], which builds its own reference from
/// the rows it is given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsupervisedNireject {
    state: DetectorState,
    /// Expected anomaly rate, used as the threshold quantile
    contamination: f64,
    scorer: Option<TailScorer>,
}

impl UnsupervisedNireject {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            state: DetectorState::new(TaskSpec::new(Task::Unsupervised), seed),
            contamination: 0.1,
            scorer: None,
        }
    }

    /// Construct from a parsed task, keeping its variant tag
    pub fn from_spec(spec: TaskSpec, seed: Option<u64>) -> Result<Self> {
        if spec.task != Task::Unsupervised {
            return Err(NirejectError::Validation(format!(
                "'{}' is not an unsupervised task.",
                spec
            )));
        }
        let mut detector = Self::new(seed);
        detector.state.task = spec;
        Ok(detector)
    }

    /// Set the expected anomaly rate, in (0, 0.5]
    pub fn with_contamination(mut self, contamination: f64) -> Result<Self> {
        if !(contamination > 0.0 && contamination <= 0.5) {
            return Err(NirejectError::invalid_parameter(
                "contamination",
                contamination,
                "must lie in (0, 0.5]",
            ));
        }
        self.contamination = contamination;
        Ok(self)
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }
}

impl Default for UnsupervisedNireject {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Rows of `x` followed by the augmented rows
fn pooled(x: &Array2<f64>, augmented: Option<&Array2<f64>>) -> Result<Array2<f64>> {
    match augmented {
        Some(aug) => Ok(concatenate(Axis(0), &[x.view(), aug.view()])?),
        None => Ok(x.clone()),
    }
}

impl Detector for UnsupervisedNireject {
    fn state(&self) -> &DetectorState {
        &self.state
    }

    fn fit(&mut self, x: &Array2<f64>, _y: Option<&Array1<i64>>, options: &FitOptions<'_>) -> Result<&mut Self> {
        check_matrix(x)?;
        let tails = resolve_tails(options.tail_priors.as_deref(), x.ncols())?;

        let mut warnings = Vec::new();
        if let Some(aug) = options.augmented {
            warnings.extend(check_augmented(x, aug)?);
        }

        let reference = pooled(x, options.augmented)?;
        let scorer = TailScorer::fit(&reference, tails, options.dev, self.state.seed)?;
        let scores = scorer.score(x)?;
        let threshold = quantile(&scores, 1.0 - self.contamination);

        info!(
            task = %self.state.task,
            n_rows = x.nrows(),
            n_reference = reference.nrows(),
            dev = options.dev,
            "fitted detector"
        );

        self.state.tail_priors = Some(tail_signs(scorer.tails()));
        self.state.decision_scores = Some(scores);
        self.state.threshold = Some(threshold);
        self.state.dev = options.dev;
        self.state.warnings = warnings;
        self.state.fitted = true;
        self.scorer = Some(scorer);
        Ok(self)
    }

    /// Score `x` against itself pooled with `augmented`, using the fitted
    /// priors and calibration settings
    fn decision_function(&self, x: &Array2<f64>, augmented: Option<&Array2<f64>>) -> Result<Array1<f64>> {
        let fitted = self.scorer.as_ref().ok_or(NirejectError::ModelNotFitted)?;
        check_matrix(x)?;
        if x.ncols() != fitted.n_features() {
            return Err(NirejectError::ShapeError {
                expected: format!("{} features", fitted.n_features()),
                actual: format!("{} features", x.ncols()),
            });
        }
        if let Some(aug) = augmented {
            check_augmented(x, aug)?;
        }

        let reference = pooled(x, augmented)?;
        let scorer = TailScorer::fit(&reference, fitted.tails().to_vec(), self.state.dev, self.state.seed)?;
        scorer.score(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, 3), |(i, j)| ((i * 7 + j * 3) % 11) as f64 + if i == 0 { 20.0 } else { 0.0 })
    }

    #[test]
    fn test_fit_scores_are_bounded() {
        let x = data(30);
        let mut detector = UnsupervisedNireject::new(Some(1));
        detector.fit(&x, None, &FitOptions::new().with_dev(true)).unwrap();

        let scores = detector.decision_scores().unwrap();
        assert_eq!(scores.len(), 30);
        assert!(scores.iter().all(|&s| (0.0..=1.0).contains(&s)));
        assert!(detector.is_fitted());
    }

    #[test]
    fn test_fit_predict_flags_outlier() {
        let x = data(30);
        let mut detector = UnsupervisedNireject::new(Some(1));
        let labels = detector
            .fit_predict(&x, None, &FitOptions::new().with_dev(true))
            .unwrap();
        assert_eq!(labels[0], 1);
        assert!(labels.iter().filter(|&&l| l == 1).count() <= 4);
    }

    #[test]
    fn test_decision_function_requires_fit() {
        let detector = UnsupervisedNireject::new(None);
        assert!(matches!(
            detector.decision_function(&data(5), None),
            Err(NirejectError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_decision_function_on_new_rows() {
        let x = data(30);
        let mut detector = UnsupervisedNireject::new(Some(3));
        detector.fit(&x, None, &FitOptions::new().with_dev(true)).unwrap();

        let fresh = data(12);
        let aug = fresh.mapv(|v| v + 0.5);
        let scores = detector.decision_function(&fresh, Some(&aug)).unwrap();
        assert_eq!(scores.len(), 12);
        assert!(scores.iter().all(|&s| (0.0..=1.0).contains(&s)));
    }

    #[test]
    fn test_identical_augmentation_is_recorded() {
        let x = data(10);
        let mut detector = UnsupervisedNireject::new(Some(3));
        detector
            .fit(&x, None, &FitOptions::new().with_augmented(&x).with_dev(true))
            .unwrap();
        assert_eq!(detector.state().warnings.len(), 1);
    }

    #[test]
    fn test_contamination_bounds() {
        assert!(UnsupervisedNireject::new(None).with_contamination(0.0).is_err());
        assert!(UnsupervisedNireject::new(None).with_contamination(0.6).is_err());
        assert!(UnsupervisedNireject::new(None).with_contamination(0.5).is_ok());
    }
}
