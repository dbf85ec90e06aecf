//! Inductive detectors: semi-supervised and supervised regimes

use super::label_model::SurpriseLogistic;
use super::priors::{resolve_tails, tail_signs};
use super::reference::{check_matrix, quantile, TailScorer};
use super::task::{Task, TaskSpec};
use super::{check_augmented, Detector, DetectorState, FitOptions, InductiveDetector};
use crate::dataset::check_binary_labels;
use crate::error::{NirejectError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::{debug, info};

/// What distinguishes one inductive regime from another
pub trait Regime: Debug + Clone + Default {
    const TASK: Task;

    /// Weight of the label model in the blended score
    const LABEL_WEIGHT: f64;

    /// Rows that form the reference distribution
    fn reference_rows(labels: &Array1<i64>) -> Vec<usize>;
}

/// Reference from normal-labelled rows; falls back to all rows when none
/// are labelled normal
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SemiSupervised;

impl Regime for SemiSupervised {
    const TASK: Task = Task::SemiSupervised;
    const LABEL_WEIGHT: f64 = 0.3;

    fn reference_rows(labels: &Array1<i64>) -> Vec<usize> {
        let normal: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == 0)
            .map(|(i, _)| i)
            .collect();
        if normal.is_empty() {
            (0..labels.len()).collect()
        } else {
            normal
        }
    }
}

/// Reference from all rows
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Supervised;

impl Regime for Supervised {
    const TASK: Task = Task::Supervised;
    const LABEL_WEIGHT: f64 = 0.7;

    fn reference_rows(labels: &Array1<i64>) -> Vec<usize> {
        (0..labels.len()).collect()
    }
}

/// Detector that blends the tail score `u` with a label model `p` as
/// `(1 - w) * u + w * p`, `w` being the regime's label weight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InductiveNireject<R: Regime> {
    state: DetectorState,
    scorer: Option<TailScorer>,
    label_model: SurpriseLogistic,
    #[serde(skip)]
    regime: PhantomData<R>,
}

pub type SemiSupervisedNireject = InductiveNireject<SemiSupervised>;
pub type SupervisedNireject = InductiveNireject<Supervised>;

impl<R: Regime> InductiveNireject<R> {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            state: DetectorState::new(TaskSpec::new(R::TASK), seed),
            scorer: None,
            label_model: SurpriseLogistic::new(),
            regime: PhantomData,
        }
    }

    /// Construct from a parsed task, keeping its variant tag
    pub fn from_spec(spec: TaskSpec, seed: Option<u64>) -> Result<Self> {
        if spec.task != R::TASK {
            return Err(NirejectError::Validation(format!(
                "'{}' is not a {} task.",
                spec,
                R::TASK.as_str()
            )));
        }
        let mut detector = Self::new(seed);
        detector.state.task = spec;
        Ok(detector)
    }

    pub fn label_model(&self) -> &SurpriseLogistic {
        &self.label_model
    }

    fn blend(&self, scorer: &TailScorer, x: &Array2<f64>) -> Result<Array1<f64>> {
        let surprise = scorer.surprise(x)?;
        let unsupervised = scorer.calibrate(&surprise);
        let labelled = self.label_model.predict_proba(&surprise)?;
        Ok(unsupervised * (1.0 - R::LABEL_WEIGHT) + labelled * R::LABEL_WEIGHT)
    }
}

impl<R: Regime> Default for InductiveNireject<R> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<R: Regime> Detector for InductiveNireject<R> {
    fn state(&self) -> &DetectorState {
        &self.state
    }

    fn fit(&mut self, x: &Array2<f64>, y: Option<&Array1<i64>>, options: &FitOptions<'_>) -> Result<&mut Self> {
        let y = y.ok_or_else(|| {
            NirejectError::Validation(format!("Labels are required for task={}", self.state.task))
        })?;
        check_matrix(x)?;
        if y.len() != x.nrows() {
            return Err(NirejectError::Validation(format!(
                "Shape of X({}) and labels({}) does not align.",
                x.nrows(),
                y.len()
            )));
        }
        check_binary_labels(y.iter(), false)?;
        let tails = resolve_tails(options.tail_priors.as_deref(), x.ncols())?;

        let mut warnings = Vec::new();
        if let Some(aug) = options.augmented {
            warnings.extend(check_augmented(x, aug)?);
            debug!(task = %self.state.task, "augmented rows are not pooled by inductive tasks");
        }

        let rows = R::reference_rows(y);
        let reference = x.select(Axis(0), &rows);
        let scorer = TailScorer::fit(&reference, tails, options.dev, self.state.seed)?;

        let mut label_model = SurpriseLogistic::new();
        label_model.fit(&scorer.surprise(x)?, &y.mapv(|l| l as f64))?;
        self.label_model = label_model;

        let scores = self.blend(&scorer, x)?;
        let anomaly_rate = y.iter().filter(|&&l| l == 1).count() as f64 / y.len() as f64;
        let threshold = quantile(&scores, 1.0 - anomaly_rate);

        info!(
            task = %self.state.task,
            n_rows = x.nrows(),
            n_reference = rows.len(),
            anomaly_rate,
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

    fn decision_function(&self, x: &Array2<f64>, augmented: Option<&Array2<f64>>) -> Result<Array1<f64>> {
        if augmented.is_some() {
            debug!(task = %self.state.task, "ignoring augmented rows in decision_function");
        }
        self.predict_proba(x)
    }
}

impl<R: Regime> InductiveDetector for InductiveNireject<R> {
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scorer = self.scorer.as_ref().ok_or(NirejectError::ModelNotFitted)?;
        self.blend(scorer, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Column 0 is high for anomalies, column 1 is noise
    fn data() -> (Array2<f64>, Array1<i64>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| {
            let anomalous = i % 5 == 0;
            match (j, anomalous) {
                (0, true) => 10.0 + (i % 3) as f64,
                (0, false) => (i % 7) as f64,
                _ => ((i * 13) % 17) as f64,
            }
        });
        let y = Array1::from_iter((0..40).map(|i| i64::from(i % 5 == 0)));
        (x, y)
    }

    #[test]
    fn test_labels_required() {
        let (x, _) = data();
        let mut detector = SupervisedNireject::new(Some(1));
        let err = detector.fit(&x, None, &FitOptions::new()).unwrap_err();
        assert_eq!(err.to_string(), "Labels are required for task=supervised");
    }

    #[test]
    fn test_supervised_separates_classes() {
        let (x, y) = data();
        let mut detector = SupervisedNireject::new(Some(2));
        detector
            .fit(&x, Some(&y), &FitOptions::new().with_tail_priors(&[1.0, 0.0]).with_dev(true))
            .unwrap();

        let proba = detector.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|&s| (0.0..=1.0).contains(&s)));
        let mean = |class: i64| {
            let picked: Vec<f64> = (0..40).filter(|&i| y[i] == class).map(|i| proba[i]).collect();
            picked.iter().sum::<f64>() / picked.len() as f64
        };
        assert!(mean(1) > mean(0));
        assert!(detector.label_model().coefficients.as_ref().unwrap()[0] > 0.0);
    }

    #[test]
    fn test_semi_supervised_predict_matches_fit_scores() {
        let (x, y) = data();
        let mut detector = SemiSupervisedNireject::new(Some(5));
        detector.fit(&x, Some(&y), &FitOptions::new().with_dev(true)).unwrap();

        let proba = detector.predict_proba(&x).unwrap();
        assert_eq!(&proba, detector.decision_scores().unwrap());

        let labels = detector.predict(&x).unwrap();
        assert_eq!(labels.len(), 40);
        assert!(labels.iter().all(|&l| l == 0 || l == 1));
    }

    #[test]
    fn test_semi_supervised_reference_rows() {
        let y = Array1::from(vec![1, 0, 1, 0]);
        assert_eq!(SemiSupervised::reference_rows(&y), vec![1, 3]);
        let all_anomalous = Array1::from(vec![1, 1]);
        assert_eq!(SemiSupervised::reference_rows(&all_anomalous), vec![0, 1]);
    }

    #[test]
    fn test_task_mismatch() {
        let spec: TaskSpec = "supervised-i".parse().unwrap();
        assert!(SemiSupervisedNireject::from_spec(spec.clone(), None).is_err());
        let detector = SupervisedNireject::from_spec(spec, Some(1)).unwrap();
        assert_eq!(detector.state().task.to_string(), "supervised-i");
    }
}
