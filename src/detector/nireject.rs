//! Task-string facade over the three detector variants

use super::inductive::{SemiSupervisedNireject, SupervisedNireject};
use super::task::{Task, TaskSpec};
use super::unsupervised::UnsupervisedNireject;
use super::{ConsistencyWarning, Detector, DetectorState, FitOptions, InductiveDetector};
use crate::error::{NirejectError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Detector selected by a task string such as `"unsupervised"` or
/// `"supervised-i"`.
///
/// `predict` and `predict_proba` fail for unsupervised tasks, which only
/// score jointly with a fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Nireject {
    Unsupervised(UnsupervisedNireject),
    SemiSupervised(SemiSupervisedNireject),
    Supervised(SupervisedNireject),
}

impl Nireject {
    pub fn new(task: &str, seed: Option<u64>) -> Result<Self> {
        let spec: TaskSpec = task.parse()?;
        Ok(match spec.task {
            Task::Unsupervised => Nireject::Unsupervised(UnsupervisedNireject::from_spec(spec, seed)?),
            Task::SemiSupervised => Nireject::SemiSupervised(SemiSupervisedNireject::from_spec(spec, seed)?),
            Task::Supervised => Nireject::Supervised(SupervisedNireject::from_spec(spec, seed)?),
        })
    }

    /// Expected anomaly rate of unsupervised tasks; inductive tasks derive
    /// their threshold from the labels and keep no such setting
    pub fn with_contamination(self, contamination: f64) -> Result<Self> {
        match self {
            Nireject::Unsupervised(d) => Ok(Nireject::Unsupervised(d.with_contamination(contamination)?)),
            other => Ok(other),
        }
    }

    fn detector(&self) -> &dyn Detector {
        match self {
            Nireject::Unsupervised(d) => d,
            Nireject::SemiSupervised(d) => d,
            Nireject::Supervised(d) => d,
        }
    }

    fn inductive(&self, function: &str) -> Result<&dyn InductiveDetector> {
        match self {
            Nireject::Unsupervised(d) => Err(NirejectError::UnsupportedFunction {
                function: function.to_string(),
                task: d.state().task.to_string(),
            }),
            Nireject::SemiSupervised(d) => Ok(d),
            Nireject::Supervised(d) => Ok(d),
        }
    }

    pub fn state(&self) -> &DetectorState {
        self.detector().state()
    }

    pub fn task(&self) -> &TaskSpec {
        &self.state().task
    }

    pub fn seed(&self) -> Option<u64> {
        self.state().seed
    }

    pub fn is_fitted(&self) -> bool {
        self.state().fitted
    }

    /// Effective priors of the last fit
    pub fn tail_priors(&self) -> Option<&Array1<i8>> {
        self.state().tail_priors.as_ref()
    }

    /// Scores of the rows passed to the last fit
    pub fn decision_scores(&self) -> Option<&Array1<f64>> {
        self.state().decision_scores.as_ref()
    }

    pub fn warnings(&self) -> &[ConsistencyWarning] {
        &self.state().warnings
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: Option<&Array1<i64>>, options: &FitOptions<'_>) -> Result<&mut Self> {
        match self {
            Nireject::Unsupervised(d) => {
                d.fit(x, y, options)?;
            }
            Nireject::SemiSupervised(d) => {
                d.fit(x, y, options)?;
            }
            Nireject::Supervised(d) => {
                d.fit(x, y, options)?;
            }
        }
        Ok(self)
    }

    pub fn fit_predict_proba(
        &mut self,
        x: &Array2<f64>,
        y: Option<&Array1<i64>>,
        options: &FitOptions<'_>,
    ) -> Result<Array1<f64>> {
        self.fit(x, y, options)?;
        self.decision_scores().cloned().ok_or(NirejectError::ModelNotFitted)
    }

    pub fn fit_predict(&mut self, x: &Array2<f64>, y: Option<&Array1<i64>>, options: &FitOptions<'_>) -> Result<Array1<i64>> {
        let scores = self.fit_predict_proba(x, y, options)?;
        self.detector().threshold_scores(&scores)
    }

    pub fn decision_function(&self, x: &Array2<f64>, augmented: Option<&Array2<f64>>) -> Result<Array1<f64>> {
        self.detector().decision_function(x, augmented)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inductive("predict_proba")?.predict_proba(x)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        self.inductive("predict")?.predict(x)
    }
}

impl fmt::Display for Nireject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seed = match self.seed() {
            Some(seed) => seed.to_string(),
            None => "None".to_string(),
        };
        write!(
            f,
            "Nireject({{'seed': {}, 'task': '{}'}}, fitted={})",
            seed,
            self.task(),
            self.is_fitted()
        )
    }
}
