//! Label-informed component of the inductive detectors

use crate::error::{NirejectError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// L2-regularized logistic regression on per-feature tail surprises with
/// weights constrained to be non-negative.
///
/// Surprise grows towards the prior-indicated tail, so non-negative weights
/// keep the label component monotone in the same direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurpriseLogistic {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    /// L2 regularization strength
    pub alpha: f64,
    pub max_iter: usize,
    pub learning_rate: f64,
    /// Convergence tolerance on the projected gradient norm
    pub tol: f64,
}

impl Default for SurpriseLogistic {
    fn default() -> Self {
        Self::new()
    }
}

impl SurpriseLogistic {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            alpha: 0.01,
            max_iter: 500,
            learning_rate: 0.1,
            tol: 1e-6,
        }
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    /// Full-batch projected gradient descent
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(NirejectError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }

        let mut weights = Array1::zeros(x.ncols());
        let mut bias = 0.0;
        let lr = self.learning_rate;

        for _ in 0..self.max_iter {
            let predictions = Self::sigmoid(&(x.dot(&weights) + bias));
            let errors = &predictions - y;
            let dw = x.t().dot(&errors) / n_samples as f64 + self.alpha * &weights;
            let db = errors.mean().unwrap_or(0.0);

            let next = (&weights - &(lr * &dw)).mapv(|w: f64| w.max(0.0));
            let step = (&next - &weights).mapv(|d| d * d).sum() + (lr * db).powi(2);
            weights = next;
            bias -= lr * db;

            if step.sqrt() < self.tol * lr {
                break;
            }
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        Ok(self)
    }

    /// Probability of the anomalous class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(NirejectError::ModelNotFitted)?;
        if x.ncols() != coefficients.len() {
            return Err(NirejectError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        let intercept = self.intercept.unwrap_or(0.0);
        Ok(Self::sigmoid(&(x.dot(coefficients) + intercept)))
    }
}
