//! Z-score standardization fitted on the train side of a split

use crate::error::{NirejectError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Standard scaler: (x - mean) / std per column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            mean: None,
            scale: None,
        }
    }

    /// Fit column means and population standard deviations.
    /// Constant columns keep a scale of 1.
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(NirejectError::Validation(
                "Cannot fit a scaler on zero rows".to_string(),
            ));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| NirejectError::Validation("Cannot fit a scaler on zero rows".to_string()))?;
        let scale = x.std_axis(Axis(0), 0.0).mapv(|s| if s < 1e-12 { 1.0 } else { s });

        self.mean = Some(mean);
        self.scale = Some(scale);
        Ok(self)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (mean, scale) = match (&self.mean, &self.scale) {
            (Some(m), Some(s)) => (m, s),
            _ => return Err(NirejectError::ModelNotFitted),
        };

        if x.ncols() != mean.len() {
            return Err(NirejectError::ShapeError {
                expected: format!("{} columns", mean.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        Ok((x - mean) / scale)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}
