//! Detector configuration

use super::{FitOptions, Nireject, TaskSpec};
use crate::error::{NirejectError, Result};
use serde::{Deserialize, Serialize};

/// Detector parameters of one experiment run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Task string, optionally with a variant suffix
    pub task: String,
    /// One prior per feature in {-1, 0, +1}; larger magnitudes are reduced
    /// to their sign
    pub tail_priors: Option<Vec<f64>>,
    /// Expected anomaly rate of unsupervised tasks, in (0, 0.5]
    pub contamination: f64,
    pub seed: Option<u64>,
    pub dev: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            task: "unsupervised-t".to_string(),
            tail_priors: Some(vec![-1.0, -1.0, 1.0, 0.0, 0.0, 0.0, -1.0, 1.0, -1.0]),
            contamination: 0.1,
            seed: None,
            dev: false,
        }
    }
}

impl DetectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = task.into();
        self
    }

    pub fn with_tail_priors(mut self, priors: Option<Vec<f64>>) -> Self {
        self.tail_priors = priors;
        self
    }

    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.task.parse::<TaskSpec>()?;
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(NirejectError::invalid_parameter(
                "contamination",
                self.contamination,
                "must lie in (0, 0.5]",
            ));
        }
        Ok(())
    }

    /// Build the configured detector
    pub fn build(&self) -> Result<Nireject> {
        self.validate()?;
        Nireject::new(&self.task, self.seed)?.with_contamination(self.contamination)
    }

    /// Fit options carrying the configured priors and dev flag
    pub fn fit_options(&self) -> FitOptions<'static> {
        FitOptions {
            tail_priors: self.tail_priors.clone(),
            augmented: None,
            dev: self.dev,
        }
    }
}
