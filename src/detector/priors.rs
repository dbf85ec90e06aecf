//! Directional tail priors

use crate::error::{NirejectError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Tail of a feature's distribution where anomalies are expected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tail {
    /// Prior -1
    Low,
    /// Prior 0: no direction, both tails count
    Both,
    /// Prior +1
    High,
}

impl Tail {
    /// Reduce any magnitude to its sign
    pub fn from_prior(value: f64) -> Self {
        if value > 0.0 {
            Tail::High
        } else if value < 0.0 {
            Tail::Low
        } else {
            Tail::Both
        }
    }

    pub fn sign(&self) -> i8 {
        match self {
            Tail::Low => -1,
            Tail::Both => 0,
            Tail::High => 1,
        }
    }

    /// Probability of a value at least as extreme in this tail, given its
    /// empirical CDF position `cdf` in (0, 1)
    pub fn probability(&self, cdf: f64) -> f64 {
        match self {
            Tail::Low => cdf,
            Tail::High => 1.0 - cdf,
            Tail::Both => (2.0 * cdf.min(1.0 - cdf)).min(1.0),
        }
    }
}

/// Effective per-feature tails.
///
/// Absent priors mean no direction for every feature. Supplied priors must
/// match the feature count exactly.
pub fn resolve_tails(priors: Option<&[f64]>, n_features: usize) -> Result<Vec<Tail>> {
    match priors {
        None => Ok(vec![Tail::Both; n_features]),
        Some(values) => {
            if values.len() != n_features {
                return Err(NirejectError::Validation(format!(
                    "Shape of X({}) and tail_priors({}) does not align.",
                    n_features,
                    values.len()
                )));
            }
            if let Some(bad) = values.iter().find(|v| v.is_nan()) {
                return Err(NirejectError::Validation(format!(
                    "tail_priors must be numeric, found {}",
                    bad
                )));
            }
            Ok(values.iter().map(|&v| Tail::from_prior(v)).collect())
        }
    }
}

/// Signs of the tails, as reported on the detector state
pub fn tail_signs(tails: &[Tail]) -> Array1<i8> {
    tails.iter().map(Tail::sign).collect()
}
