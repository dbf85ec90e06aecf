//! Label perturbation for robustness experiments
//!
//! Five operations that degrade the labels of a training partition in a
//! controlled, replayable way:
//! - Binary label shuffling (flip a fraction of all labels)
//! - Class-preserving shuffling (flip equal counts of both classes)
//! - Paired class shuffling (swap labels along an explicit pair map)
//! - Partial labeling (drop a fraction of the anomalous rows)
//! - Contamination control (drop or duplicate anomalous rows)
//!
//! Every operation returns its decision (flipped positions, pair map or
//! removed/added positions) next to the perturbed values. Passing that
//! decision back in replays the perturbation exactly, without touching
//! the random generator. Inputs are never mutated.

mod config;
mod resample;
mod shuffle;
mod storage;

pub use config::{NoiseStrategy, PerturbationConfig, PerturbationRecord, PerturbedTrain};
pub use storage::{KeyedTable, RowStorage};

use crate::error::{NirejectError, Result};
use ndarray::Array1;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pair map of paired class shuffling: key position -> partner position
pub type PairMap = BTreeMap<usize, usize>;

/// Labels after binary or class-preserving shuffling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelShuffle {
    pub labels: Array1<i64>,
    /// Flipped positions; `None` when the call was a no-op
    pub shuffled_idx: Option<Vec<usize>>,
}

/// Labels after paired class shuffling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairedShuffle {
    pub labels: Array1<i64>,
    pub pairs: Option<PairMap>,
}

/// Rows left after partial labeling
#[derive(Debug, Clone, PartialEq)]
pub struct Rated<D, I> {
    pub data: D,
    pub labels: Array1<i64>,
    pub idx: I,
    /// Removed anomalous positions; `None` when the call was a no-op
    pub unlabel_idx: Option<Vec<usize>>,
}

/// Rows after contamination control
#[derive(Debug, Clone, PartialEq)]
pub struct Contaminated<D, I> {
    pub data: D,
    pub labels: Array1<i64>,
    pub idx: I,
    pub remove_idx: Option<Vec<usize>>,
    pub add_idx: Option<Vec<usize>>,
}

/// Seeded entry point of the perturbation operations.
///
/// Each call draws from a fresh generator seeded with `seed`, so the same
/// engine applied twice to the same input yields the same result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerturbationEngine {
    seed: Option<u64>,
}

impl PerturbationEngine {
    pub fn new() -> Self {
        Self { seed: None }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Generator of one operation. Operations share the seed but each reads
    /// its own ChaCha stream, so their draws are independent.
    fn rng(&self, operation: Operation) -> ChaCha8Rng {
        let mut rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        rng.set_stream(operation as u64);
        rng
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    BinaryShuffle = 1,
    PreservingShuffle = 2,
    PairedShuffle = 3,
    PartialLabeling = 4,
    Contamination = 5,
}

/// Reject NaN and infinite rates before any bound check reads them
fn check_finite(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(NirejectError::invalid_parameter(name, value, "must be a finite number"));
    }
    Ok(())
}

/// Positions holding `class`
fn class_positions(labels: &Array1<i64>, class: i64) -> Vec<usize> {
    labels
        .iter()
        .enumerate()
        .filter(|(_, &l)| l == class)
        .map(|(i, _)| i)
        .collect()
}
