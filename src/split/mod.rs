//! Train/test splitting of observation tables
//!
//! Provides the splitting strategies used to build experiment partitions:
//! - Full overlap (train == test) for self-evaluation baselines
//! - Stratified random split that keeps augmentations with their original
//! - Grouped split that keeps external groups (e.g. recording sessions) intact
//!
//! Augmented variants requested by tag are returned aligned one-to-one with
//! the primary rows of each side.

mod config;
mod scaler;
mod splitter;

pub use config::SamplingConfig;
pub use scaler::StandardScaler;
pub use splitter::DataSplitter;

use crate::error::{NirejectError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Splitting strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitMode {
    /// Mode 0: train and test are the same rows
    Overlap,
    /// Mode 1: random split stratified by label
    Stratified,
    /// Mode 2: split that never lets a group straddle train and test
    Grouped,
}

impl SplitMode {
    /// Map the numeric mode used in configuration records
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(SplitMode::Overlap),
            1 => Ok(SplitMode::Stratified),
            2 => Ok(SplitMode::Grouped),
            other => Err(NirejectError::invalid_parameter(
                "mode",
                other,
                "split mode must be one of 0, 1, 2",
            )),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            SplitMode::Overlap => 0,
            SplitMode::Stratified => 1,
            SplitMode::Grouped => 2,
        }
    }
}

/// One side of a split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partition {
    /// Feature slice, one row per observation
    pub features: Array2<f64>,
    pub labels: Array1<i64>,
    /// Row keys of the source dataset
    pub idx: Vec<usize>,
    pub signal_ids: Vec<String>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.idx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }

    /// Fraction of anomalous rows
    pub fn contamination(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.labels.iter().filter(|&&l| l == 1).count() as f64 / self.labels.len() as f64
    }
}

/// Augmented rows of one tag, aligned with the primary train/test rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugmentedSplit {
    pub tag: String,
    pub train: Partition,
    pub test: Partition,
}

/// Result of a split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Split {
    pub train: Partition,
    pub test: Partition,
    pub augmented: Vec<AugmentedSplit>,
    pub feature_names: Vec<String>,
    pub mode: SplitMode,
    pub seed: Option<u64>,
}

impl Split {
    /// Whether train and test share rows (mode 0 or a degenerate fraction)
    pub fn is_overlapping(&self) -> bool {
        self.train.idx == self.test.idx
    }

    pub fn augmented(&self, tag: &str) -> Option<&AugmentedSplit> {
        self.augmented.iter().find(|a| a.tag == tag)
    }
}

/// A split together with the seed that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeededSplit {
    pub seed: u64,
    pub split: Split,
}
