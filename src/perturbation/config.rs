//! Config-driven perturbation of a train partition, with a replay record

use super::{PairMap, PerturbationEngine, RowStorage};
use crate::error::{NirejectError, Result};
use crate::split::{Partition, SamplingConfig};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Which label noise operation to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseStrategy {
    Binary,
    Preserving,
    Paired,
}

impl Default for NoiseStrategy {
    fn default() -> Self {
        NoiseStrategy::Preserving
    }
}

/// Perturbation parameters of one experiment run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerturbationConfig {
    /// Fraction of labels affected by label noise
    pub label_noise_ratio: f64,
    pub noise_strategy: NoiseStrategy,
    /// Fraction of anomalous rows kept labelled
    pub gamma: f64,
    /// Target anomalous share; 0 leaves it as sampled
    pub contamination: f64,
    pub seed: Option<u64>,
}

impl Default for PerturbationConfig {
    fn default() -> Self {
        Self {
            label_noise_ratio: 0.0,
            noise_strategy: NoiseStrategy::default(),
            gamma: 1.0,
            contamination: 0.0,
            seed: None,
        }
    }
}

impl PerturbationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Perturbation settings of a sampling profile, seeded per repeat
    pub fn from_sampling(sampling: &SamplingConfig, seed: u64) -> Self {
        Self {
            label_noise_ratio: sampling.label_noise_ratio,
            noise_strategy: NoiseStrategy::default(),
            gamma: sampling.gamma,
            contamination: sampling.c_rate,
            seed: Some(seed),
        }
    }

    pub fn with_label_noise(mut self, ratio: f64, strategy: NoiseStrategy) -> Self {
        self.label_noise_ratio = ratio;
        self.noise_strategy = strategy;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
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

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("label_noise_ratio", self.label_noise_ratio),
            ("gamma", self.gamma),
            ("contamination", self.contamination),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(NirejectError::invalid_parameter(name, value, "must lie in [0, 1]"));
            }
        }
        Ok(())
    }

    fn engine(&self) -> PerturbationEngine {
        match self.seed {
            Some(seed) => PerturbationEngine::new().with_seed(seed),
            None => PerturbationEngine::new(),
        }
    }

    /// Apply label noise, then partial labeling, then contamination
    /// control to a train partition.
    pub fn apply(&self, train: &Partition) -> Result<PerturbedTrain> {
        self.validate()?;
        let engine = self.engine();
        let mut record = PerturbationRecord {
            label_noise_ratio: self.label_noise_ratio,
            noise_strategy: self.noise_strategy,
            ..PerturbationRecord::default()
        };

        let labels = match self.noise_strategy {
            NoiseStrategy::Binary | NoiseStrategy::Preserving => {
                let shuffle = if self.noise_strategy == NoiseStrategy::Binary {
                    engine.binary_label_shuffling(&train.labels, None, self.label_noise_ratio)?
                } else {
                    engine.preserving_label_shuffling(&train.labels, None, self.label_noise_ratio)?
                };
                record.shuffled_idx = shuffle.shuffled_idx;
                shuffle.labels
            }
            NoiseStrategy::Paired => {
                let shuffle =
                    engine.paired_class_shuffling(&train.labels, None, self.label_noise_ratio)?;
                record.pairs = shuffle.pairs;
                shuffle.labels
            }
        };
        let relabelled = Partition {
            labels,
            ..train.clone()
        };

        let rated = engine.set_perc_rated(
            &relabelled.features,
            &relabelled.labels,
            &relabelled.idx,
            self.gamma,
            None,
        )?;
        let signal_ids = match &rated.unlabel_idx {
            Some(removed) => relabelled.signal_ids.remove_rows(removed)?,
            None => relabelled.signal_ids,
        };
        record.unlabel_idx = rated.unlabel_idx;
        let rated = Partition {
            features: rated.data,
            labels: rated.labels,
            idx: rated.idx,
            signal_ids,
        };

        let contaminated = engine.set_contamination_rate(
            &rated.features,
            &rated.labels,
            &rated.idx,
            self.contamination,
            None,
            None,
        )?;
        let signal_ids = resample_ids(
            rated.signal_ids,
            contaminated.remove_idx.as_deref(),
            contaminated.add_idx.as_deref(),
        )?;
        record.remove_idx = contaminated.remove_idx;
        record.add_idx = contaminated.add_idx;

        let partition = Partition {
            features: contaminated.data,
            labels: contaminated.labels,
            idx: contaminated.idx,
            signal_ids,
        };
        info!(
            n_before = train.len(),
            n_after = partition.len(),
            contamination = partition.contamination(),
            "perturbed train partition"
        );
        Ok(PerturbedTrain { partition, record })
    }
}

/// A perturbed train partition and the decisions that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerturbedTrain {
    pub partition: Partition,
    pub record: PerturbationRecord,
}

/// Every decision of one [`PerturbationConfig::apply`] call.
///
/// Replaying the record on an index-aligned partition reproduces the
/// perturbation without any randomness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerturbationRecord {
    pub label_noise_ratio: f64,
    pub noise_strategy: NoiseStrategy,
    pub shuffled_idx: Option<Vec<usize>>,
    pub pairs: Option<PairMap>,
    pub unlabel_idx: Option<Vec<usize>>,
    pub remove_idx: Option<Vec<usize>>,
    pub add_idx: Option<Vec<usize>>,
}

impl PerturbationRecord {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Re-apply the recorded decisions to `train`
    pub fn replay(&self, train: &Partition) -> Result<Partition> {
        let engine = PerturbationEngine::new();

        let labels = match self.noise_strategy {
            NoiseStrategy::Binary => {
                engine
                    .binary_label_shuffling(&train.labels, self.shuffled_idx.as_deref(), 0.0)?
                    .labels
            }
            NoiseStrategy::Preserving => {
                engine
                    .preserving_label_shuffling(&train.labels, self.shuffled_idx.as_deref(), 0.0)?
                    .labels
            }
            NoiseStrategy::Paired => {
                engine
                    .paired_class_shuffling(&train.labels, self.pairs.as_ref(), self.label_noise_ratio)?
                    .labels
            }
        };

        // gamma and contamination at their no-op bounds: only the recorded
        // positions are applied
        let rated = engine.set_perc_rated(
            &train.features,
            &labels,
            &train.idx,
            1.0,
            self.unlabel_idx.as_deref(),
        )?;
        let signal_ids = match &self.unlabel_idx {
            Some(removed) => train.signal_ids.remove_rows(removed)?,
            None => train.signal_ids.clone(),
        };

        let contaminated = engine.set_contamination_rate(
            &rated.data,
            &rated.labels,
            &rated.idx,
            0.0,
            self.remove_idx.as_deref(),
            self.add_idx.as_deref(),
        )?;
        let signal_ids =
            resample_ids(signal_ids, self.remove_idx.as_deref(), self.add_idx.as_deref())?;

        Ok(Partition {
            features: contaminated.data,
            labels: contaminated.labels,
            idx: contaminated.idx,
            signal_ids,
        })
    }
}

fn resample_ids(
    ids: Vec<String>,
    remove_idx: Option<&[usize]>,
    add_idx: Option<&[usize]>,
) -> Result<Vec<String>> {
    let ids = match remove_idx {
        Some(removed) => ids.remove_rows(removed)?,
        None => ids,
    };
    match add_idx {
        Some(added) => ids.append_rows(added),
        None => Ok(ids),
    }
}
