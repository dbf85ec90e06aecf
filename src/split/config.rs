//! Sampling configuration

use super::SplitMode;
use crate::error::{NirejectError, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Configuration of the sampling stage: how partitions are drawn and
/// which perturbations the experiment applies to them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Split mode: 0 = overlap, 1 = stratified, 2 = grouped
    pub mode: u8,

    /// Feature columns to split
    pub features: Vec<String>,

    /// Fraction of rows assigned to test, in [0, 1]
    pub test_size: f64,

    /// Standardize features with train statistics
    pub standardize: bool,

    /// Explicit seeds; expanded to `repeats` seeds when fewer are given
    pub seeds: Vec<u64>,

    /// Number of repeated splits
    pub repeats: usize,

    /// Augmentation tags to return aligned with the primary rows
    pub augmentation: Option<Vec<String>>,

    /// Grouping columns for mode 2
    pub groups: Option<Vec<String>>,

    /// Fraction of train labels flipped
    pub label_noise_ratio: f64,

    /// Fraction of anomalous train rows kept labelled
    pub gamma: f64,

    /// Target contamination rate of the train side (0 leaves it untouched)
    pub c_rate: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            mode: 1,
            features: [
                "snr_wave1",
                "sinad_wave1",
                "spike_rate_hbo",
                "cov_wave_1",
                "diff_cov",
                "hr_freq_od_wave1",
                "hr_power_od_wave1",
                "flatline",
                "sci",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            test_size: 0.4,
            standardize: true,
            seeds: vec![42],
            repeats: 10,
            augmentation: None,
            groups: None,
            label_noise_ratio: 0.0,
            gamma: 1.0,
            c_rate: 0.0,
        }
    }
}

impl SamplingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON object; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_mode(mut self, mode: u8) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.features = features;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_seeds(mut self, seeds: Vec<u64>) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn with_repeats(mut self, repeats: usize) -> Self {
        self.repeats = repeats;
        self
    }

    pub fn with_standardize(mut self, standardize: bool) -> Self {
        self.standardize = standardize;
        self
    }

    pub fn with_augmentation(mut self, tags: Vec<String>) -> Self {
        self.augmentation = Some(tags);
        self
    }

    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = Some(groups);
        self
    }

    /// Check bounds of every field
    pub fn validate(&self) -> Result<()> {
        SplitMode::from_code(self.mode)?;
        check_unit("test_size", self.test_size)?;
        check_unit("label_noise_ratio", self.label_noise_ratio)?;
        check_unit("gamma", self.gamma)?;
        check_unit("c_rate", self.c_rate)?;

        if self.repeats < 1 {
            return Err(NirejectError::invalid_parameter(
                "repeats",
                self.repeats,
                "at least one repeat is required",
            ));
        }
        if self.seeds.is_empty() {
            return Err(NirejectError::invalid_parameter(
                "seeds",
                "[]",
                "at least one seed is required",
            ));
        }
        if self.features.is_empty() {
            return Err(NirejectError::invalid_parameter(
                "features",
                "[]",
                "at least one feature is required",
            ));
        }
        Ok(())
    }

    /// Seeds of the repeated splits.
    ///
    /// Outside mode 0, when fewer seeds than repeats are configured, the
    /// first seed drives a generator that draws `repeats` seeds in [1, 1e9).
    pub fn resolved_seeds(&self) -> Vec<u64> {
        match self.seeds.first() {
            Some(&first) if self.mode != 0 && self.seeds.len() < self.repeats => {
                let mut rng = ChaCha8Rng::seed_from_u64(first);
                (0..self.repeats)
                    .map(|_| rng.gen_range(1..1_000_000_000u64))
                    .collect()
            }
            _ => self.seeds.clone(),
        }
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(NirejectError::invalid_parameter(
            name,
            value,
            "must lie in [0, 1]",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SamplingConfig::default();
        assert_eq!(config.mode, 1);
        assert_eq!(config.repeats, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolved_seeds_expand_deterministically() {
        let config = SamplingConfig::new().with_seeds(vec![42]).with_repeats(5);
        let seeds = config.resolved_seeds();
        assert_eq!(seeds.len(), 5);
        assert_eq!(seeds, config.resolved_seeds());
        assert!(seeds.iter().all(|&s| (1..1_000_000_000).contains(&s)));
    }

    #[test]
    fn test_mode_zero_keeps_seeds() {
        let config = SamplingConfig::new().with_mode(0).with_seeds(vec![7]).with_repeats(5);
        assert_eq!(config.resolved_seeds(), vec![7]);
    }

    #[test]
    fn test_from_json_applies_defaults() {
        let config = SamplingConfig::from_json_str(r#"{"mode": 2, "test_size": 0.6}"#).unwrap();
        assert_eq!(config.mode, 2);
        assert!((config.test_size - 0.6).abs() < 1e-12);
        assert_eq!(config.seeds, vec![42]);
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let err = SamplingConfig::new().with_test_size(1.5).validate().unwrap_err();
        assert!(err.to_string().contains("test_size = 1.5"));

        let err = SamplingConfig::from_json_str(r#"{"mode": 4}"#).unwrap_err();
        assert!(err.to_string().contains("mode = 4"));
    }
}
