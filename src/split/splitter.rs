//! Stratified, augmentation-aware train/test splitter

use super::{AugmentedSplit, Partition, SamplingConfig, SeededSplit, Split, SplitMode, StandardScaler};
use crate::dataset::{Dataset, NO_AUGMENTATION, SIGNAL_ID_COLUMN};
use crate::error::{NirejectError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Splits the primary rows of a dataset into train and test
#[derive(Debug, Clone)]
pub struct DataSplitter {
    mode: SplitMode,
    test_fraction: f64,
    random_state: Option<u64>,
    groups: Option<Vec<String>>,
    augmentation: Vec<String>,
    standardize: bool,
}

impl DataSplitter {
    pub fn new(mode: SplitMode, test_fraction: f64) -> Self {
        Self {
            mode,
            test_fraction,
            random_state: None,
            groups: None,
            augmentation: Vec::new(),
            standardize: false,
        }
    }

    /// Set random state for reproducibility
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Grouping columns for mode 2. Defaults to the signal id.
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = Some(groups);
        self
    }

    /// Augmentation tags returned aligned with each side
    pub fn with_augmentation(mut self, tags: Vec<String>) -> Self {
        self.augmentation = tags;
        self
    }

    pub fn with_standardize(mut self, standardize: bool) -> Self {
        self.standardize = standardize;
        self
    }

    /// Splitter described by a sampling configuration (seed not set)
    pub fn from_config(config: &SamplingConfig) -> Result<Self> {
        config.validate()?;
        let mut splitter = Self::new(SplitMode::from_code(config.mode)?, config.test_size)
            .with_standardize(config.standardize)
            .with_augmentation(config.augmentation.clone().unwrap_or_default());
        if let Some(groups) = &config.groups {
            splitter = splitter.with_groups(groups.clone());
        }
        Ok(splitter)
    }

    /// One split per resolved seed of the configuration
    pub fn repeat(dataset: &Dataset, config: &SamplingConfig) -> Result<Vec<SeededSplit>> {
        let splitter = Self::from_config(config)?;
        config
            .resolved_seeds()
            .into_iter()
            .map(|seed| {
                let split = splitter.clone().with_seed(seed).split(dataset, &config.features)?;
                Ok(SeededSplit { seed, split })
            })
            .collect()
    }

    /// Split the dataset on the named features
    pub fn split(&self, dataset: &Dataset, features: &[String]) -> Result<Split> {
        if !(0.0..=1.0).contains(&self.test_fraction) {
            return Err(NirejectError::invalid_parameter(
                "test_fraction",
                self.test_fraction,
                "must lie in [0, 1]",
            ));
        }

        let columns = dataset.feature_positions(features)?;
        let primary = dataset.rows_tagged(NO_AUGMENTATION);
        if primary.is_empty() {
            return Err(NirejectError::Validation(format!(
                "Dataset has no rows tagged '{}' to split",
                NO_AUGMENTATION
            )));
        }
        // each primary signal id must map to exactly one row
        AlignedTag::new(dataset, NO_AUGMENTATION)?;

        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let overlap = self.mode == SplitMode::Overlap || self.test_fraction >= 1.0;
        let (mut train_rows, mut test_rows) = if overlap {
            (primary.clone(), primary.clone())
        } else {
            match self.mode {
                SplitMode::Grouped => self.grouped_split(dataset, &primary, &mut rng)?,
                _ => self.stratified_split(dataset, &primary, &mut rng),
            }
        };
        train_rows.sort_unstable();
        test_rows.sort_unstable();

        if overlap {
            debug_assert_eq!(train_rows.len(), test_rows.len());
        } else if train_rows.is_empty() || test_rows.is_empty() {
            return Err(NirejectError::Validation(format!(
                "test_fraction={} over {} rows yields an empty partition (train={}, test={})",
                self.test_fraction,
                primary.len(),
                train_rows.len(),
                test_rows.len()
            )));
        }

        let mut train = partition(dataset, &train_rows, &columns);
        let mut test = partition(dataset, &test_rows, &columns);

        let available = dataset.augmentation_tags();
        let mut augmented = self
            .augmentation
            .iter()
            .map(|tag| {
                if !available.contains(tag) {
                    return Err(NirejectError::Validation(format!(
                        "No '{}' augmentation in the dataset, available tags are {:?}",
                        tag, available
                    )));
                }
                let aligned = AlignedTag::new(dataset, tag)?;
                Ok(AugmentedSplit {
                    tag: tag.clone(),
                    train: partition(dataset, &aligned.counterparts(dataset, &train_rows)?, &columns),
                    test: partition(dataset, &aligned.counterparts(dataset, &test_rows)?, &columns),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if self.standardize {
            let mut scaler = StandardScaler::new();
            scaler.fit(&train.features)?;
            train.features = scaler.transform(&train.features)?;
            test.features = scaler.transform(&test.features)?;
            for aug in &mut augmented {
                aug.train.features = scaler.transform(&aug.train.features)?;
                aug.test.features = scaler.transform(&aug.test.features)?;
            }
        }

        info!(
            mode = self.mode.code(),
            train = train.len(),
            test = test.len(),
            augmented = augmented.len(),
            "Split dataset"
        );

        Ok(Split {
            train,
            test,
            augmented,
            feature_names: features.to_vec(),
            mode: self.mode,
            seed: self.random_state,
        })
    }

    /// Per label class, shuffle and send `round(test_fraction * n_class)` rows to test
    fn stratified_split(
        &self,
        dataset: &Dataset,
        primary: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> (Vec<usize>, Vec<usize>) {
        let labels = dataset.labels();
        let mut class_rows: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for &row in primary {
            class_rows.entry(labels[row]).or_default().push(row);
        }

        let mut train = Vec::with_capacity(primary.len());
        let mut test = Vec::with_capacity(primary.len());
        for (class, mut rows) in class_rows {
            rows.shuffle(rng);
            let n_test = ((self.test_fraction * rows.len() as f64).round() as usize).min(rows.len());
            debug!(class, rows = rows.len(), n_test, "Stratified class allocation");
            test.extend_from_slice(&rows[..n_test]);
            train.extend_from_slice(&rows[n_test..]);
        }
        (train, test)
    }

    /// Assign whole groups to test, stratified by each group's majority label
    fn grouped_split(
        &self,
        dataset: &Dataset,
        primary: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Result<(Vec<usize>, Vec<usize>)> {
        let columns = self
            .groups
            .clone()
            .unwrap_or_else(|| vec![SIGNAL_ID_COLUMN.to_string()]);
        let keys = dataset.group_keys(&columns)?;
        let labels = dataset.labels();

        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for &row in primary {
            groups.entry(keys[row].as_str()).or_default().push(row);
        }

        let mut class_groups: BTreeMap<i64, Vec<Vec<usize>>> = BTreeMap::new();
        for rows in groups.into_values() {
            let anomalous = rows.iter().filter(|&&r| labels[r] == 1).count();
            let majority = if anomalous * 2 > rows.len() { 1 } else { 0 };
            class_groups.entry(majority).or_default().push(rows);
        }

        let mut train = Vec::with_capacity(primary.len());
        let mut test = Vec::with_capacity(primary.len());
        for (class, mut members) in class_groups {
            members.shuffle(rng);
            let n_rows: usize = members.iter().map(Vec::len).sum();
            let target = (self.test_fraction * n_rows as f64).round() as usize;
            let mut n_test = 0;
            for rows in members {
                if n_test < target {
                    n_test += rows.len();
                    test.extend(rows);
                } else {
                    train.extend(rows);
                }
            }
            debug!(class, rows = n_rows, target, n_test, "Grouped class allocation");
        }
        Ok((train, test))
    }
}

fn partition(dataset: &Dataset, rows: &[usize], columns: &[usize]) -> Partition {
    Partition {
        features: dataset.select(rows, columns),
        labels: dataset.labels_at(rows),
        idx: dataset.keys_at(rows),
        signal_ids: rows.iter().map(|&r| dataset.signal_ids()[r].clone()).collect(),
    }
}

/// Lookup from signal id to the row carrying a given augmentation tag
struct AlignedTag<'a> {
    tag: &'a str,
    by_signal: HashMap<&'a str, usize>,
}

impl<'a> AlignedTag<'a> {
    fn new(dataset: &'a Dataset, tag: &'a str) -> Result<Self> {
        let mut by_signal = HashMap::new();
        for row in dataset.rows_tagged(tag) {
            let signal = dataset.signal_ids()[row].as_str();
            if by_signal.insert(signal, row).is_some() {
                return Err(NirejectError::Validation(format!(
                    "Signal id '{}' appears more than once with augmentation '{}'",
                    signal, tag
                )));
            }
        }
        Ok(Self { tag, by_signal })
    }

    fn counterparts(&self, dataset: &Dataset, primary_rows: &[usize]) -> Result<Vec<usize>> {
        primary_rows
            .iter()
            .map(|&row| {
                let signal = dataset.signal_ids()[row].as_str();
                self.by_signal.get(signal).copied().ok_or_else(|| {
                    NirejectError::Validation(format!(
                        "No '{}' augmentation for signal id '{}'",
                        self.tag, signal
                    ))
                })
            })
            .collect()
    }
}
