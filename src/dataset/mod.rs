//! Observation table consumed by the splitter and the detector
//!
//! A [`Dataset`] is keyed by an integer row index and carries:
//! - a matrix of named numeric quality features
//! - a binary label per row (0 = normal, 1 = anomalous)
//! - a signal id shared by an original observation and its augmentations
//! - an augmentation tag (`"None"` for original rows)
//! - optional string columns usable as external grouping keys

mod frame;

pub use frame::{AUGMENTATION_COLUMN, INDEX_COLUMN, LABELS_COLUMN, SIGNAL_ID_COLUMN};

use crate::error::{NirejectError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Augmentation tag of original (non-synthetic) rows
pub const NO_AUGMENTATION: &str = "None";

/// Tabular dataset of observations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    index: Vec<usize>,
    feature_names: Vec<String>,
    features: Array2<f64>,
    labels: Array1<i64>,
    signal_ids: Vec<String>,
    augmentation: Vec<String>,
    group_columns: BTreeMap<String, Vec<String>>,
}

impl Dataset {
    /// Create a dataset of original rows indexed `0..n`
    pub fn new(
        feature_names: Vec<String>,
        features: Array2<f64>,
        labels: Array1<i64>,
        signal_ids: Vec<String>,
    ) -> Result<Self> {
        let n_rows = features.nrows();

        if feature_names.len() != features.ncols() {
            return Err(NirejectError::ShapeError {
                expected: format!("{} feature names", features.ncols()),
                actual: format!("{} feature names", feature_names.len()),
            });
        }
        check_len("labels", labels.len(), n_rows)?;
        check_len(SIGNAL_ID_COLUMN, signal_ids.len(), n_rows)?;
        check_binary_labels(labels.iter(), false)?;

        for ((row, col), value) in features.indexed_iter() {
            if !value.is_finite() {
                return Err(NirejectError::Validation(format!(
                    "Feature '{}' has a non-finite value ({}) at row {}",
                    feature_names[col], value, row
                )));
            }
        }

        Ok(Self {
            index: (0..n_rows).collect(),
            feature_names,
            features,
            labels,
            signal_ids,
            augmentation: vec![NO_AUGMENTATION.to_string(); n_rows],
            group_columns: BTreeMap::new(),
        })
    }

    /// Replace the row keys. Keys must be unique.
    pub fn with_index(mut self, index: Vec<usize>) -> Result<Self> {
        check_len(INDEX_COLUMN, index.len(), self.n_rows())?;
        let mut seen = HashSet::with_capacity(index.len());
        if let Some(dup) = index.iter().find(|&&key| !seen.insert(key)) {
            return Err(NirejectError::Validation(format!(
                "Row index {} appears more than once",
                dup
            )));
        }
        self.index = index;
        Ok(self)
    }

    /// Set augmentation tags (`"None"` marks original rows)
    pub fn with_augmentation(mut self, tags: Vec<String>) -> Result<Self> {
        check_len(AUGMENTATION_COLUMN, tags.len(), self.n_rows())?;
        self.augmentation = tags;
        Ok(self)
    }

    /// Attach a string column usable as an external grouping key
    pub fn with_group_column(mut self, name: impl Into<String>, values: Vec<String>) -> Result<Self> {
        let name = name.into();
        check_len(&name, values.len(), self.n_rows())?;
        self.group_columns.insert(name, values);
        Ok(self)
    }

    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    pub fn index(&self) -> &[usize] {
        &self.index
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn labels(&self) -> &Array1<i64> {
        &self.labels
    }

    pub fn signal_ids(&self) -> &[String] {
        &self.signal_ids
    }

    pub fn augmentation(&self) -> &[String] {
        &self.augmentation
    }

    pub fn group_column(&self, name: &str) -> Option<&[String]> {
        self.group_columns.get(name).map(Vec::as_slice)
    }

    /// Distinct augmentation tags, sorted
    pub fn augmentation_tags(&self) -> Vec<String> {
        self.augmentation
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Column positions of the requested features
    pub fn feature_positions(&self, names: &[String]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|name| {
                self.feature_names
                    .iter()
                    .position(|f| f == name)
                    .ok_or_else(|| {
                        NirejectError::Validation(format!(
                            "Feature '{}' is not a column of the dataset (available: {:?})",
                            name, self.feature_names
                        ))
                    })
            })
            .collect()
    }

    /// Row positions carrying the given augmentation tag, in row order
    pub fn rows_tagged(&self, tag: &str) -> Vec<usize> {
        self.augmentation
            .iter()
            .enumerate()
            .filter(|(_, t)| t.as_str() == tag)
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Feature slice for the given row positions and column positions
    pub fn select(&self, rows: &[usize], columns: &[usize]) -> Array2<f64> {
        self.features.select(Axis(0), rows).select(Axis(1), columns)
    }

    pub fn labels_at(&self, rows: &[usize]) -> Array1<i64> {
        self.labels.select(Axis(0), rows)
    }

    pub fn keys_at(&self, rows: &[usize]) -> Vec<usize> {
        rows.iter().map(|&pos| self.index[pos]).collect()
    }

    /// Group key per row built from the named columns, joined with `|`.
    /// The signal id column can be referenced by its name.
    pub fn group_keys(&self, columns: &[String]) -> Result<Vec<String>> {
        let sources: Vec<&[String]> = columns
            .iter()
            .map(|name| {
                if name == SIGNAL_ID_COLUMN {
                    Ok(self.signal_ids.as_slice())
                } else {
                    self.group_column(name).ok_or_else(|| {
                        NirejectError::Validation(format!(
                            "Grouping column '{}' is not a column of the dataset",
                            name
                        ))
                    })
                }
            })
            .collect::<Result<_>>()?;

        Ok((0..self.n_rows())
            .map(|row| {
                sources
                    .iter()
                    .map(|col| col[row].as_str())
                    .collect::<Vec<_>>()
                    .join("|")
            })
            .collect())
    }
}

/// Check that labels only take the values 0 and 1.
///
/// With `require_both` the two classes must also both be present, which is
/// what label perturbation needs to sample from each class.
pub fn check_binary_labels<'a>(
    labels: impl IntoIterator<Item = &'a i64>,
    require_both: bool,
) -> Result<()> {
    let values: BTreeSet<i64> = labels.into_iter().copied().collect();
    let is_binary = if require_both {
        values.len() == 2 && values.contains(&0) && values.contains(&1)
    } else {
        values.iter().all(|&v| v == 0 || v == 1)
    };

    if is_binary {
        Ok(())
    } else {
        Err(NirejectError::Validation(format!(
            "Labels are not binary: found values {:?}",
            values.into_iter().collect::<Vec<_>>()
        )))
    }
}

fn check_len(column: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(NirejectError::ShapeError {
            expected: format!("{} = {} rows", column, expected),
            actual: format!("{} = {} rows", column, actual),
        });
    }
    Ok(())
}
