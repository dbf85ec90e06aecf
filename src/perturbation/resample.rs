//! Row-level perturbations: partial labeling and contamination control

use super::shuffle::draw;
use super::storage::RowStorage;
use super::{check_finite, class_positions, Contaminated, Operation, PerturbationEngine, Rated};
use crate::dataset::check_binary_labels;
use crate::error::{NirejectError, Result};
use ndarray::Array1;
use tracing::debug;

impl PerturbationEngine {
    /// Drop `n_anomalous - floor(gamma * n_anomalous)` anomalous rows from
    /// data, labels and row keys in lockstep.
    ///
    /// `unlabel_idx` replays a previous removal. Without it, a `gamma` at
    /// either bound of [0, 1] leaves everything unchanged.
    pub fn set_perc_rated<D, I>(
        &self,
        data: &D,
        labels: &Array1<i64>,
        idx: &I,
        gamma: f64,
        unlabel_idx: Option<&[usize]>,
    ) -> Result<Rated<D, I>>
    where
        D: RowStorage,
        I: RowStorage,
    {
        check_finite("gamma", gamma)?;
        if (gamma <= 0.0 || gamma >= 1.0) && unlabel_idx.is_none() {
            return Ok(Rated {
                data: data.clone(),
                labels: labels.clone(),
                idx: idx.clone(),
                unlabel_idx: None,
            });
        }
        check_aligned(data, labels, idx)?;
        check_binary_labels(labels.iter(), true)?;

        let removed = match unlabel_idx {
            Some(given) => given.to_vec(),
            None => {
                let anomalous = class_positions(labels, 1);
                let n_labeled = (gamma * anomalous.len() as f64) as usize;
                draw(&mut self.rng(Operation::PartialLabeling), &anomalous, anomalous.len() - n_labeled, false)
            }
        };

        let rated = Rated {
            data: data.remove_rows(&removed)?,
            labels: labels.remove_rows(&removed)?,
            idx: idx.remove_rows(&removed)?,
            unlabel_idx: Some(removed),
        };

        let expected = labels.len() - rated.unlabel_idx.as_ref().map_or(0, Vec::len);
        let sizes = [rated.data.n_rows(), rated.labels.len(), rated.idx.n_rows()];
        if sizes.iter().any(|&n| n != expected) {
            return Err(NirejectError::Validation(format!(
                "Partial labeling left data/labels/idx with {:?} rows, expected {}",
                sizes, expected
            )));
        }

        debug!(gamma, n_rows = labels.len(), n_removed = labels.len() - expected, "partial labeling");
        Ok(rated)
    }

    /// Move the anomalous share towards `contamination` by removing
    /// anomalous rows (without replacement) or duplicating them (with
    /// replacement). The target count is `floor(contamination * n)`.
    ///
    /// Supplied `remove_idx`/`add_idx` replay a previous call; removal runs
    /// first and `add_idx` addresses the rows left after it. Without them a
    /// `contamination` at either bound of [0, 1] is a no-op.
    pub fn set_contamination_rate<D, I>(
        &self,
        data: &D,
        labels: &Array1<i64>,
        idx: &I,
        contamination: f64,
        remove_idx: Option<&[usize]>,
        add_idx: Option<&[usize]>,
    ) -> Result<Contaminated<D, I>>
    where
        D: RowStorage,
        I: RowStorage,
    {
        check_finite("contamination", contamination)?;
        let replay = remove_idx.is_some() || add_idx.is_some();
        if (contamination <= 0.0 || contamination >= 1.0) && !replay {
            return Ok(Contaminated {
                data: data.clone(),
                labels: labels.clone(),
                idx: idx.clone(),
                remove_idx: None,
                add_idx: None,
            });
        }
        check_aligned(data, labels, idx)?;
        check_binary_labels(labels.iter(), true)?;

        let (remove_idx, add_idx) = if replay {
            (remove_idx.map(<[usize]>::to_vec), add_idx.map(<[usize]>::to_vec))
        } else {
            self.draw_contamination(labels, contamination)
        };

        let mut data = data.clone();
        let mut labels = labels.clone();
        let mut idx = idx.clone();
        if let Some(removed) = &remove_idx {
            data = data.remove_rows(removed)?;
            labels = labels.remove_rows(removed)?;
            idx = idx.remove_rows(removed)?;
        }
        if let Some(added) = &add_idx {
            data = data.append_rows(added)?;
            labels = labels.append_rows(added)?;
            idx = idx.append_rows(added)?;
        }

        debug!(
            contamination,
            n_removed = remove_idx.as_ref().map_or(0, Vec::len),
            n_added = add_idx.as_ref().map_or(0, Vec::len),
            n_rows = labels.len(),
            "contamination control"
        );
        Ok(Contaminated {
            data,
            labels,
            idx,
            remove_idx,
            add_idx,
        })
    }

    fn draw_contamination(
        &self,
        labels: &Array1<i64>,
        contamination: f64,
    ) -> (Option<Vec<usize>>, Option<Vec<usize>>) {
        let anomalous = class_positions(labels, 1);
        let current = anomalous.len() as f64 / labels.len() as f64;
        let target = (contamination * labels.len() as f64) as usize;
        let mut rng = self.rng(Operation::Contamination);

        if current > contamination {
            let n_remove = anomalous.len().saturating_sub(target);
            (non_empty(draw(&mut rng, &anomalous, n_remove, false)), None)
        } else if current < contamination {
            let n_add = target.saturating_sub(anomalous.len());
            (None, non_empty(draw(&mut rng, &anomalous, n_add, true)))
        } else {
            (None, None)
        }
    }
}

fn non_empty(positions: Vec<usize>) -> Option<Vec<usize>> {
    if positions.is_empty() {
        None
    } else {
        Some(positions)
    }
}

fn check_aligned<D: RowStorage, I: RowStorage>(data: &D, labels: &Array1<i64>, idx: &I) -> Result<()> {
    if data.n_rows() != labels.len() || idx.n_rows() != labels.len() {
        return Err(NirejectError::ShapeError {
            expected: format!("{} rows in data, labels and idx", labels.len()),
            actual: format!("data = {}, idx = {}", data.n_rows(), idx.n_rows()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perturbation::KeyedTable;
    use ndarray::{Array2, Axis};

    fn fixture(n: usize) -> (Array2<f64>, Array1<i64>, Vec<usize>) {
        let data = Array2::from_shape_fn((n, 2), |(i, j)| (i * 10 + j) as f64);
        let labels = Array1::from_iter((0..n).map(|i| i64::from(i % 4 == 0)));
        let idx = (100..100 + n).collect();
        (data, labels, idx)
    }

    fn anomalous(labels: &Array1<i64>) -> usize {
        labels.iter().filter(|&&l| l == 1).count()
    }

    #[test]
    fn test_perc_rated_shrinks_in_lockstep() {
        let (data, labels, idx) = fixture(40);
        let rated = PerturbationEngine::new()
            .with_seed(42)
            .set_perc_rated(&data, &labels, &idx, 0.6, None)
            .unwrap();

        let removed = rated.unlabel_idx.clone().unwrap();
        assert_eq!(removed.len(), 4);
        assert_eq!(rated.data.nrows(), 36);
        assert_eq!(rated.labels.len(), 36);
        assert_eq!(rated.idx.len(), 36);
        assert_eq!(anomalous(&rated.labels), 6);
        assert!(removed.iter().all(|&p| labels[p] == 1));
    }

    #[test]
    fn test_perc_rated_bounds_are_noop() {
        let (data, labels, idx) = fixture(12);
        let engine = PerturbationEngine::new();
        for gamma in [0.0, 1.0] {
            let rated = engine.set_perc_rated(&data, &labels, &idx, gamma, None).unwrap();
            assert_eq!(rated.data, data);
            assert!(rated.unlabel_idx.is_none());
        }
    }

    #[test]
    fn test_perc_rated_replay_on_keyed_table() {
        let (data, labels, idx) = fixture(20);
        let engine = PerturbationEngine::new().with_seed(3);
        let first = engine.set_perc_rated(&data, &labels, &idx, 0.4, None).unwrap();
        let removed = first.unlabel_idx.clone().unwrap();

        let table = KeyedTable::new(idx.clone(), data.clone()).unwrap();
        let replayed = PerturbationEngine::new()
            .set_perc_rated(&table, &labels, &idx, 0.4, Some(&removed))
            .unwrap();

        assert_eq!(replayed.data.values(), &first.data);
        assert_eq!(replayed.data.keys(), first.idx.as_slice());
        assert_eq!(replayed.labels, first.labels);
    }

    #[test]
    fn test_contamination_removes_excess() {
        let (data, labels, idx) = fixture(40);
        let out = PerturbationEngine::new()
            .with_seed(9)
            .set_contamination_rate(&data, &labels, &idx, 0.1, None, None)
            .unwrap();

        // 10 anomalous rows, target floor(0.1 * 40) = 4
        assert_eq!(out.remove_idx.as_ref().unwrap().len(), 6);
        assert!(out.add_idx.is_none());
        assert_eq!(anomalous(&out.labels), 4);
        assert_eq!(out.data.nrows(), 34);
    }

    #[test]
    fn test_contamination_duplicates_existing_rows() {
        let (data, labels, idx) = fixture(40);
        let out = PerturbationEngine::new()
            .with_seed(9)
            .set_contamination_rate(&data, &labels, &idx, 0.5, None, None)
            .unwrap();

        let added = out.add_idx.clone().unwrap();
        assert_eq!(added.len(), 10);
        assert_eq!(anomalous(&out.labels), 20);
        assert_eq!(out.idx.len(), 50);
        for (offset, &source) in added.iter().enumerate() {
            assert_eq!(out.data.index_axis(Axis(0), 40 + offset), data.index_axis(Axis(0), source));
            assert_eq!(out.idx[40 + offset], idx[source]);
        }
    }

    #[test]
    fn test_contamination_replay_matches() {
        let (data, labels, idx) = fixture(40);
        let first = PerturbationEngine::new()
            .with_seed(1)
            .set_contamination_rate(&data, &labels, &idx, 0.05, None, None)
            .unwrap();
        let replayed = PerturbationEngine::new()
            .set_contamination_rate(&data, &labels, &idx, 0.05, first.remove_idx.as_deref(), None)
            .unwrap();
        assert_eq!(replayed, first);
    }

    #[test]
    fn test_contamination_at_current_rate_changes_nothing() {
        let (data, labels, idx) = fixture(40);
        let out = PerturbationEngine::new()
            .set_contamination_rate(&data, &labels, &idx, 0.25, None, None)
            .unwrap();
        assert!(out.remove_idx.is_none() && out.add_idx.is_none());
        assert_eq!(out.labels, labels);
    }

    #[test]
    fn test_misaligned_inputs_rejected() {
        let (data, labels, _) = fixture(8);
        let short_idx: Vec<usize> = (0..5).collect();
        assert!(PerturbationEngine::new()
            .set_perc_rated(&data, &labels, &short_idx, 0.5, None)
            .is_err());
    }

    #[test]
    fn test_non_finite_rates_rejected() {
        let (data, labels, idx) = fixture(20);
        let engine = PerturbationEngine::new().with_seed(0);

        let err = engine
            .set_perc_rated(&data, &labels, &idx, f64::NAN, None)
            .unwrap_err();
        assert!(matches!(err, NirejectError::InvalidParameter { .. }));
        assert!(err.to_string().contains("gamma = NaN"));

        let err = engine
            .set_contamination_rate(&data, &labels, &idx, f64::NAN, None, None)
            .unwrap_err();
        assert!(err.to_string().contains("contamination = NaN"));
        assert!(engine
            .set_contamination_rate(&data, &labels, &idx, f64::INFINITY, None, None)
            .is_err());
    }
}
