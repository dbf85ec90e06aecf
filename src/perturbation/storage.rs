//! Row add/remove adapters over array-like and keyed storage

use crate::error::{NirejectError, Result};
use ndarray::{Array, Array2, ArrayView1, Axis, RemoveAxis};
use serde::{Deserialize, Serialize};

/// Storage whose rows can be removed or duplicated by position.
///
/// Positions always refer to the current row order; implementations must
/// produce the same row contents regardless of how rows are addressed.
pub trait RowStorage: Clone {
    fn n_rows(&self) -> usize;

    /// Copy without the rows at `positions`
    fn remove_rows(&self, positions: &[usize]) -> Result<Self>;

    /// Copy with the rows at `positions` appended, in the given order
    fn append_rows(&self, positions: &[usize]) -> Result<Self>;
}

impl<A, D> RowStorage for Array<A, D>
where
    A: Clone,
    D: RemoveAxis,
{
    fn n_rows(&self) -> usize {
        self.len_of(Axis(0))
    }

    fn remove_rows(&self, positions: &[usize]) -> Result<Self> {
        check_removals(positions, self.n_rows())?;
        let keep = kept_positions(self.n_rows(), positions);
        Ok(self.select(Axis(0), &keep))
    }

    fn append_rows(&self, positions: &[usize]) -> Result<Self> {
        check_positions(positions, self.n_rows())?;
        let extra = self.select(Axis(0), positions);
        Ok(ndarray::concatenate(Axis(0), &[self.view(), extra.view()])?)
    }
}

impl<T: Clone> RowStorage for Vec<T> {
    fn n_rows(&self) -> usize {
        self.len()
    }

    fn remove_rows(&self, positions: &[usize]) -> Result<Self> {
        check_removals(positions, self.len())?;
        Ok(kept_positions(self.len(), positions)
            .into_iter()
            .map(|pos| self[pos].clone())
            .collect())
    }

    fn append_rows(&self, positions: &[usize]) -> Result<Self> {
        check_positions(positions, self.len())?;
        let mut out = self.clone();
        out.extend(positions.iter().map(|&pos| self[pos].clone()));
        Ok(out)
    }
}

/// Feature rows addressed by integer row keys, like an indexed table.
///
/// Keys travel with their rows: removing or duplicating a position removes
/// or duplicates its key, so duplicated rows share the key of their source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedTable {
    keys: Vec<usize>,
    values: Array2<f64>,
}

impl KeyedTable {
    pub fn new(keys: Vec<usize>, values: Array2<f64>) -> Result<Self> {
        if keys.len() != values.nrows() {
            return Err(NirejectError::ShapeError {
                expected: format!("{} keys", values.nrows()),
                actual: format!("{} keys", keys.len()),
            });
        }
        Ok(Self { keys, values })
    }

    pub fn keys(&self) -> &[usize] {
        &self.keys
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// First row stored under `key`
    pub fn row(&self, key: usize) -> Option<ArrayView1<'_, f64>> {
        self.keys
            .iter()
            .position(|&k| k == key)
            .map(|pos| self.values.row(pos))
    }
}

impl RowStorage for KeyedTable {
    fn n_rows(&self) -> usize {
        self.keys.len()
    }

    fn remove_rows(&self, positions: &[usize]) -> Result<Self> {
        Ok(Self {
            keys: self.keys.remove_rows(positions)?,
            values: self.values.remove_rows(positions)?,
        })
    }

    fn append_rows(&self, positions: &[usize]) -> Result<Self> {
        Ok(Self {
            keys: self.keys.append_rows(positions)?,
            values: self.values.append_rows(positions)?,
        })
    }
}

/// Reject positions outside `0..n_rows`
pub(crate) fn check_positions(positions: &[usize], n_rows: usize) -> Result<()> {
    if let Some(&bad) = positions.iter().find(|&&pos| pos >= n_rows) {
        return Err(NirejectError::Validation(format!(
            "Row position {} is out of range for {} rows",
            bad, n_rows
        )));
    }
    Ok(())
}

/// Removals must additionally be unique so the row count shrinks exactly
pub(crate) fn check_removals(positions: &[usize], n_rows: usize) -> Result<()> {
    check_positions(positions, n_rows)?;
    let mut seen = vec![false; n_rows];
    for &pos in positions {
        if std::mem::replace(&mut seen[pos], true) {
            return Err(NirejectError::Validation(format!(
                "Row position {} is removed more than once",
                pos
            )));
        }
    }
    Ok(())
}

fn kept_positions(n_rows: usize, removed: &[usize]) -> Vec<usize> {
    let mut drop = vec![false; n_rows];
    for &pos in removed {
        drop[pos] = true;
    }
    (0..n_rows).filter(|&pos| !drop[pos]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn test_array_remove_and_append() {
        let x = array![[0.0, 0.5], [1.0, 1.5], [2.0, 2.5]];
        let removed = x.remove_rows(&[1]).unwrap();
        assert_eq!(removed, array![[0.0, 0.5], [2.0, 2.5]]);

        let appended = x.append_rows(&[2, 2]).unwrap();
        assert_eq!(appended.nrows(), 5);
        assert_eq!(appended.row(4), x.row(2));
    }

    #[test]
    fn test_adapters_agree() {
        let values = array![[0.0], [1.0], [2.0], [3.0]];
        let table = KeyedTable::new(vec![10, 11, 12, 13], values.clone()).unwrap();
        let labels: Array1<i64> = array![0, 1, 0, 1];
        let keys = vec![10usize, 11, 12, 13];

        let t = table.remove_rows(&[0, 3]).unwrap().append_rows(&[1]).unwrap();
        let a = values.remove_rows(&[0, 3]).unwrap().append_rows(&[1]).unwrap();
        let l = labels.remove_rows(&[0, 3]).unwrap().append_rows(&[1]).unwrap();
        let k = keys.remove_rows(&[0, 3]).unwrap().append_rows(&[1]).unwrap();

        assert_eq!(t.values(), &a);
        assert_eq!(t.keys(), k.as_slice());
        assert_eq!(l, array![1, 0, 0]);
    }

    #[test]
    fn test_keyed_duplicates_share_key() {
        let table = KeyedTable::new(vec![5, 6], array![[1.0], [2.0]]).unwrap();
        let grown = table.append_rows(&[0]).unwrap();
        assert_eq!(grown.keys(), &[5, 6, 5]);
        assert_eq!(grown.row(6).unwrap()[0], 2.0);

        let shrunk = grown.remove_rows(&[0]).unwrap();
        assert_eq!(shrunk.keys(), &[6, 5]);
        assert_eq!(shrunk.row(5).unwrap()[0], 1.0);
    }

    #[test]
    fn test_duplicate_removal_rejected() {
        let x = array![1.0, 2.0, 3.0];
        let err = x.remove_rows(&[1, 1]).unwrap_err();
        assert!(err.to_string().contains("removed more than once"));
    }

    #[test]
    fn test_out_of_range_position() {
        let v = vec![1, 2, 3];
        let err = v.remove_rows(&[3]).unwrap_err();
        assert!(err.to_string().contains("Row position 3 is out of range for 3 rows"));
    }
}
