//! Conversion from a polars `DataFrame` at the ingestion boundary

use super::Dataset;
use crate::error::{NirejectError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;

pub const LABELS_COLUMN: &str = "labels";
pub const SIGNAL_ID_COLUMN: &str = "signal_id";
pub const AUGMENTATION_COLUMN: &str = "augmentation";
pub const INDEX_COLUMN: &str = "index";

impl Dataset {
    /// Build a dataset from a frame holding the named feature columns,
    /// `labels`, `signal_id` and optionally `augmentation` and `index`.
    ///
    /// Every other string column is kept as a grouping column.
    pub fn from_dataframe(df: &DataFrame, features: &[String]) -> Result<Self> {
        let n_rows = df.height();

        let mut matrix = Array2::zeros((n_rows, features.len()));
        for (col, name) in features.iter().enumerate() {
            for (row, value) in float_column(df, name)?.into_iter().enumerate() {
                matrix[[row, col]] = value;
            }
        }

        let labels = float_column(df, LABELS_COLUMN)?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                if v.fract() != 0.0 {
                    Err(NirejectError::Validation(format!(
                        "Labels are not binary: found value {} at row {}",
                        v, row
                    )))
                } else {
                    Ok(v as i64)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let signal_ids = string_column(df, SIGNAL_ID_COLUMN)?;

        let mut dataset = Dataset::new(
            features.to_vec(),
            matrix,
            Array1::from_vec(labels),
            signal_ids,
        )?;

        if df.column(AUGMENTATION_COLUMN).is_ok() {
            dataset = dataset.with_augmentation(string_column(df, AUGMENTATION_COLUMN)?)?;
        }

        if df.column(INDEX_COLUMN).is_ok() {
            let index = float_column(df, INDEX_COLUMN)?
                .into_iter()
                .map(|v| {
                    if v < 0.0 || v.fract() != 0.0 {
                        Err(NirejectError::Validation(format!(
                            "Row index {} is not a non-negative integer",
                            v
                        )))
                    } else {
                        Ok(v as usize)
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            dataset = dataset.with_index(index)?;
        }

        let reserved = [LABELS_COLUMN, SIGNAL_ID_COLUMN, AUGMENTATION_COLUMN, INDEX_COLUMN];
        for column in df.get_columns() {
            let name = column.name().as_str();
            if reserved.contains(&name) || features.iter().any(|f| f == name) {
                continue;
            }
            if column.dtype() == &DataType::String {
                let values = string_column(df, name)?;
                dataset = dataset.with_group_column(name, values)?;
            }
        }

        tracing::debug!(
            rows = n_rows,
            features = features.len(),
            "Dataset loaded from frame"
        );

        Ok(dataset)
    }
}

fn series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|column| column.as_materialized_series())
        .map_err(|_| NirejectError::FeatureNotFound(name.to_string()))
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let values = series(df, name)?.cast(&DataType::Float64)?;
    values
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                NirejectError::Validation(format!(
                    "Column '{}' has a missing value at row {}",
                    name, row
                ))
            })
        })
        .collect()
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let values = series(df, name)?.cast(&DataType::String)?;
    values
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.map(str::to_string).ok_or_else(|| {
                NirejectError::Validation(format!(
                    "Column '{}' has a missing value at row {}",
                    name, row
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::NO_AUGMENTATION;

    #[test]
    fn test_from_dataframe_reads_required_columns() {
        let df = df!(
            "sci" => &[0.9, 0.3, 0.88, 0.35],
            "flatline" => &[0.0, 1.0, 0.0, 1.0],
            "labels" => &[0i64, 1, 0, 1],
            "signal_id" => &[10i64, 11, 10, 11],
            "augmentation" => &["None", "None", "AAFT", "AAFT"],
            "subject" => &["p1", "p2", "p1", "p2"]
        )
        .unwrap();

        let features = vec!["sci".to_string(), "flatline".to_string()];
        let ds = Dataset::from_dataframe(&df, &features).unwrap();

        assert_eq!(ds.n_rows(), 4);
        assert_eq!(ds.signal_ids()[1], "11");
        assert_eq!(ds.rows_tagged(NO_AUGMENTATION), vec![0, 1]);
        assert_eq!(ds.group_column("subject").unwrap()[1], "p2");
        assert_eq!(ds.labels()[3], 1);
    }

    #[test]
    fn test_from_dataframe_missing_feature() {
        let df = df!(
            "sci" => &[0.9, 0.3],
            "labels" => &[0i64, 1],
            "signal_id" => &["a", "b"]
        )
        .unwrap();

        let err = Dataset::from_dataframe(&df, &["snr".to_string()]).unwrap_err();
        assert!(matches!(err, NirejectError::FeatureNotFound(ref name) if name == "snr"));
    }

    #[test]
    fn test_from_dataframe_uses_index_column() {
        let df = df!(
            "index" => &[7i64, 3],
            "sci" => &[0.9, 0.3],
            "labels" => &[0i64, 1],
            "signal_id" => &["a", "b"]
        )
        .unwrap();

        let ds = Dataset::from_dataframe(&df, &["sci".to_string()]).unwrap();
        assert_eq!(ds.index(), &[7, 3]);
        assert_eq!(ds.augmentation(), &["None".to_string(), "None".to_string()]);
    }
}
