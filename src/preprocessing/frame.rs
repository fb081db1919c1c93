//! Column-oriented feature table decoupled from polars storage types

use crate::error::{ComparatorError, Result};
use crate::utils::is_numeric_dtype;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Values of a single feature column with missing entries as `None`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValues {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Numeric(v) => v.len(),
            ColumnValues::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn null_count(&self) -> usize {
        match self {
            ColumnValues::Numeric(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnValues::Categorical(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// Gather rows by position
    pub fn take(&self, indices: &[usize]) -> Self {
        match self {
            ColumnValues::Numeric(v) => {
                ColumnValues::Numeric(indices.iter().map(|&i| v[i]).collect())
            }
            ColumnValues::Categorical(v) => {
                ColumnValues::Categorical(indices.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameColumn {
    pub name: String,
    pub values: ColumnValues,
}

impl FrameColumn {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self { name: name.into(), values: ColumnValues::Numeric(values) }
    }

    pub fn categorical(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self { name: name.into(), values: ColumnValues::Categorical(values) }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.values, ColumnValues::Numeric(_))
    }
}

/// Feature table handed to the preprocessing stage.
///
/// Numeric storage (integers, floats) becomes [`ColumnValues::Numeric`];
/// strings and booleans become [`ColumnValues::Categorical`]. NaN is
/// treated as missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    columns: Vec<FrameColumn>,
    n_rows: usize,
}

impl Frame {
    pub fn new(columns: Vec<FrameColumn>) -> Result<Self> {
        let n_rows = columns.first().map(|c| c.values.len()).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.values.len() != n_rows) {
            return Err(ComparatorError::Shape {
                expected: format!("{} rows", n_rows),
                actual: format!("{} rows in column '{}'", bad.values.len(), bad.name),
            });
        }
        Ok(Self { columns, n_rows })
    }

    /// Convert a polars frame, skipping `exclude`.
    ///
    /// Returns the frame and the names of columns whose storage type is
    /// neither numeric, string nor boolean.
    pub fn from_dataframe(df: &DataFrame, exclude: &[&str]) -> Result<(Self, Vec<String>)> {
        let mut columns = Vec::new();
        let mut ignored = Vec::new();

        for column in df.get_columns() {
            let name = column.name().to_string();
            if exclude.contains(&name.as_str()) {
                continue;
            }

            let dtype = column.dtype();
            if is_numeric_dtype(dtype) {
                columns.push(FrameColumn::numeric(name, numeric_values(column)?));
            } else if matches!(dtype, DataType::String | DataType::Boolean) {
                columns.push(FrameColumn::categorical(name, string_values(column)?));
            } else {
                ignored.push(name);
            }
        }

        let mut frame = Self::new(columns)?;
        frame.n_rows = df.height();
        Ok((frame, ignored))
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[FrameColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&FrameColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn numeric_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn categorical_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !c.is_numeric())
            .map(|c| c.name.clone())
            .collect()
    }

    /// Row subset in the given order
    pub fn take(&self, indices: &[usize]) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .map(|c| FrameColumn { name: c.name.clone(), values: c.values.take(indices) })
                .collect(),
            n_rows: indices.len(),
        }
    }

    /// Copy of the frame with the values of column `idx` replaced
    pub fn with_values(&self, idx: usize, values: ColumnValues) -> Result<Self> {
        if values.len() != self.n_rows {
            return Err(ComparatorError::Shape {
                expected: format!("{} rows", self.n_rows),
                actual: format!("{} rows", values.len()),
            });
        }
        let mut frame = self.clone();
        frame.columns[idx].values = values;
        Ok(frame)
    }
}

/// Numeric column as `f64`, NaN mapped to missing
pub fn numeric_values(column: &Column) -> Result<Vec<Option<f64>>> {
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    let ca = series.f64()?;
    Ok(ca.into_iter().map(|v| v.filter(|x| !x.is_nan())).collect())
}

fn string_values(column: &Column) -> Result<Vec<Option<String>>> {
    let series = column.as_materialized_series();
    match series.dtype() {
        DataType::Boolean => Ok(series
            .bool()?
            .into_iter()
            .map(|v| v.map(|b| b.to_string()))
            .collect()),
        _ => Ok(series
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_dataframe_partitions_columns() {
        let df = df! {
            "num" => &[Some(1i64), None, Some(3)],
            "cat" => &[Some("a"), Some("b"), None],
            "flag" => &[true, false, true],
            "target" => &[1.0, 2.0, 3.0],
        }
        .unwrap();

        let (frame, ignored) = Frame::from_dataframe(&df, &["target"]).unwrap();

        assert!(ignored.is_empty());
        assert_eq!(frame.n_rows(), 3);
        assert_eq!(frame.numeric_names(), vec!["num"]);
        assert_eq!(frame.categorical_names(), vec!["cat", "flag"]);
        assert_eq!(
            frame.column("num").unwrap().values,
            ColumnValues::Numeric(vec![Some(1.0), None, Some(3.0)])
        );
        assert_eq!(
            frame.column("flag").unwrap().values,
            ColumnValues::Categorical(vec![
                Some("true".to_string()),
                Some("false".to_string()),
                Some("true".to_string())
            ])
        );
    }

    #[test]
    fn test_take_and_replace() {
        let frame = Frame::new(vec![FrameColumn::numeric("x", vec![Some(1.0), Some(2.0), Some(3.0)])])
            .unwrap();

        let subset = frame.take(&[2, 0]);
        assert_eq!(subset.n_rows(), 2);
        assert_eq!(subset.columns()[0].values, ColumnValues::Numeric(vec![Some(3.0), Some(1.0)]));

        let replaced = frame
            .with_values(0, ColumnValues::Numeric(vec![None, None, None]))
            .unwrap();
        assert_eq!(replaced.columns()[0].values.null_count(), 3);
        assert!(frame.with_values(0, ColumnValues::Numeric(vec![None])).is_err());
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let result = Frame::new(vec![
            FrameColumn::numeric("x", vec![Some(1.0)]),
            FrameColumn::numeric("y", vec![Some(1.0), Some(2.0)]),
        ]);
        assert!(result.is_err());
    }
}
