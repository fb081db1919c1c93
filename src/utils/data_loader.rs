//! CSV loading for uploaded datasets

use crate::error::{ComparatorError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

/// Row count and header of a parsed dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub row_count: usize,
    pub columns: Vec<String>,
}

impl DatasetSummary {
    pub fn from_frame(df: &DataFrame) -> Self {
        Self {
            row_count: df.height(),
            columns: df
                .get_column_names()
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

/// Reject uploads whose file name does not end in `.csv`
pub fn ensure_csv_name(file_name: &str) -> Result<()> {
    if file_name.to_lowercase().ends_with(".csv") {
        Ok(())
    } else {
        Err(ComparatorError::Validation(
            "Only CSV files are supported".to_string(),
        ))
    }
}

/// Parse an in-memory CSV upload.
///
/// The schema is inferred from every row so that a numeric column with a
/// late non-numeric value is read as a string column instead of failing.
pub fn load_csv_bytes(data: &[u8]) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(Cursor::new(data))
        .finish()
        .map_err(|e| ComparatorError::Validation(format!("Error reading CSV file: {}", e)))
}

/// Parse a CSV file stored on disk
pub fn load_csv_path(path: impl AsRef<Path>) -> Result<DataFrame> {
    let file = File::open(path.as_ref())?;

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| ComparatorError::Validation(format!("Error reading CSV file: {}", e)))
}

/// Null count per column, keyed by column name
pub fn missing_values(df: &DataFrame) -> BTreeMap<String, usize> {
    df.get_columns()
        .iter()
        .map(|col| (col.name().to_string(), col.null_count()))
        .collect()
}

/// Integer and float storage types
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_test_csv() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        writeln!(file, "a,b,c").unwrap();
        writeln!(file, "1,x,3.5").unwrap();
        writeln!(file, "4,,6.0").unwrap();
        writeln!(file, "7,y,").unwrap();
        file
    }

    #[test]
    fn test_load_csv_path() {
        let file = create_test_csv();
        let df = load_csv_path(file.path()).unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 3);
    }

    #[test]
    fn test_summary_matches_header_and_rows() {
        let df = load_csv_bytes(b"x,y,target\n1,2,3\n4,5,6\n").unwrap();
        let summary = DatasetSummary::from_frame(&df);

        assert_eq!(summary.row_count, 2);
        assert_eq!(summary.columns, vec!["x", "y", "target"]);
    }

    #[test]
    fn test_missing_values_counts_nulls() {
        let file = create_test_csv();
        let df = load_csv_path(file.path()).unwrap();
        let missing = missing_values(&df);

        assert_eq!(missing["a"], 0);
        assert_eq!(missing["b"], 1);
        assert_eq!(missing["c"], 1);
    }

    #[test]
    fn test_numeric_dtype_detection() {
        let df = load_csv_bytes(b"n,s\n1,a\n2,b\n").unwrap();
        assert!(is_numeric_dtype(df.column("n").unwrap().dtype()));
        assert!(!is_numeric_dtype(df.column("s").unwrap().dtype()));
    }

    #[test]
    fn test_csv_name_check() {
        assert!(ensure_csv_name("data.csv").is_ok());
        assert!(ensure_csv_name("DATA.CSV").is_ok());
        assert!(matches!(
            ensure_csv_name("data.xlsx"),
            Err(ComparatorError::Validation(_))
        ));
    }
}
