//! Utility functions and types

pub mod data_loader;

pub use data_loader::{
    ensure_csv_name, is_numeric_dtype, load_csv_bytes, load_csv_path, missing_values,
    DatasetSummary,
};

/// Make a string safe to use as a file name component
pub fn sanitize_file_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}
