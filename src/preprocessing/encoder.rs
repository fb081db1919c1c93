//! One-hot encoding of categorical columns

use super::frame::{ColumnValues, Frame};
use crate::error::{ComparatorError, Result};
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One-hot encoder with a dropped reference category.
///
/// Categories are sorted lexicographically and the first one is dropped, so
/// each column expands to `n_categories - 1` indicator columns named
/// `<column>_<category>`. Categories not seen during fit encode as all zeros.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encoder {
    drop_first: bool,
    columns: Vec<String>,
    // column name -> retained categories in output order
    categories: HashMap<String, Vec<String>>,
    is_fitted: bool,
}

impl Encoder {
    pub fn new(drop_first: bool) -> Self {
        Self {
            drop_first,
            columns: Vec::new(),
            categories: HashMap::new(),
            is_fitted: false,
        }
    }

    /// Learn the category set of each column; missing entries must already be imputed
    pub fn fit(&mut self, frame: &Frame, columns: &[String]) -> Result<&mut Self> {
        self.categories.clear();
        for name in columns {
            let values = categorical_values(frame, name)?;
            let sorted: BTreeSet<&str> = values.iter().flatten().map(String::as_str).collect();
            let skip = usize::from(self.drop_first);
            let kept = sorted.into_iter().skip(skip).map(str::to_string).collect();
            self.categories.insert(name.clone(), kept);
        }

        self.columns = columns.to_vec();
        self.is_fitted = true;
        Ok(self)
    }

    /// Number of indicator columns produced
    pub fn n_outputs(&self) -> usize {
        self.columns
            .iter()
            .map(|c| self.categories.get(c).map_or(0, Vec::len))
            .sum()
    }

    pub fn feature_names_out(&self) -> Vec<String> {
        self.columns
            .iter()
            .flat_map(|col| {
                self.categories
                    .get(col)
                    .into_iter()
                    .flatten()
                    .map(move |cat| format!("{}_{}", col, cat))
            })
            .collect()
    }

    /// Encode into a dense indicator matrix with one row per frame row
    pub fn transform(&self, frame: &Frame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ComparatorError::ModelNotFitted);
        }

        let mut out = Array2::zeros((frame.n_rows(), self.n_outputs()));
        let mut offset = 0;
        for name in &self.columns {
            let values = categorical_values(frame, name)?;
            let cats = self.categories.get(name).map(Vec::as_slice).unwrap_or(&[]);
            let index: HashMap<&str, usize> =
                cats.iter().enumerate().map(|(i, c)| (c.as_str(), i)).collect();

            let mut block = out.slice_mut(s![.., offset..offset + cats.len()]);
            for (row, value) in values.iter().enumerate() {
                if let Some(&col) = value.as_deref().and_then(|v| index.get(v)) {
                    block[[row, col]] = 1.0;
                }
            }
            offset += cats.len();
        }

        Ok(out)
    }
}

fn categorical_values<'a>(frame: &'a Frame, name: &str) -> Result<&'a [Option<String>]> {
    let column = frame
        .column(name)
        .ok_or_else(|| ComparatorError::Data(format!("Feature not found: {}", name)))?;
    match &column.values {
        ColumnValues::Categorical(values) => Ok(values),
        ColumnValues::Numeric(_) => Err(ComparatorError::Data(format!(
            "Cannot one-hot encode numeric column '{}'",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::FrameColumn;

    fn colors(values: &[&str]) -> Frame {
        Frame::new(vec![FrameColumn::categorical(
            "color",
            values.iter().map(|v| Some(v.to_string())).collect(),
        )])
        .unwrap()
    }

    #[test]
    fn test_onehot_drops_first_sorted_category() {
        let frame = colors(&["red", "blue", "green", "blue"]);
        let mut encoder = Encoder::new(true);
        encoder.fit(&frame, &["color".to_string()]).unwrap();

        assert_eq!(encoder.feature_names_out(), vec!["color_green", "color_red"]);

        let encoded = encoder.transform(&frame).unwrap();
        assert_eq!(encoded.shape(), &[4, 2]);
        assert_eq!(encoded.row(0).to_vec(), vec![0.0, 1.0]);
        assert_eq!(encoded.row(1).to_vec(), vec![0.0, 0.0]);
        assert_eq!(encoded.row(2).to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_unknown_category_encodes_as_zeros() {
        let mut encoder = Encoder::new(true);
        encoder
            .fit(&colors(&["a", "b", "c"]), &["color".to_string()])
            .unwrap();

        let encoded = encoder.transform(&colors(&["zzz", "c"])).unwrap();
        assert_eq!(encoded.row(0).to_vec(), vec![0.0, 0.0]);
        assert_eq!(encoded.row(1).to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_single_category_yields_no_columns() {
        let frame = colors(&["only", "only"]);
        let mut encoder = Encoder::new(true);
        encoder.fit(&frame, &["color".to_string()]).unwrap();

        assert_eq!(encoder.n_outputs(), 0);
        assert_eq!(encoder.transform(&frame).unwrap().shape(), &[2, 0]);
    }
}
