//! K-Nearest Neighbors regressor

use crate::error::{ComparatorError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

/// Neighbor search strategy.
///
/// Every variant performs an exact search over the training rows, so the
/// choice never changes predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchAlgorithm {
    #[default]
    Auto,
    BallTree,
    KdTree,
    Brute,
}

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    pub n_neighbors: usize,
    pub weights: WeightScheme,
    pub algorithm: SearchAlgorithm,
    pub leaf_size: usize,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            weights: WeightScheme::Uniform,
            algorithm: SearchAlgorithm::Auto,
            leaf_size: 30,
        }
    }
}

/// K-Nearest Neighbors Regressor with Euclidean distance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNRegressor {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl KNNRegressor {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &KNNConfig {
        &self.config
    }

    /// Store the training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(ComparatorError::Shape {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.config.n_neighbors == 0 {
            return Err(ComparatorError::Training(
                "n_neighbors must be at least 1".to_string(),
            ));
        }
        if self.config.n_neighbors > x.nrows() {
            return Err(ComparatorError::Training(format!(
                "Expected n_neighbors <= n_samples, but n_samples = {}, n_neighbors = {}",
                x.nrows(),
                self.config.n_neighbors
            )));
        }

        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    /// Predict target values (parallelized over query rows)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (Some(x_train), Some(y_train)) = (self.x_train.as_ref(), self.y_train.as_ref()) else {
            return Err(ComparatorError::ModelNotFitted);
        };
        if x.ncols() != x_train.ncols() {
            return Err(ComparatorError::Shape {
                expected: format!("{} features", x_train.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let k = self.config.n_neighbors;
        let weights = self.config.weights;

        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = find_k_nearest(x.row(i), x_train, y_train, k);
                weighted_mean_from(&neighbors, weights)
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }
}

/// Max-heap entry for partial sort (keeps k smallest distances)
#[derive(PartialEq)]
struct DistLabel(f64, f64);

impl Eq for DistLabel {}
impl PartialOrd for DistLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

/// k nearest (distance, target) pairs using a max-heap, O(n log k)
fn find_k_nearest(
    point: ArrayView1<f64>,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    k: usize,
) -> Vec<(f64, f64)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (row, &target) in x_train.rows().into_iter().zip(y_train.iter()) {
        let dist = euclidean(point, row);
        if heap.len() < k {
            heap.push(DistLabel(dist, target));
        } else if let Some(top) = heap.peek() {
            if dist < top.0 {
                heap.pop();
                heap.push(DistLabel(dist, target));
            }
        }
    }

    heap.into_iter().map(|dl| (dl.0, dl.1)).collect()
}

fn euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(ai, bi)| {
            let d = ai - bi;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Weighted mean of neighbor targets.
///
/// With distance weights, neighbors at distance zero take all the weight.
fn weighted_mean_from(neighbors: &[(f64, f64)], weights: WeightScheme) -> f64 {
    match weights {
        WeightScheme::Uniform => mean_of(neighbors.iter().map(|(_, y)| *y)),
        WeightScheme::Distance => {
            if neighbors.iter().any(|(d, _)| *d == 0.0) {
                return mean_of(neighbors.iter().filter(|(d, _)| *d == 0.0).map(|(_, y)| *y));
            }
            let mut weighted_sum = 0.0;
            let mut weight_total = 0.0;
            for &(dist, y) in neighbors {
                let w = 1.0 / dist;
                weighted_sum += w * y;
                weight_total += w;
            }
            if weight_total > 0.0 {
                weighted_sum / weight_total
            } else {
                mean_of(neighbors.iter().map(|(_, y)| *y))
            }
        }
    }
}

fn mean_of(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), y| (s + y, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((10, 2), (0..20).map(|i| i as f64).collect()).unwrap();
        let y: Array1<f64> = x.rows().into_iter().map(|row| row[0] + row[1]).collect();
        (x, y)
    }

    #[test]
    fn test_knn_regressor() {
        let (x, y) = create_regression_data();

        let mut knn = KNNRegressor::with_k(3);
        knn.fit(&x, &y).unwrap();

        let predictions = knn.predict(&x).unwrap();
        let mse: f64 = y
            .iter()
            .zip(predictions.iter())
            .map(|(yi, pi)| (yi - pi).powi(2))
            .sum::<f64>()
            / y.len() as f64;

        assert!(mse < 10.0, "MSE ({}) should be low", mse);
    }

    #[test]
    fn test_distance_weights_exact_match() {
        let (x, y) = create_regression_data();

        let mut knn = KNNRegressor::new(KNNConfig {
            n_neighbors: 3,
            weights: WeightScheme::Distance,
            ..Default::default()
        });
        knn.fit(&x, &y).unwrap();

        // Training points are their own zero-distance neighbor
        let predictions = knn.predict(&x).unwrap();
        for (p, t) in predictions.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-12);
        }
    }

    #[test]
    fn test_algorithm_does_not_change_predictions() {
        let (x, y) = create_regression_data();
        let query = array![[2.5, 3.5], [11.0, 12.0]];

        let mut brute = KNNRegressor::new(KNNConfig {
            algorithm: SearchAlgorithm::Brute,
            ..Default::default()
        });
        let mut kd = KNNRegressor::new(KNNConfig {
            algorithm: SearchAlgorithm::KdTree,
            leaf_size: 5,
            ..Default::default()
        });
        brute.fit(&x, &y).unwrap();
        kd.fit(&x, &y).unwrap();

        assert_eq!(brute.predict(&query).unwrap(), kd.predict(&query).unwrap());
    }

    #[test]
    fn test_too_many_neighbors() {
        let (x, y) = create_regression_data();
        let mut knn = KNNRegressor::with_k(11);
        assert!(knn.fit(&x, &y).is_err());
    }

    #[test]
    fn test_predict_unfitted() {
        let knn = KNNRegressor::with_k(1);
        assert!(matches!(
            knn.predict(&array![[1.0, 2.0]]),
            Err(ComparatorError::ModelNotFitted)
        ));
    }
}
