//! Epsilon-insensitive support vector regression
//!
//! The dual is solved by randomized coordinate descent on the combined
//! coefficients `beta = alpha - alpha*`. The bias is absorbed by adding a
//! constant 1 to the kernel, which removes the equality constraint of the
//! standard dual.

use crate::error::{ComparatorError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training returns an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Kernel function type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KernelType {
    /// K(x, y) = x · y
    Linear,
    /// K(x, y) = (γ x · y + r)^d
    Polynomial,
    /// K(x, y) = exp(-γ ||x - y||²)
    RBF,
    /// K(x, y) = tanh(γ x · y + r)
    Sigmoid,
}

/// Kernel coefficient γ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Gamma {
    /// 1 / (n_features * Var(X))
    Scale,
    /// 1 / n_features
    Auto,
    Value(f64),
}

/// SVR configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    pub kernel: KernelType,
    pub gamma: Gamma,
    /// Polynomial degree
    pub degree: i32,
    /// Independent term of the polynomial and sigmoid kernels
    pub coef0: f64,
    /// Half-width of the insensitive tube
    pub epsilon: f64,
    /// Tolerance for stopping criterion
    pub tol: f64,
    /// Maximum number of passes over the data
    pub max_iter: usize,
    pub random_state: Option<u64>,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::RBF,
            gamma: Gamma::Scale,
            degree: 3,
            coef0: 0.0,
            epsilon: 0.1,
            tol: 1e-3,
            max_iter: 1000,
            random_state: Some(42),
        }
    }
}

/// Support Vector Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMRegressor {
    config: SVMConfig,
    /// Resolved γ from the last fit
    gamma: f64,
    support_vectors: Option<Array2<f64>>,
    /// alpha - alpha* for each support vector
    dual_coef: Option<Array1<f64>>,
    bias: f64,
    is_fitted: bool,
}

impl SVMRegressor {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            gamma: 1.0,
            support_vectors: None,
            dual_coef: None,
            bias: 0.0,
            is_fitted: false,
        }
    }

    pub fn config(&self) -> &SVMConfig {
        &self.config
    }

    fn resolve_gamma(&self, x: &Array2<f64>) -> f64 {
        let n_features = x.ncols().max(1) as f64;
        match self.config.gamma {
            Gamma::Value(g) => g,
            Gamma::Auto => 1.0 / n_features,
            Gamma::Scale => {
                if x.is_empty() {
                    return 1.0;
                }
                let var = x.var(0.0);
                if var > 0.0 && var.is_finite() {
                    1.0 / (n_features * var)
                } else {
                    1.0
                }
            }
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n = x.nrows();

        if n != y.len() {
            return Err(ComparatorError::Shape {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(ComparatorError::Training(format!(
                "Dataset has {} samples, exceeding the maximum {} for SVR kernel matrix",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }
        if self.config.c <= 0.0 {
            return Err(ComparatorError::Training("C must be positive".to_string()));
        }

        self.gamma = self.resolve_gamma(x);

        // Bias-augmented kernel matrix Q = K + 1
        let q = self.compute_kernel_matrix(x).mapv(|v| v + 1.0);

        let c = self.config.c;
        let eps = self.config.epsilon;
        let mut beta: Array1<f64> = Array1::zeros(n);
        // f = Q beta
        let mut f: Array1<f64> = Array1::zeros(n);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(42));
        let mut order: Vec<usize> = (0..n).collect();

        for _ in 0..self.config.max_iter {
            order.shuffle(&mut rng);
            let mut max_change: f64 = 0.0;

            for &i in &order {
                let q_ii = q[[i, i]];
                if q_ii <= 1e-12 {
                    continue;
                }

                let grad = f[i] - y[i];
                let z = beta[i] - grad / q_ii;
                // Soft threshold for the epsilon term, then box constraint
                let new_beta = (z.signum() * (z.abs() - eps / q_ii).max(0.0)).clamp(-c, c);
                let delta = new_beta - beta[i];

                if delta != 0.0 {
                    f.scaled_add(delta, &q.column(i));
                    beta[i] = new_beta;
                    max_change = max_change.max(delta.abs());
                }
            }

            if max_change < self.config.tol {
                break;
            }
        }

        let support_indices: Vec<usize> = beta
            .iter()
            .enumerate()
            .filter(|(_, b)| b.abs() > 1e-12)
            .map(|(i, _)| i)
            .collect();

        self.support_vectors = Some(x.select(Axis(0), &support_indices));
        self.dual_coef = Some(beta.select(Axis(0), &support_indices));
        self.bias = beta.sum();
        self.is_fitted = true;

        Ok(())
    }

    fn compute_kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (0..n).map(|j| self.kernel(x.row(i), x.row(j))).collect())
            .collect();

        Array2::from_shape_fn((n, n), |(i, j)| rows[i][j])
    }

    fn kernel(&self, x1: ArrayView1<f64>, x2: ArrayView1<f64>) -> f64 {
        let gamma = self.gamma;
        match self.config.kernel {
            KernelType::Linear => x1.dot(&x2),
            KernelType::Polynomial => (gamma * x1.dot(&x2) + self.config.coef0).powi(self.config.degree),
            KernelType::RBF => {
                let norm_sq: f64 = x1.iter().zip(x2.iter()).map(|(a, b)| (a - b).powi(2)).sum();
                (-gamma * norm_sq).exp()
            }
            KernelType::Sigmoid => (gamma * x1.dot(&x2) + self.config.coef0).tanh(),
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (Some(sv), Some(coef)) = (self.support_vectors.as_ref(), self.dual_coef.as_ref()) else {
            return Err(ComparatorError::ModelNotFitted);
        };
        if sv.nrows() > 0 && x.ncols() != sv.ncols() {
            return Err(ComparatorError::Shape {
                expected: format!("{} features", sv.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let sample = x.row(i);
                sv.rows()
                    .into_iter()
                    .zip(coef.iter())
                    .map(|(s, &b)| b * self.kernel(sample, s))
                    .sum::<f64>()
                    + self.bias
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Primal weights Σ (αᵢ − αᵢ*) xᵢ, defined only for the linear kernel
    pub fn coefficients(&self) -> Option<Array1<f64>> {
        if self.config.kernel != KernelType::Linear || !self.is_fitted {
            return None;
        }
        let sv = self.support_vectors.as_ref()?;
        let coef = self.dual_coef.as_ref()?;
        Some(sv.t().dot(coef))
    }

    pub fn intercept(&self) -> Option<f64> {
        self.is_fitted.then_some(self.bias)
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.as_ref().map(|sv| sv.nrows()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((10, 1), (1..=10).map(|v| v as f64).collect()).unwrap();
        let y = x.column(0).mapv(|v| 2.0 * v);
        (x, y)
    }

    #[test]
    fn test_svm_regressor_linear() {
        let (x, y) = line_data();
        let config = SVMConfig {
            c: 10.0,
            kernel: KernelType::Linear,
            epsilon: 0.5,
            ..Default::default()
        };

        let mut svr = SVMRegressor::new(config);
        svr.fit(&x, &y).unwrap();

        let predictions = svr.predict(&x).unwrap();
        for (pred, actual) in predictions.iter().zip(y.iter()) {
            let error = (pred - actual).abs() / actual;
            assert!(error < 0.5, "Error {} too large for pred={}, actual={}", error, pred, actual);
        }

        let coef = svr.coefficients().unwrap();
        assert_eq!(coef.len(), 1);
        assert!(coef[0] > 0.0);
        assert!(svr.n_support_vectors() > 0);
    }

    #[test]
    fn test_rbf_has_no_coefficients() {
        let (x, y) = line_data();
        let mut svr = SVMRegressor::new(SVMConfig::default());
        svr.fit(&x, &y).unwrap();

        assert!(svr.coefficients().is_none());
        assert!(svr.predict(&x).unwrap().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_gamma_resolution() {
        let x = Array2::from_shape_vec((2, 2), vec![0.0, 0.0, 2.0, 2.0]).unwrap();
        let scale = SVMRegressor::new(SVMConfig::default());
        // Var over all entries is 1.0, two features
        assert!((scale.resolve_gamma(&x) - 0.5).abs() < 1e-12);

        let auto = SVMRegressor::new(SVMConfig { gamma: Gamma::Auto, ..Default::default() });
        assert!((auto.resolve_gamma(&x) - 0.5).abs() < 1e-12);

        let fixed = SVMRegressor::new(SVMConfig { gamma: Gamma::Value(3.0), ..Default::default() });
        assert_eq!(fixed.resolve_gamma(&x), 3.0);
    }

    #[test]
    fn test_points_inside_tube_are_not_support_vectors() {
        let x = Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let y = Array1::from_vec(vec![0.0, 0.01, -0.01, 0.0]);
        let mut svr = SVMRegressor::new(SVMConfig { epsilon: 1.0, ..Default::default() });
        svr.fit(&x, &y).unwrap();

        assert_eq!(svr.n_support_vectors(), 0);
        assert_eq!(svr.predict(&x).unwrap(), Array1::<f64>::zeros(4));
    }
}
