//! Estimator variants and their construction from hyperparameters

use super::config::{HyperParams, ModelType};
use super::knn::{KNNConfig, KNNRegressor, SearchAlgorithm, WeightScheme};
use super::linear_models::LinearRegression;
use super::models::Model;
use super::random_forest::{MaxFeatures, RandomForest};
use super::svm::{Gamma, KernelType, SVMConfig, SVMRegressor};
use super::xgboost::{XGBoostConfig, XGBoostRegressor};
use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A regression estimator of one of the supported types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    LinearRegression(LinearRegression),
    RandomForest(RandomForest),
    Knn(KNNRegressor),
    Svr(SVMRegressor),
    Xgboost(XGBoostRegressor),
}

impl Estimator {
    /// Build an unfitted estimator.
    ///
    /// Keys outside the model type's allow-list are rejected; a `normalize`
    /// key for linear regression is accepted and dropped.
    pub fn from_hyperparameters(model_type: ModelType, params: &Map<String, Value>) -> Result<Self> {
        model_type.validate_hyperparameters(params)?;
        let hp = HyperParams::new(model_type, params);

        let estimator = match model_type {
            ModelType::LinearRegression => {
                // n_jobs has no effect on the closed-form solve but must be well-formed
                hp.n_jobs("n_jobs")?;
                let fit_intercept = hp.get_bool("fit_intercept")?.unwrap_or(true);
                Estimator::LinearRegression(LinearRegression::new().with_fit_intercept(fit_intercept))
            }
            ModelType::RandomForest => Estimator::RandomForest(build_random_forest(&hp)?),
            ModelType::Knn => Estimator::Knn(build_knn(&hp)?),
            ModelType::Svr => Estimator::Svr(build_svr(&hp)?),
            ModelType::Xgboost => Estimator::Xgboost(build_xgboost(&hp)?),
        };
        Ok(estimator)
    }

    pub fn model_type(&self) -> ModelType {
        match self {
            Estimator::LinearRegression(_) => ModelType::LinearRegression,
            Estimator::RandomForest(_) => ModelType::RandomForest,
            Estimator::Knn(_) => ModelType::Knn,
            Estimator::Svr(_) => ModelType::Svr,
            Estimator::Xgboost(_) => ModelType::Xgboost,
        }
    }

    fn as_model(&self) -> &dyn Model {
        match self {
            Estimator::LinearRegression(m) => m,
            Estimator::RandomForest(m) => m,
            Estimator::Knn(m) => m,
            Estimator::Svr(m) => m,
            Estimator::Xgboost(m) => m,
        }
    }

    fn as_model_mut(&mut self) -> &mut dyn Model {
        match self {
            Estimator::LinearRegression(m) => m,
            Estimator::RandomForest(m) => m,
            Estimator::Knn(m) => m,
            Estimator::Svr(m) => m,
            Estimator::Xgboost(m) => m,
        }
    }
}

impl Model for Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.as_model_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.as_model().predict(x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.as_model().feature_importances()
    }

    fn coefficients(&self) -> Option<Array1<f64>> {
        self.as_model().coefficients()
    }

    fn intercept(&self) -> Option<f64> {
        self.as_model().intercept()
    }
}

fn build_random_forest(hp: &HyperParams<'_>) -> Result<RandomForest> {
    let max_features = match hp.raw("max_features") {
        None => MaxFeatures::All,
        Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "sqrt" => MaxFeatures::Sqrt,
            "log2" => MaxFeatures::Log2,
            "auto" => MaxFeatures::All,
            _ => return Err(hp.invalid("max_features", "\"sqrt\", \"log2\", an integer or a fraction")),
        },
        Some(v) => match (v.as_u64(), v.as_f64()) {
            (Some(n), _) if n > 0 => MaxFeatures::Fixed(n as usize),
            (None, Some(f)) if f > 0.0 && f <= 1.0 => MaxFeatures::Fraction(f),
            _ => return Err(hp.invalid("max_features", "\"sqrt\", \"log2\", an integer or a fraction")),
        },
    };

    Ok(RandomForest::new_regressor(hp.usize_at_least("n_estimators", 1)?.unwrap_or(100))
        .with_max_depth(hp.usize_at_least("max_depth", 1)?)
        .with_min_samples_split(hp.usize_at_least("min_samples_split", 2)?.unwrap_or(2))
        .with_min_samples_leaf(hp.usize_at_least("min_samples_leaf", 1)?.unwrap_or(1))
        .with_max_features(max_features)
        .with_random_state(hp.get_usize("random_state")?.map(|s| s as u64).unwrap_or(42))
        .with_n_jobs(hp.n_jobs("n_jobs")?))
}

fn build_knn(hp: &HyperParams<'_>) -> Result<KNNRegressor> {
    let weights = match hp.choice("weights", &["uniform", "distance"])? {
        Some("distance") => WeightScheme::Distance,
        _ => WeightScheme::Uniform,
    };
    let algorithm = match hp.choice("algorithm", &["auto", "ball_tree", "kd_tree", "brute"])? {
        Some("ball_tree") => SearchAlgorithm::BallTree,
        Some("kd_tree") => SearchAlgorithm::KdTree,
        Some("brute") => SearchAlgorithm::Brute,
        _ => SearchAlgorithm::Auto,
    };

    Ok(KNNRegressor::new(KNNConfig {
        n_neighbors: hp.usize_at_least("n_neighbors", 1)?.unwrap_or(5),
        weights,
        algorithm,
        leaf_size: hp.usize_at_least("leaf_size", 1)?.unwrap_or(30),
    }))
}

fn build_svr(hp: &HyperParams<'_>) -> Result<SVMRegressor> {
    let kernel = match hp.choice("kernel", &["rbf", "linear", "poly", "sigmoid"])? {
        Some("linear") => KernelType::Linear,
        Some("poly") => KernelType::Polynomial,
        Some("sigmoid") => KernelType::Sigmoid,
        _ => KernelType::RBF,
    };
    let gamma = match hp.raw("gamma") {
        None => Gamma::Scale,
        Some(Value::String(_)) => match hp.choice("gamma", &["scale", "auto"])? {
            Some("auto") => Gamma::Auto,
            _ => Gamma::Scale,
        },
        Some(_) => Gamma::Value(hp.positive_f64("gamma")?.unwrap_or(1.0)),
    };
    let epsilon = match hp.get_f64("epsilon")? {
        Some(e) if e < 0.0 => return Err(hp.invalid("epsilon", "a non-negative number")),
        other => other.unwrap_or(0.1),
    };

    Ok(SVMRegressor::new(SVMConfig {
        c: hp.positive_f64("C")?.unwrap_or(1.0),
        kernel,
        gamma,
        epsilon,
        ..Default::default()
    }))
}

fn build_xgboost(hp: &HyperParams<'_>) -> Result<XGBoostRegressor> {
    let defaults = XGBoostConfig::default();
    Ok(XGBoostRegressor::new(XGBoostConfig {
        n_estimators: hp.usize_at_least("n_estimators", 1)?.unwrap_or(defaults.n_estimators),
        max_depth: hp.usize_at_least("max_depth", 1)?.unwrap_or(defaults.max_depth),
        learning_rate: hp.positive_f64("learning_rate")?.unwrap_or(defaults.learning_rate),
        subsample: hp.fraction("subsample")?.unwrap_or(defaults.subsample),
        colsample_bytree: hp.fraction("colsample_bytree")?.unwrap_or(defaults.colsample_bytree),
        ..defaults
    }))
}

impl Model for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        LinearRegression::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        LinearRegression::predict(self, x)
    }

    fn coefficients(&self) -> Option<Array1<f64>> {
        self.coefficients.clone().filter(|_| self.is_fitted)
    }

    fn intercept(&self) -> Option<f64> {
        self.intercept.filter(|_| self.is_fitted && self.fit_intercept)
    }
}

impl Model for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        RandomForest::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RandomForest::predict(self, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        RandomForest::feature_importances(self).cloned()
    }
}

impl Model for KNNRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        KNNRegressor::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        KNNRegressor::predict(self, x)
    }
}

impl Model for SVMRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        SVMRegressor::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        SVMRegressor::predict(self, x)
    }

    fn coefficients(&self) -> Option<Array1<f64>> {
        SVMRegressor::coefficients(self)
    }

    fn intercept(&self) -> Option<f64> {
        // Only meaningful alongside primal coefficients
        SVMRegressor::coefficients(self).and(SVMRegressor::intercept(self))
    }
}

impl Model for XGBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        XGBoostRegressor::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        XGBoostRegressor::predict(self, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        XGBoostRegressor::feature_importances(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ComparatorError;
    use ndarray::array;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_linear_normalize_is_dropped() {
        let estimator = Estimator::from_hyperparameters(
            ModelType::LinearRegression,
            &params(json!({"normalize": true, "fit_intercept": false})),
        )
        .unwrap();

        let Estimator::LinearRegression(model) = estimator else {
            panic!("expected linear regression");
        };
        assert!(!model.fit_intercept);
    }

    #[test]
    fn test_unknown_hyperparameter_rejected() {
        let err = Estimator::from_hyperparameters(ModelType::Svr, &params(json!({"degree": 2})))
            .unwrap_err();
        assert!(matches!(err, ComparatorError::Validation(_)));
    }

    #[test]
    fn test_type_invalid_value_rejected() {
        let err = Estimator::from_hyperparameters(
            ModelType::RandomForest,
            &params(json!({"n_estimators": "ten"})),
        )
        .unwrap_err();
        assert!(matches!(err, ComparatorError::Validation(_)));
    }

    #[test]
    fn test_random_forest_parameters() {
        let estimator = Estimator::from_hyperparameters(
            ModelType::RandomForest,
            &params(json!({
                "n_estimators": 7,
                "max_depth": null,
                "max_features": "sqrt",
                "random_state": 3,
                "n_jobs": -1
            })),
        )
        .unwrap();

        let Estimator::RandomForest(rf) = estimator else {
            panic!("expected random forest");
        };
        assert_eq!(rf.n_estimators, 7);
        assert_eq!(rf.max_depth, None);
        assert_eq!(rf.max_features, MaxFeatures::Sqrt);
        assert_eq!(rf.random_state, Some(3));
        assert_eq!(rf.n_jobs, None);
    }

    #[test]
    fn test_max_features_integer_and_fraction() {
        let fixed = Estimator::from_hyperparameters(
            ModelType::RandomForest,
            &params(json!({"max_features": 2})),
        )
        .unwrap();
        let fraction = Estimator::from_hyperparameters(
            ModelType::RandomForest,
            &params(json!({"max_features": 0.5})),
        )
        .unwrap();

        assert!(matches!(fixed, Estimator::RandomForest(ref rf) if rf.max_features == MaxFeatures::Fixed(2)));
        assert!(matches!(fraction, Estimator::RandomForest(ref rf) if rf.max_features == MaxFeatures::Fraction(0.5)));
    }

    #[test]
    fn test_svr_and_knn_choices() {
        let svr = Estimator::from_hyperparameters(
            ModelType::Svr,
            &params(json!({"kernel": "linear", "C": 5.0, "gamma": "auto", "epsilon": 0.2})),
        )
        .unwrap();
        let Estimator::Svr(svr) = svr else {
            panic!("expected svr");
        };
        assert_eq!(svr.config().kernel, KernelType::Linear);
        assert_eq!(svr.config().gamma, Gamma::Auto);
        assert_eq!(svr.config().c, 5.0);

        let knn = Estimator::from_hyperparameters(
            ModelType::Knn,
            &params(json!({"n_neighbors": 3, "weights": "distance", "algorithm": "kd_tree"})),
        )
        .unwrap();
        let Estimator::Knn(knn) = knn else {
            panic!("expected knn");
        };
        assert_eq!(knn.config().n_neighbors, 3);
        assert_eq!(knn.config().weights, WeightScheme::Distance);
        assert_eq!(knn.config().algorithm, SearchAlgorithm::KdTree);

        let bad = Estimator::from_hyperparameters(ModelType::Knn, &params(json!({"weights": "gaussian"})));
        assert!(bad.is_err());
    }

    #[test]
    fn test_capabilities_after_fit() {
        let x = array![[1.0, 0.5], [2.0, 1.5], [3.0, 0.0], [4.0, 2.5], [5.0, 1.0], [6.0, 3.0]];
        let y = array![2.0, 4.5, 5.0, 9.5, 10.0, 14.0];

        for model_type in ModelType::ALL {
            let mut estimator = Estimator::from_hyperparameters(model_type, &Map::new()).unwrap();
            if model_type == ModelType::Knn {
                estimator = Estimator::from_hyperparameters(model_type, &params(json!({"n_neighbors": 2}))).unwrap();
            }
            estimator.fit(&x, &y).unwrap();
            assert_eq!(estimator.predict(&x).unwrap().len(), 6);
            assert_eq!(estimator.model_type(), model_type);

            let native = estimator.feature_importances().is_some();
            let coef = estimator.coefficients().is_some();
            match model_type {
                ModelType::RandomForest | ModelType::Xgboost => assert!(native && !coef),
                ModelType::LinearRegression => assert!(!native && coef),
                ModelType::Knn | ModelType::Svr => assert!(!native && !coef),
            }
        }
    }
}
