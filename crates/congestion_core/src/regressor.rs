//! Regression capability seams
//!
//! Training produces a model through `Regressor::fit`; the pipelines only
//! ever see the fitted model through `Predictor`.

use crate::errors::Result;
use crate::features::FeatureMatrix;

/// Fits a model from a feature matrix and aligned targets
pub trait Regressor {
    type Model: Predictor;

    fn fit(&self, features: &FeatureMatrix, targets: &[f64]) -> Result<Self::Model>;
}

/// A fitted model
pub trait Predictor {
    /// One prediction per row, in row order
    fn predict(&self, features: &FeatureMatrix) -> Vec<f64>;
}
