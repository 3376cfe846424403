//! GBDT model with deterministic fixed-point inference
//!
//! Feature values and targets are converted to integers at `SCALE` before
//! they reach a tree, so inference is integer-only and reproducible.

use super::tree::Tree;
use crate::errors::{CongestionError, Result};
use crate::features::FeatureMatrix;
use crate::regressor::Predictor;
use crate::serde_canon::hash_canonical_hex;
use serde::{Deserialize, Serialize};

/// Fixed-point scale factor (1e6)
pub const SCALE: i64 = 1_000_000;

/// Model format version
pub const MODEL_VERSION: i32 = 1;

/// Convert a real value to fixed-point, rounding half away from zero
pub fn to_fixed(value: f64) -> i64 {
    (value * SCALE as f64).round() as i64
}

/// Convert a fixed-point value back to a real value
pub fn from_fixed(value: i64) -> f64 {
    value as f64 / SCALE as f64
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    pub version: i32,
    pub scale: i64,
    pub feature_count: usize,
    pub trees: Vec<Tree>,
    pub bias: i64,
}

impl Model {
    pub fn new(trees: Vec<Tree>, bias: i64, feature_count: usize) -> Self {
        Self {
            version: MODEL_VERSION,
            scale: SCALE,
            feature_count,
            trees,
            bias,
        }
    }

    /// Validate version, scale and every tree
    pub fn validate(&self) -> Result<()> {
        if self.version != MODEL_VERSION {
            return Err(CongestionError::Serialization(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }

        if self.scale != SCALE {
            return Err(CongestionError::Serialization(format!(
                "Unsupported model scale: {}",
                self.scale
            )));
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.feature_count).map_err(|e| {
                CongestionError::Serialization(format!("Tree {i} validation failed: {e}"))
            })?;
        }

        Ok(())
    }

    /// Fixed-point score: bias + sum(leaf * weight / scale)
    pub fn score(&self, features: &[i64]) -> i64 {
        self.trees.iter().fold(self.bias, |sum, tree| {
            let weighted =
                (tree.evaluate(features) as i128 * tree.weight as i128) / self.scale as i128;
            sum.saturating_add(weighted as i64)
        })
    }

    /// Score a real-valued feature vector
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let fixed: Vec<i64> = row.iter().map(|&v| to_fixed(v)).collect();
        from_fixed(self.score(&fixed))
    }

    /// Blake3 hex of the canonical JSON form
    pub fn hash_hex(&self) -> Result<String> {
        hash_canonical_hex(self)
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Predictor for Model {
    fn predict(&self, features: &FeatureMatrix) -> Vec<f64> {
        features.rows().iter().map(|row| self.predict_row(row)).collect()
    }
}
