//! Gradient Boosted Decision Tree (GBDT) trainer
//!
//! Deterministic GBDT training with fixed-point arithmetic and exact-greedy
//! CART splits. Real-valued features and targets are converted to
//! fixed-point at the model scale before training starts.

use congestion_core::gbdt::{to_fixed, Model, Tree, SCALE};
use congestion_core::{CongestionError, FeatureMatrix, Regressor, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cart::{CartBuilder, TreeConfig};

/// Hessian of squared error, at the leaf value scale
const HESSIAN: i64 = 1000;

/// GBDT training configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbdtConfig {
    pub num_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub learning_rate: f64,
    /// Threshold grid width, in feature units
    pub quant_step: f64,
}

impl Default for GbdtConfig {
    fn default() -> Self {
        Self {
            num_trees: 100,
            max_depth: 6,
            min_samples_leaf: 8,
            learning_rate: 0.1,
            quant_step: 0.001,
        }
    }
}

impl GbdtConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_trees == 0 {
            return Err(CongestionError::invalid_input("gbdt.num_trees", "must be at least 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(CongestionError::invalid_input(
                "gbdt.learning_rate",
                format!("must be positive, got {}", self.learning_rate),
            ));
        }
        if !(self.quant_step.is_finite() && to_fixed(self.quant_step) > 0) {
            return Err(CongestionError::invalid_input(
                "gbdt.quant_step",
                format!("must be at least {}, got {}", 1.0 / SCALE as f64, self.quant_step),
            ));
        }
        Ok(())
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            quant_step: to_fixed(self.quant_step),
        }
    }
}

/// GBDT trainer
#[derive(Clone, Debug, Default)]
pub struct GbdtTrainer {
    config: GbdtConfig,
}

impl GbdtTrainer {
    pub fn new(config: GbdtConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GbdtConfig {
        &self.config
    }

    /// Train on fixed-point features and targets
    pub fn train(&self, features: &[Vec<i64>], targets: &[i64]) -> Result<Model> {
        self.config.validate()?;
        if features.is_empty() {
            return Err(CongestionError::EmptyInput("cannot train on zero rows"));
        }
        if features.len() != targets.len() {
            return Err(CongestionError::invalid_input(
                "targets",
                format!("{} targets for {} feature rows", targets.len(), features.len()),
            ));
        }
        let feature_count = features[0].len();

        let bias = self.calculate_bias(targets);
        let mut predictions = vec![bias; features.len()];

        let weight = to_fixed(self.config.learning_rate);
        let tree_config = self.config.tree_config();
        let mut trees = Vec::with_capacity(self.config.num_trees);

        for tree_idx in 0..self.config.num_trees {
            let gradients = self.calculate_gradients(targets, &predictions);
            let hessians = vec![HESSIAN; gradients.len()];

            let tree = CartBuilder::new(features, &gradients, &hessians, tree_config.clone())
                .build(weight);
            self.update_predictions(&tree, features, &mut predictions);

            debug!(
                tree = tree_idx + 1,
                of = self.config.num_trees,
                nodes = tree.nodes.len(),
                "Trained tree"
            );
            trees.push(tree);
        }

        Ok(Model::new(trees, bias, feature_count))
    }

    /// Initial bias: mean of targets
    fn calculate_bias(&self, targets: &[i64]) -> i64 {
        if targets.is_empty() {
            return 0;
        }

        let sum: i128 = targets.iter().map(|&t| t as i128).sum();
        (sum / targets.len() as i128) as i64
    }

    /// Squared-error gradient: prediction - target
    fn calculate_gradients(&self, targets: &[i64], predictions: &[i64]) -> Vec<i64> {
        predictions
            .iter()
            .zip(targets)
            .map(|(&p, &t)| p.saturating_sub(t))
            .collect()
    }

    /// Add each tree's weighted output, matching `Model::score`
    fn update_predictions(&self, tree: &Tree, features: &[Vec<i64>], predictions: &mut [i64]) {
        for (pred, row) in predictions.iter_mut().zip(features) {
            let scaled = (tree.evaluate(row) as i128 * tree.weight as i128) / SCALE as i128;
            *pred = pred.saturating_add(scaled as i64);
        }
    }
}

impl Regressor for GbdtTrainer {
    type Model = Model;

    fn fit(&self, features: &FeatureMatrix, targets: &[f64]) -> Result<Model> {
        let rows = features
            .rows()
            .iter()
            .enumerate()
            .map(|(i, row)| {
                fixed_row(row).map_err(|reason| {
                    CongestionError::invalid_input(format!("features row {i}"), reason)
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let targets = fixed_row(targets)
            .map_err(|reason| CongestionError::invalid_input("targets", reason))?;

        self.train(&rows, &targets)
    }
}

fn fixed_row(values: &[f64]) -> std::result::Result<Vec<i64>, String> {
    values
        .iter()
        .map(|&v| {
            if v.is_finite() {
                Ok(to_fixed(v))
            } else {
                Err(format!("non-finite value {v}"))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use congestion_core::Predictor;

    fn simple_config() -> GbdtConfig {
        GbdtConfig {
            num_trees: 4,
            max_depth: 2,
            min_samples_leaf: 1,
            learning_rate: 0.1,
            quant_step: 0.05,
        }
    }

    fn simple_dataset() -> (Vec<Vec<i64>>, Vec<i64>) {
        (
            vec![
                vec![100_000, 200_000],
                vec![200_000, 300_000],
                vec![300_000, 400_000],
                vec![400_000, 500_000],
            ],
            vec![1_000_000, 2_000_000, 3_000_000, 4_000_000],
        )
    }

    #[test]
    fn test_train_simple_model() {
        let (features, targets) = simple_dataset();
        let model = GbdtTrainer::new(simple_config()).train(&features, &targets).unwrap();

        assert_eq!(model.trees.len(), 4);
        assert_eq!(model.feature_count, 2);
        assert_eq!(model.bias, 2_500_000);
        assert!(model.trees.iter().all(|t| t.weight == 100_000));
        model.validate().unwrap();

        // boosting moves predictions toward the targets
        assert!(model.score(&features[0]) < model.bias);
        assert!(model.score(&features[3]) > model.bias);
    }

    #[test]
    fn test_bias_calculation() {
        let trainer = GbdtTrainer::default();
        assert_eq!(trainer.calculate_bias(&[1_000_000, 2_000_000, 3_000_000]), 2_000_000);
        assert_eq!(trainer.calculate_bias(&[]), 0);
    }

    #[test]
    fn test_determinism() {
        let (features, targets) = simple_dataset();
        let model1 = GbdtTrainer::new(simple_config()).train(&features, &targets).unwrap();
        let model2 = GbdtTrainer::new(simple_config()).train(&features, &targets).unwrap();

        assert_eq!(model1, model2);
        assert_eq!(model1.hash_hex().unwrap(), model2.hash_hex().unwrap());
    }

    #[test]
    fn test_fit_through_regressor() {
        let matrix = FeatureMatrix::new(
            vec!["hour_of_day".into()],
            (0..40).map(|h| vec![(h % 24) as f64]).collect(),
        );
        let targets: Vec<f64> = (0..40).map(|h| if h % 24 < 12 { 0.2 } else { 0.8 }).collect();
        let config = GbdtConfig {
            num_trees: 30,
            max_depth: 2,
            min_samples_leaf: 2,
            learning_rate: 0.3,
            quant_step: 1.0,
        };

        let model = GbdtTrainer::new(config).fit(&matrix, &targets).unwrap();
        let predictions = model.predict(&matrix);
        assert!((predictions[3] - 0.2).abs() < 0.05);
        assert!((predictions[20] - 0.8).abs() < 0.05);
    }

    #[test]
    fn test_rejects_bad_input() {
        let trainer = GbdtTrainer::default();
        assert_eq!(trainer.train(&[], &[]).unwrap_err().kind(), "empty_input");

        let matrix = FeatureMatrix::new(vec!["x".into()], vec![vec![f64::NAN]]);
        assert_eq!(trainer.fit(&matrix, &[0.5]).unwrap_err().kind(), "invalid_input");
    }

    #[test]
    fn test_config_validation() {
        assert!(GbdtConfig::default().validate().is_ok());
        for config in [
            GbdtConfig { num_trees: 0, ..GbdtConfig::default() },
            GbdtConfig { learning_rate: 0.0, ..GbdtConfig::default() },
            GbdtConfig { quant_step: 0.0, ..GbdtConfig::default() },
        ] {
            assert_eq!(config.validate().unwrap_err().kind(), "invalid_input");
        }
    }
}
