//! Pipeline configuration
//!
//! Layered as defaults, then an optional TOML file, then `CONGESTION_*`
//! environment variables. The CLI applies its flags on top.

use congestion_core::{ArtifactKeys, CongestionError, FsArtifactStore, MissingFeaturePolicy, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::trainer::GbdtConfig;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "CONGESTION_";

/// Paths, artifact keys and training parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Historical dataset (CSV)
    pub data_path: PathBuf,
    /// Directory holding both artifacts
    pub artifact_dir: PathBuf,
    pub preprocessor_key: String,
    pub model_key: String,
    pub missing_feature_policy: MissingFeaturePolicy,
    pub training: TrainingConfig,
}

/// Held-out split and model parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    /// Share of rows held out for evaluation, in (0, 1)
    pub test_fraction: f64,
    pub seed: u64,
    pub gbdt: GbdtConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let keys = ArtifactKeys::default();
        Self {
            data_path: PathBuf::from("historical_traffic_data.csv"),
            artifact_dir: PathBuf::from("artifacts"),
            preprocessor_key: keys.preprocessor,
            model_key: keys.model,
            missing_feature_policy: MissingFeaturePolicy::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            gbdt: GbdtConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults, overlaid with `path` when given, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        info!("Loading configuration from: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CongestionError::invalid_input("config", e.to_string()))
    }

    /// Apply `CONGESTION_*` overrides read through `lookup`
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(val) = var("DATA_PATH") {
            self.data_path = PathBuf::from(val);
        }
        if let Some(val) = var("ARTIFACT_DIR") {
            self.artifact_dir = PathBuf::from(val);
        }
        if let Some(val) = var("PREPROCESSOR_KEY") {
            self.preprocessor_key = val;
        }
        if let Some(val) = var("MODEL_KEY") {
            self.model_key = val;
        }
        if let Some(val) = var("MISSING_FEATURE_POLICY") {
            self.missing_feature_policy = match val.as_str() {
                "zero_fill" => MissingFeaturePolicy::ZeroFill,
                "reject" => MissingFeaturePolicy::Reject,
                other => {
                    return Err(CongestionError::invalid_input(
                        "CONGESTION_MISSING_FEATURE_POLICY",
                        format!("expected `zero_fill` or `reject`, got `{other}`"),
                    ))
                }
            };
        }

        let training = &mut self.training;
        override_parsed(var("TEST_FRACTION"), "TEST_FRACTION", &mut training.test_fraction)?;
        override_parsed(var("SEED"), "SEED", &mut training.seed)?;

        let gbdt = &mut training.gbdt;
        override_parsed(var("NUM_TREES"), "NUM_TREES", &mut gbdt.num_trees)?;
        override_parsed(var("MAX_DEPTH"), "MAX_DEPTH", &mut gbdt.max_depth)?;
        override_parsed(var("MIN_SAMPLES_LEAF"), "MIN_SAMPLES_LEAF", &mut gbdt.min_samples_leaf)?;
        override_parsed(var("LEARNING_RATE"), "LEARNING_RATE", &mut gbdt.learning_rate)?;
        override_parsed(var("QUANT_STEP"), "QUANT_STEP", &mut gbdt.quant_step)?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let fraction = self.training.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(CongestionError::invalid_input(
                "training.test_fraction",
                format!("must be strictly between 0 and 1, got {fraction}"),
            ));
        }
        for (field, key) in [
            ("preprocessor_key", &self.preprocessor_key),
            ("model_key", &self.model_key),
        ] {
            if key.trim().is_empty() {
                return Err(CongestionError::invalid_input(field, "must not be empty"));
            }
        }
        if self.preprocessor_key == self.model_key {
            return Err(CongestionError::invalid_input(
                "model_key",
                "must differ from preprocessor_key",
            ));
        }
        self.training.gbdt.validate()
    }

    pub fn artifact_keys(&self) -> ArtifactKeys {
        ArtifactKeys {
            preprocessor: self.preprocessor_key.clone(),
            model: self.model_key.clone(),
        }
    }

    pub fn artifact_store(&self) -> FsArtifactStore {
        FsArtifactStore::new(&self.artifact_dir)
    }
}

fn override_parsed<T>(value: Option<String>, name: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = value {
        *target = raw.trim().parse().map_err(|e: T::Err| {
            CongestionError::invalid_input(format!("{ENV_PREFIX}{name}"), format!("`{raw}`: {e}"))
        })?;
    }
    Ok(())
}
