//! Congestion trainer - deterministic offline GBDT training
//!
//! Loads historical traffic observations, fits the preprocessor, trains a
//! reproducible fixed-point GBDT on a seeded split and persists both
//! artifacts for the prediction pipeline in `congestion-core`.

pub mod cart;
pub mod config;
pub mod dataset;
pub mod deterministic;
pub mod metrics;
pub mod pipeline;
pub mod synthetic;
pub mod trainer;

pub use config::{PipelineConfig, TrainingConfig};
pub use deterministic::{LcgRng, SplitTieBreaker};
pub use pipeline::{Split, TrainingPipeline, TrainingReport};
pub use trainer::{GbdtConfig, GbdtTrainer};

/// Train and persist artifacts as described by `config`
pub fn train_from_config(
    config: &PipelineConfig,
) -> Result<TrainingReport, congestion_core::StageError> {
    let store = config.artifact_store();
    let trainer = GbdtTrainer::new(config.training.gbdt.clone());
    TrainingPipeline::from_config(config, trainer, &store).run(&config.data_path)
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
