//! Training pipeline:
//! `LoadData → FitPreprocessor → Split → FitRegressor → Evaluate → Persist`
//!
//! Stages run strictly in order and any failure aborts the run with the
//! stage that failed. Nothing is retried. Either both artifacts are
//! persisted or neither is.

use congestion_core::artifact::{encode_model, encode_preprocessor};
use congestion_core::gbdt::Model;
use congestion_core::{
    ArtifactKeys, ArtifactStore, CongestionError, EvaluationReport, FeatureMatrix,
    MissingFeaturePolicy, ModelArtifact, Predictor, Preprocessor, Record, Regressor, Stage,
    StageError, StageExt,
};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::dataset;
use crate::deterministic::LcgRng;
use crate::metrics;

/// Summary of a successful run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub evaluation: EvaluationReport,
    pub model_hash: String,
    pub preprocessor_fingerprint: String,
    pub columns: Vec<String>,
}

/// Row indices of the held-out split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Split {
    /// Seeded shuffle, then hold out `test_fraction` of the rows (at least
    /// one row on each side)
    pub fn new(rows: usize, test_fraction: f64, seed: u64) -> Result<Self, CongestionError> {
        if rows < 2 {
            return Err(CongestionError::EmptyInput(
                "need at least two rows to hold out a test split",
            ));
        }
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(CongestionError::invalid_input(
                "test_fraction",
                format!("must be strictly between 0 and 1, got {test_fraction}"),
            ));
        }

        let test_rows = ((rows as f64 * test_fraction).round() as usize).clamp(1, rows - 1);
        let shuffled = LcgRng::new(seed).shuffled_indices(rows);

        let mut test = shuffled[..test_rows].to_vec();
        let mut train = shuffled[test_rows..].to_vec();
        test.sort_unstable();
        train.sort_unstable();
        Ok(Self { train, test })
    }
}

/// Trains a regressor and persists it with its preprocessor
pub struct TrainingPipeline<'a, R> {
    regressor: R,
    store: &'a dyn ArtifactStore,
    keys: ArtifactKeys,
    policy: MissingFeaturePolicy,
    test_fraction: f64,
    seed: u64,
}

impl<'a, R> TrainingPipeline<'a, R>
where
    R: Regressor<Model = Model>,
{
    /// Default split (0.2, seed 42) and the zero-fill policy
    pub fn new(regressor: R, store: &'a dyn ArtifactStore, keys: ArtifactKeys) -> Self {
        Self {
            regressor,
            store,
            keys,
            policy: MissingFeaturePolicy::default(),
            test_fraction: 0.2,
            seed: 42,
        }
    }

    pub fn from_config(
        config: &PipelineConfig,
        regressor: R,
        store: &'a dyn ArtifactStore,
    ) -> Self {
        Self::new(regressor, store, config.artifact_keys())
            .with_policy(config.missing_feature_policy)
            .with_split(config.training.test_fraction, config.training.seed)
    }

    pub fn with_policy(mut self, policy: MissingFeaturePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_split(mut self, test_fraction: f64, seed: u64) -> Self {
        self.test_fraction = test_fraction;
        self.seed = seed;
        self
    }

    /// Run every stage, loading the dataset from a CSV file
    pub fn run(&self, data_path: &Path) -> Result<TrainingReport, StageError> {
        info!(path = %data_path.display(), "Loading dataset");
        let records = dataset::load_csv(data_path).stage(Stage::LoadData)?;
        self.run_records(&records)
    }

    /// Run every stage after LoadData on records already in memory
    pub fn run_records(&self, records: &[Record]) -> Result<TrainingReport, StageError> {
        let mut preprocessor = Preprocessor::new(self.policy);
        let fitted = preprocessor.fit(records).stage(Stage::FitPreprocessor)?;

        let split = Split::new(fitted.features.len(), self.test_fraction, self.seed)
            .stage(Stage::Split)?;
        let train_x = fitted.features.select(&split.train);
        let test_x = fitted.features.select(&split.test);
        let train_y = select(&fitted.targets, &split.train);
        let test_y = select(&fitted.targets, &split.test);
        info!(
            train_rows = train_x.len(),
            test_rows = test_x.len(),
            seed = self.seed,
            "Split dataset"
        );

        info!("Starting training...");
        let model = self.regressor.fit(&train_x, &train_y).stage(Stage::FitRegressor)?;
        info!(trees = model.num_trees(), bias = model.bias, "Training complete");

        let evaluation = evaluate(&model, &test_x, &test_y, train_x.len());

        self.persist(&preprocessor, model, evaluation)
    }

    fn persist(
        &self,
        preprocessor: &Preprocessor,
        model: Model,
        evaluation: EvaluationReport,
    ) -> Result<TrainingReport, StageError> {
        let artifact = ModelArtifact::new(model, preprocessor, Some(evaluation.clone()))
            .stage(Stage::Persist)?;
        let preprocessor_bytes = encode_preprocessor(preprocessor).stage(Stage::Persist)?;
        let model_bytes = encode_model(&artifact).stage(Stage::Persist)?;

        let previous = match self.store.load(&self.keys.preprocessor) {
            Ok(bytes) => Some(bytes),
            Err(CongestionError::ArtifactNotFound { .. }) => None,
            Err(err) => return Err(StageError::new(Stage::Persist, err)),
        };

        self.store
            .save(&self.keys.preprocessor, &preprocessor_bytes)
            .stage(Stage::Persist)?;

        if let Err(err) = self.store.save(&self.keys.model, &model_bytes) {
            self.rollback_preprocessor(previous.as_deref());
            return Err(StageError::new(Stage::Persist, err));
        }

        info!(
            preprocessor = %self.keys.preprocessor,
            model = %self.keys.model,
            model_hash = %artifact.model_hash,
            "Artifacts saved"
        );

        Ok(TrainingReport {
            evaluation,
            model_hash: artifact.model_hash,
            preprocessor_fingerprint: artifact.preprocessor_fingerprint,
            columns: preprocessor.column_names().stage(Stage::Persist)?,
        })
    }

    /// Put back the preprocessor that was stored before this run, or drop
    /// the new one when there was none
    fn rollback_preprocessor(&self, previous: Option<&[u8]>) {
        let key = &self.keys.preprocessor;
        let restored = match previous {
            Some(bytes) => self.store.save(key, bytes),
            None => self.store.remove(key),
        };
        if let Err(err) = restored {
            warn!(
                key = %key,
                error = %err,
                "Failed to roll back preprocessor after model write failure"
            );
        }
    }
}

fn evaluate(
    model: &Model,
    test_x: &FeatureMatrix,
    test_y: &[f64],
    train_rows: usize,
) -> EvaluationReport {
    let predictions = model.predict(test_x);
    let rmse = metrics::rmse(&predictions, test_y);
    let r2 = metrics::r2(&predictions, test_y);

    match r2 {
        Some(r2) => info!(rmse, r2, "Model evaluation"),
        None => info!(rmse, "Model evaluation (R2 undefined: constant held-out targets)"),
    }

    EvaluationReport {
        rmse,
        r2,
        train_rows,
        test_rows: test_y.len(),
    }
}

fn select(values: &[f64], indices: &[usize]) -> Vec<f64> {
    indices.iter().map(|&i| values[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainer::{GbdtConfig, GbdtTrainer};
    use congestion_core::MemoryArtifactStore;

    fn small_trainer() -> GbdtTrainer {
        GbdtTrainer::new(GbdtConfig {
            num_trees: 5,
            max_depth: 2,
            min_samples_leaf: 1,
            ..GbdtConfig::default()
        })
    }

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record {
                timestamp: Some(format!("2024-04-{:02}T{:02}:00:00", i % 28 + 1, i % 24)),
                lat: Some(40.7),
                lng: Some(-74.0),
                temperature: Some(10.0),
                humidity: Some(50.0),
                weather_condition: Some(["Rain", "Clear"][i % 2].to_string()),
                congestion_level: Some((i % 24) as f64 / 30.0),
            })
            .collect()
    }

    #[test]
    fn test_split_sizes() {
        let split = Split::new(10, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 8);

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());

        let tiny = Split::new(2, 0.01, 42).unwrap();
        assert_eq!((tiny.train.len(), tiny.test.len()), (1, 1));
    }

    #[test]
    fn test_split_errors() {
        assert_eq!(Split::new(1, 0.2, 42).unwrap_err().kind(), "empty_input");
        assert_eq!(Split::new(10, 1.0, 42).unwrap_err().kind(), "invalid_input");
    }

    #[test]
    fn test_run_persists_both_artifacts() {
        let store = MemoryArtifactStore::new();
        let pipeline = TrainingPipeline::new(small_trainer(), &store, ArtifactKeys::default());

        let report = pipeline.run_records(&records(40)).unwrap();
        assert_eq!(report.evaluation.test_rows, 8);
        assert_eq!(report.evaluation.train_rows, 32);
        assert_eq!(report.columns.len(), 10);
        assert!(store.contains("preprocessor.json"));
        assert!(store.contains("model.json"));
    }

    #[test]
    fn test_stage_reported_on_failure() {
        let store = MemoryArtifactStore::new();
        let pipeline = TrainingPipeline::new(small_trainer(), &store, ArtifactKeys::default());

        let mut bad = records(10);
        bad[3].congestion_level = None;
        let err = pipeline.run_records(&bad).unwrap_err();
        assert_eq!(err.stage, Stage::FitPreprocessor);
        assert_eq!(err.error.kind(), "missing_column");

        let err = pipeline.run_records(&records(1)).unwrap_err();
        assert_eq!(err.stage, Stage::Split);

        let err = pipeline.run(Path::new("/nonexistent/data.csv")).unwrap_err();
        assert_eq!(err.stage, Stage::LoadData);
        assert!(store.is_empty());
    }
}
