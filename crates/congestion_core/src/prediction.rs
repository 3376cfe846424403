//! Prediction pipeline: `LoadArtifacts → Transform → Predict → Categorize`
//!
//! Artifacts are loaded once per pipeline instance. Missing artifacts are
//! fatal and reported as `ArtifactNotFound`; there is no fallback
//! prediction.

use crate::artifact::{load_model, load_preprocessor, ArtifactKeys, ArtifactStore, ModelArtifact};
use crate::errors::{CongestionError, Stage, StageError, StageExt};
use crate::features::Preprocessor;
use crate::record::Record;
use crate::regressor::Predictor;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Predictions below this are `Low`
pub const MEDIUM_THRESHOLD: f64 = 0.4;

/// Predictions at or above this are `High`
pub const HIGH_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CongestionLevel {
    Low,
    Medium,
    High,
}

impl CongestionLevel {
    /// Bucket a raw prediction with the fixed thresholds
    pub fn categorize(raw: f64) -> Result<Self, CongestionError> {
        if raw.is_nan() {
            return Err(CongestionError::invalid_input(
                "raw_prediction",
                "prediction is not a number",
            ));
        }
        Ok(if raw < MEDIUM_THRESHOLD {
            CongestionLevel::Low
        } else if raw < HIGH_THRESHOLD {
            CongestionLevel::Medium
        } else {
            CongestionLevel::High
        })
    }
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CongestionLevel::Low => "Low",
            CongestionLevel::Medium => "Medium",
            CongestionLevel::High => "High",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub raw_prediction: f64,
    pub congestion_level: CongestionLevel,
}

/// Structured failure emitted at the prediction boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
    pub kind: String,
    pub stage: Option<String>,
}

impl From<&StageError> for ErrorPayload {
    fn from(err: &StageError) -> Self {
        Self {
            error: err.to_string(),
            kind: err.error.kind().to_string(),
            stage: Some(err.stage.to_string()),
        }
    }
}

/// Either a result or an error payload; never a panic or a bare error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionResponse {
    Success(PredictionResult),
    Failure(ErrorPayload),
}

impl PredictionResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, PredictionResponse::Success(_))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"error":"failed to encode response: {e}","kind":"{}","stage":null}}"#,
                "serialization_error"
            )
        })
    }
}

impl From<Result<PredictionResult, StageError>> for PredictionResponse {
    fn from(result: Result<PredictionResult, StageError>) -> Self {
        match result {
            Ok(result) => PredictionResponse::Success(result),
            Err(err) => PredictionResponse::Failure(ErrorPayload::from(&err)),
        }
    }
}

/// A loaded preprocessor/model pair
#[derive(Debug, Clone)]
pub struct PredictionPipeline {
    preprocessor: Preprocessor,
    artifact: ModelArtifact,
}

impl PredictionPipeline {
    /// LoadArtifacts stage
    pub fn load(store: &dyn ArtifactStore, keys: &ArtifactKeys) -> Result<Self, StageError> {
        let preprocessor =
            load_preprocessor(store, &keys.preprocessor).stage(Stage::LoadArtifacts)?;
        let artifact = load_model(store, &keys.model).stage(Stage::LoadArtifacts)?;
        artifact
            .check_pairing(&preprocessor)
            .stage(Stage::LoadArtifacts)?;

        info!(
            model_hash = %artifact.model_hash,
            trees = artifact.model.num_trees(),
            features = artifact.model.feature_count,
            "Loaded prediction artifacts"
        );

        Ok(Self {
            preprocessor,
            artifact,
        })
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// Transform, predict and categorize one record
    pub fn predict(&self, record: &Record) -> Result<PredictionResult, StageError> {
        let features = self
            .preprocessor
            .transform_one(record)
            .stage(Stage::Transform)?;

        let raw_prediction = self
            .artifact
            .model
            .predict(&features)
            .first()
            .copied()
            .ok_or_else(|| {
                StageError::new(
                    Stage::Predict,
                    CongestionError::EmptyInput("model returned no prediction"),
                )
            })?;

        let congestion_level =
            CongestionLevel::categorize(raw_prediction).stage(Stage::Categorize)?;
        info!(raw_prediction, %congestion_level, "Prediction complete");

        Ok(PredictionResult {
            raw_prediction,
            congestion_level,
        })
    }
}

/// Full boundary: parse the request, load artifacts, predict.
/// Every failure becomes an `ErrorPayload`.
pub fn respond(store: &dyn ArtifactStore, keys: &ArtifactKeys, input: &str) -> PredictionResponse {
    let result = PredictionPipeline::load(store, keys).and_then(|pipeline| {
        let record = Record::from_json(input).stage(Stage::Transform)?;
        pipeline.predict(&record)
    });
    result.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::MemoryArtifactStore;

    #[test]
    fn test_threshold_boundaries() {
        let cases = [
            (0.0, CongestionLevel::Low),
            (0.39999, CongestionLevel::Low),
            (0.4, CongestionLevel::Medium),
            (0.69999, CongestionLevel::Medium),
            (0.7, CongestionLevel::High),
            (1.3, CongestionLevel::High),
            (-0.2, CongestionLevel::Low),
        ];
        for (raw, expected) in cases {
            assert_eq!(CongestionLevel::categorize(raw).unwrap(), expected, "{raw}");
        }
        assert!(CongestionLevel::categorize(f64::NAN).is_err());
    }

    #[test]
    fn test_result_json_shape() {
        let result = PredictionResult {
            raw_prediction: 0.5,
            congestion_level: CongestionLevel::Medium,
        };
        let json = PredictionResponse::Success(result).to_json();
        assert_eq!(json, r#"{"raw_prediction":0.5,"congestion_level":"Medium"}"#);
    }

    #[test]
    fn test_no_artifacts_is_fatal() {
        let store = MemoryArtifactStore::new();
        let err = PredictionPipeline::load(&store, &ArtifactKeys::default()).unwrap_err();
        assert_eq!(err.stage, Stage::LoadArtifacts);
        assert!(matches!(err.error, CongestionError::ArtifactNotFound { .. }));
    }

    #[test]
    fn test_respond_emits_error_payload() {
        let store = MemoryArtifactStore::new();
        let response = respond(&store, &ArtifactKeys::default(), r#"{"lat": 1.0}"#);
        assert!(!response.is_success());

        let PredictionResponse::Failure(payload) = response else {
            panic!("expected failure payload");
        };
        assert_eq!(payload.kind, "artifact_not_found");
        assert_eq!(payload.stage.as_deref(), Some("load_artifacts"));
    }
}
