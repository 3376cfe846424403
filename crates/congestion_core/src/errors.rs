//! Error types for preprocessing, inference and artifact handling

use std::fmt;
use thiserror::Error;

/// Errors that can occur anywhere in the congestion pipeline
#[derive(Error, Debug)]
pub enum CongestionError {
    /// Malformed or missing required field
    #[error("Invalid input for field `{field}`: {reason}")]
    InvalidInput { field: String, reason: String },

    /// Transform requested before fit
    #[error("{0} is not fitted (call fit first)")]
    NotFitted(&'static str),

    /// Fit requested on an already fitted component
    #[error("{0} is already fitted")]
    AlreadyFitted(&'static str),

    /// Fit requested with zero rows
    #[error("Empty input: {0}")]
    EmptyInput(&'static str),

    /// Training target absent
    #[error("Missing column `{column}`{}", row.map(|r| format!(" at row {r}")).unwrap_or_default())]
    MissingColumn { column: String, row: Option<usize> },

    /// Prediction requested before training
    #[error("Artifact not found: {key}")]
    ArtifactNotFound { key: String },

    /// Corrupt or incompatible artifact
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CongestionError {
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Stable snake_case label used in structured error payloads
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::NotFitted(_) => "not_fitted",
            Self::AlreadyFitted(_) => "already_fitted",
            Self::EmptyInput(_) => "empty_input",
            Self::MissingColumn { .. } => "missing_column",
            Self::ArtifactNotFound { .. } => "artifact_not_found",
            Self::Serialization(_) => "serialization_error",
            Self::Io(_) => "io_error",
        }
    }
}

impl From<serde_json::Error> for CongestionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadData,
    FitPreprocessor,
    Split,
    FitRegressor,
    Evaluate,
    Persist,
    LoadArtifacts,
    Transform,
    Predict,
    Categorize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::LoadData => "load_data",
            Stage::FitPreprocessor => "fit_preprocessor",
            Stage::Split => "split",
            Stage::FitRegressor => "fit_regressor",
            Stage::Evaluate => "evaluate",
            Stage::Persist => "persist",
            Stage::LoadArtifacts => "load_artifacts",
            Stage::Transform => "transform",
            Stage::Predict => "predict",
            Stage::Categorize => "categorize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First error raised by a pipeline, tagged with the stage that raised it
#[derive(Error, Debug)]
#[error("{stage} stage failed: {error}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub error: CongestionError,
}

impl StageError {
    pub fn new(stage: Stage, error: CongestionError) -> Self {
        Self { stage, error }
    }
}

/// Attach a stage to a fallible step
pub trait StageExt<T> {
    fn stage(self, stage: Stage) -> std::result::Result<T, StageError>;
}

impl<T> StageExt<T> for Result<T> {
    fn stage(self, stage: Stage) -> std::result::Result<T, StageError> {
        self.map_err(|error| StageError::new(stage, error))
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CongestionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_column_message_includes_row() {
        let err = CongestionError::MissingColumn {
            column: "congestion_level".into(),
            row: Some(3),
        };
        assert_eq!(err.to_string(), "Missing column `congestion_level` at row 3");

        let err = CongestionError::MissingColumn {
            column: "congestion_level".into(),
            row: None,
        };
        assert_eq!(err.to_string(), "Missing column `congestion_level`");
    }

    #[test]
    fn stage_error_reports_stage_and_cause() {
        let result: Result<()> = Err(CongestionError::EmptyInput("records"));
        let err = result.stage(Stage::FitPreprocessor).unwrap_err();
        assert_eq!(err.stage, Stage::FitPreprocessor);
        assert_eq!(err.error.kind(), "empty_input");
        assert_eq!(
            err.to_string(),
            "fit_preprocessor stage failed: Empty input: records"
        );
    }
}
