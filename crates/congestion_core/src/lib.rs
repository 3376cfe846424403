//! Congestion prediction core
//!
//! Turns raw traffic observations (position, timestamp, weather) into a
//! fixed-width feature vector with a frozen, versioned layout, and scores
//! those vectors with a deterministic fixed-point GBDT.
//!
//! Modules:
//! - `record`: typed raw observations
//! - `features`: feature engineering, one-hot encoding, column assembly and
//!   the persisted `Preprocessor`
//! - `gbdt`: integer-only tree ensemble inference
//! - `regressor`: fit/predict seams used by the pipelines
//! - `artifact`: artifact stores and the preprocessor/model pairing
//! - `prediction`: the single-record prediction pipeline
//! - `serde_canon`: canonical JSON and Blake3 fingerprints
//! - `errors`: error taxonomy and pipeline stages

pub mod artifact;
pub mod errors;
pub mod features;
pub mod gbdt;
pub mod prediction;
pub mod record;
pub mod regressor;
pub mod serde_canon;

pub use artifact::{
    ArtifactKeys, ArtifactStore, EvaluationReport, FsArtifactStore, MemoryArtifactStore,
    ModelArtifact,
};
pub use errors::{CongestionError, Result, Stage, StageError, StageExt};
pub use features::{FeatureMatrix, MissingFeaturePolicy, Preprocessor};
pub use prediction::{
    respond, CongestionLevel, ErrorPayload, PredictionPipeline, PredictionResponse,
    PredictionResult,
};
pub use record::{Record, TARGET_COLUMN};
pub use regressor::{Predictor, Regressor};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
