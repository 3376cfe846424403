//! Artifact persistence
//!
//! Training writes two blobs, the preprocessor state and the model, and
//! prediction reads them back. Both are canonical JSON. The model artifact
//! carries the fingerprint of the preprocessor it was trained against so a
//! mismatched pair is rejected on load.
//!
//! Stores are single-writer: concurrent training runs sharing the same keys
//! are not supported.

use crate::errors::{CongestionError, Result};
use crate::features::{Preprocessor, PreprocessorState};
use crate::gbdt::Model;
use crate::serde_canon::{from_json_bytes, to_canonical_json};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Schema tag embedded in every model artifact
pub const MODEL_SCHEMA: &str = "congestion-model";

/// Current model artifact version
pub const MODEL_ARTIFACT_VERSION: u32 = 1;

/// Opaque key/value persistence for artifacts
pub trait ArtifactStore {
    fn save(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Fails with `ArtifactNotFound` when nothing is stored under `key`
    fn load(&self, key: &str) -> Result<Vec<u8>>;

    /// Removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// Names under which the two artifacts are stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactKeys {
    pub preprocessor: String,
    pub model: String,
}

impl Default for ArtifactKeys {
    fn default() -> Self {
        Self {
            preprocessor: "preprocessor.json".to_string(),
            model: "model.json".to_string(),
        }
    }
}

/// Held-out evaluation recorded alongside the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub rmse: f64,
    /// `None` when the held-out targets have zero variance
    pub r2: Option<f64>,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Persisted model plus the metadata needed to pair it with a preprocessor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub schema: String,
    pub version: u32,
    pub preprocessor_fingerprint: String,
    pub model_hash: String,
    pub created_at: DateTime<Utc>,
    pub evaluation: Option<EvaluationReport>,
    pub model: Model,
}

impl ModelArtifact {
    pub fn new(
        model: Model,
        preprocessor: &Preprocessor,
        evaluation: Option<EvaluationReport>,
    ) -> Result<Self> {
        Ok(Self {
            schema: MODEL_SCHEMA.to_string(),
            version: MODEL_ARTIFACT_VERSION,
            preprocessor_fingerprint: preprocessor.fingerprint()?,
            model_hash: model.hash_hex()?,
            created_at: Utc::now(),
            evaluation,
            model,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.schema != MODEL_SCHEMA {
            return Err(CongestionError::Serialization(format!(
                "expected a `{MODEL_SCHEMA}` artifact, found `{}`",
                self.schema
            )));
        }
        if self.version != MODEL_ARTIFACT_VERSION {
            return Err(CongestionError::Serialization(format!(
                "unsupported model artifact version {} (expected {MODEL_ARTIFACT_VERSION})",
                self.version
            )));
        }
        self.model.validate()?;

        let hash = self.model.hash_hex()?;
        if hash != self.model_hash {
            return Err(CongestionError::Serialization(format!(
                "model hash mismatch: recorded {}, computed {hash}",
                self.model_hash
            )));
        }
        Ok(())
    }

    /// Check that this model was trained on features from `preprocessor`
    pub fn check_pairing(&self, preprocessor: &Preprocessor) -> Result<()> {
        let fingerprint = preprocessor.fingerprint()?;
        if fingerprint != self.preprocessor_fingerprint {
            return Err(CongestionError::Serialization(format!(
                "model was trained with preprocessor {} but the stored one is {fingerprint}",
                self.preprocessor_fingerprint
            )));
        }

        let width = preprocessor.column_names()?.len();
        if width != self.model.feature_count {
            return Err(CongestionError::Serialization(format!(
                "model expects {} features, preprocessor produces {width}",
                self.model.feature_count
            )));
        }
        Ok(())
    }
}

pub fn encode_preprocessor(preprocessor: &Preprocessor) -> Result<Vec<u8>> {
    Ok(to_canonical_json(&preprocessor.state()?)?.into_bytes())
}

pub fn encode_model(artifact: &ModelArtifact) -> Result<Vec<u8>> {
    Ok(to_canonical_json(artifact)?.into_bytes())
}

pub fn load_preprocessor(store: &dyn ArtifactStore, key: &str) -> Result<Preprocessor> {
    let bytes = store.load(key)?;
    let state: PreprocessorState = from_json_bytes(&bytes, "preprocessor")?;
    Preprocessor::from_state(state)
}

pub fn load_model(store: &dyn ArtifactStore, key: &str) -> Result<ModelArtifact> {
    let bytes = store.load(key)?;
    let artifact: ModelArtifact = from_json_bytes(&bytes, "model")?;
    artifact.validate()?;
    Ok(artifact)
}

/// Artifacts as files in one directory
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        let plain = !key.is_empty()
            && !key.starts_with('.')
            && !key.contains(['/', '\\'])
            && Path::new(key).file_name().is_some();
        if !plain {
            return Err(CongestionError::invalid_input(
                "artifact key",
                format!("`{key}` is not a plain file name"),
            ));
        }
        Ok(self.root.join(key))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root)?;

        // readers never observe a half-written artifact
        let tmp = self.root.join(format!(".{key}.tmp"));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;

        debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CongestionError::ArtifactNotFound {
                key: path.display().to_string(),
            },
            _ => CongestionError::Io(e),
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)?) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Process-local store, mainly for tests
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.blobs.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.blobs.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| CongestionError::ArtifactNotFound {
                key: key.to_string(),
            })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.blobs.write().remove(key);
        Ok(())
    }
}
