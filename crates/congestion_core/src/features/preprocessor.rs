//! Fit/transform composition of feature engineering, categorical encoding
//! and column assembly.
//!
//! The fitted state (vocabulary + recorded column layout) is the only thing
//! shared between a training run and later prediction runs, so it is
//! persisted as a versioned artifact and fingerprinted.

use super::assembler::{Column, FeatureAssembler, MissingFeaturePolicy, NumericFeature};
use super::encoder::{CategoricalEncoder, Encoding, Vocabulary};
use super::engineer::{engineer, EngineeredRecord};
use super::matrix::FeatureMatrix;
use crate::errors::{CongestionError, Result};
use crate::record::{Record, TARGET_COLUMN};
use crate::serde_canon::hash_canonical_hex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Schema tag embedded in every preprocessor artifact
pub const PREPROCESSOR_SCHEMA: &str = "congestion-preprocessor";

/// Current preprocessor artifact version
pub const PREPROCESSOR_VERSION: u32 = 1;

/// Persisted form of a fitted preprocessor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessorState {
    pub schema: String,
    pub version: u32,
    pub vocabulary: Vocabulary,
    pub columns: Vec<Column>,
    pub missing_feature_policy: MissingFeaturePolicy,
}

/// Feature matrix and aligned targets produced by `Preprocessor::fit`
#[derive(Debug, Clone)]
pub struct FitOutput {
    pub features: FeatureMatrix,
    pub targets: Vec<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    policy: MissingFeaturePolicy,
    encoder: CategoricalEncoder,
    assembler: Option<FeatureAssembler>,
}

impl Preprocessor {
    pub fn new(policy: MissingFeaturePolicy) -> Self {
        Self {
            policy,
            encoder: CategoricalEncoder::new(),
            assembler: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.assembler.is_some()
    }

    /// Fit on training records and return their feature matrix and targets.
    ///
    /// Every record needs a parseable timestamp and a `congestion_level`.
    /// State is only committed once every row has been processed.
    pub fn fit(&mut self, records: &[Record]) -> Result<FitOutput> {
        if self.is_fitted() {
            return Err(CongestionError::AlreadyFitted("Preprocessor"));
        }
        if records.is_empty() {
            return Err(CongestionError::EmptyInput(
                "cannot fit Preprocessor on zero records",
            ));
        }

        let mut engineered = Vec::with_capacity(records.len());
        let mut targets = Vec::with_capacity(records.len());
        for (row, record) in records.iter().enumerate() {
            engineered.push(engineer(record).map_err(|e| at_row(e, row))?);
            targets.push(record.congestion_level.ok_or_else(|| {
                CongestionError::MissingColumn {
                    column: TARGET_COLUMN.to_string(),
                    row: Some(row),
                }
            })?);
        }

        let mut encoder = CategoricalEncoder::new();
        let vocabulary = encoder.fit(records.iter().map(|r| r.weather_condition.as_deref()))?;
        let assembler = FeatureAssembler::fit(vocabulary, self.policy);

        let rows = assemble_rows(&encoder, &assembler, &engineered)?;
        let features = FeatureMatrix::new(assembler.column_names(), rows);

        info!(
            rows = features.len(),
            columns = features.width(),
            vocabulary = ?encoder.vocabulary()?.iter().collect::<Vec<_>>(),
            "Fitted preprocessor"
        );

        self.encoder = encoder;
        self.assembler = Some(assembler);

        Ok(FitOutput { features, targets })
    }

    /// Transform records with the frozen state; never mutates it
    pub fn transform(&self, records: &[Record]) -> Result<FeatureMatrix> {
        let assembler = self.assembler()?;
        let engineered = records
            .iter()
            .enumerate()
            .map(|(row, record)| engineer(record).map_err(|e| at_row(e, row)))
            .collect::<Result<Vec<_>>>()?;

        let rows = assemble_rows(&self.encoder, assembler, &engineered)?;
        Ok(FeatureMatrix::new(assembler.column_names(), rows))
    }

    /// Transform a single prediction request
    pub fn transform_one(&self, record: &Record) -> Result<FeatureMatrix> {
        let assembler = self.assembler()?;
        let engineered = engineer(record)?;

        let encoding = self.encoder.encode(record.weather_condition.as_deref())?;
        if encoding == Encoding::Unknown {
            warn!(
                weather_condition = ?record.weather_condition,
                "weather condition not seen during training, encoding as all zeros"
            );
        }

        let row = assembler.assemble(&engineered, encoding)?;
        debug!(?row, "assembled feature vector");
        Ok(FeatureMatrix::new(assembler.column_names(), vec![row]))
    }

    pub fn column_names(&self) -> Result<Vec<String>> {
        Ok(self.assembler()?.column_names())
    }

    pub fn vocabulary(&self) -> Result<&Vocabulary> {
        self.encoder.vocabulary()
    }

    pub fn policy(&self) -> MissingFeaturePolicy {
        self.policy
    }

    /// Frozen state for persistence
    pub fn state(&self) -> Result<PreprocessorState> {
        let assembler = self.assembler()?;
        Ok(PreprocessorState {
            schema: PREPROCESSOR_SCHEMA.to_string(),
            version: PREPROCESSOR_VERSION,
            vocabulary: self.encoder.vocabulary()?.clone(),
            columns: assembler.columns().to_vec(),
            missing_feature_policy: assembler.policy(),
        })
    }

    /// Rebuild a fitted preprocessor, rejecting foreign or stale artifacts
    pub fn from_state(state: PreprocessorState) -> Result<Self> {
        if state.schema != PREPROCESSOR_SCHEMA {
            return Err(CongestionError::Serialization(format!(
                "expected a `{PREPROCESSOR_SCHEMA}` artifact, found `{}`",
                state.schema
            )));
        }
        if state.version != PREPROCESSOR_VERSION {
            return Err(CongestionError::Serialization(format!(
                "unsupported preprocessor version {} (expected {PREPROCESSOR_VERSION})",
                state.version
            )));
        }
        if state.columns.len() < NumericFeature::CANONICAL.len() {
            return Err(CongestionError::Serialization(format!(
                "preprocessor artifact has {} columns, fewer than the {} numeric features",
                state.columns.len(),
                NumericFeature::CANONICAL.len()
            )));
        }

        if let Some(value) = state.vocabulary.first_duplicate() {
            return Err(CongestionError::Serialization(format!(
                "preprocessor vocabulary lists `{value}` more than once"
            )));
        }

        let assembler = FeatureAssembler::from_columns(
            state.columns,
            &state.vocabulary,
            state.missing_feature_policy,
        )?;

        Ok(Self {
            policy: state.missing_feature_policy,
            encoder: CategoricalEncoder::from_vocabulary(state.vocabulary),
            assembler: Some(assembler),
        })
    }

    /// Blake3 hex of the canonical state; pairs a model with its preprocessor
    pub fn fingerprint(&self) -> Result<String> {
        hash_canonical_hex(&self.state()?)
    }

    fn assembler(&self) -> Result<&FeatureAssembler> {
        self.assembler
            .as_ref()
            .ok_or(CongestionError::NotFitted("Preprocessor"))
    }
}

fn assemble_rows(
    encoder: &CategoricalEncoder,
    assembler: &FeatureAssembler,
    engineered: &[EngineeredRecord],
) -> Result<Vec<Vec<f64>>> {
    engineered
        .iter()
        .enumerate()
        .map(|(row, record)| {
            let encoding = encoder.encode(record.record().weather_condition.as_deref())?;
            assembler
                .assemble(record, encoding)
                .map_err(|e| at_row(e, row))
        })
        .collect()
}

fn at_row(err: CongestionError, row: usize) -> CongestionError {
    match err {
        CongestionError::InvalidInput { field, reason } => CongestionError::InvalidInput {
            field,
            reason: format!("row {row}: {reason}"),
        },
        other => other,
    }
}
