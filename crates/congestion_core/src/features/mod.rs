//! Raw records to fixed-width feature vectors
//!
//! - `engineer`: calendar features from the timestamp
//! - `encoder`: one-hot encoding with a frozen vocabulary
//! - `assembler`: recorded column order and missing-feature policy
//! - `preprocessor`: the fit/transform composition that gets persisted

pub mod assembler;
pub mod encoder;
pub mod engineer;
mod matrix;
pub mod preprocessor;

pub use assembler::{Column, ColumnSource, FeatureAssembler, MissingFeaturePolicy, NumericFeature};
pub use encoder::{CategoricalEncoder, Encoding, Vocabulary};
pub use engineer::{engineer, parse_timestamp, EngineeredRecord};
pub use matrix::FeatureMatrix;
pub use preprocessor::{
    FitOutput, Preprocessor, PreprocessorState, PREPROCESSOR_SCHEMA, PREPROCESSOR_VERSION,
};
