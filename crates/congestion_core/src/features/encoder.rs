//! One-hot encoding of the weather condition column.
//!
//! The vocabulary is frozen at fit time. Values that were never seen during
//! fit encode to an all-zero row; the vocabulary never grows afterwards.

use crate::errors::{CongestionError, Result};
use serde::{Deserialize, Serialize};

/// Ordered set of categorical values, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vocabulary(Vec<String>);

/// Outcome of looking a value up in the vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Known(usize),
    Unknown,
}

impl Vocabulary {
    pub fn lookup(&self, value: Option<&str>) -> Encoding {
        value
            .and_then(|v| self.0.iter().position(|entry| entry == v))
            .map_or(Encoding::Unknown, Encoding::Known)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// First value listed more than once; a fitted vocabulary has none
    pub fn first_duplicate(&self) -> Option<&str> {
        self.0
            .iter()
            .enumerate()
            .find(|(i, value)| self.0[..*i].contains(value))
            .map(|(_, value)| value.as_str())
    }

    fn insert(&mut self, value: &str) {
        if !self.0.iter().any(|entry| entry == value) {
            self.0.push(value.to_string());
        }
    }
}

impl<S: Into<String>> FromIterator<S> for Vocabulary {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut vocabulary = Vocabulary::default();
        for value in iter {
            vocabulary.insert(&value.into());
        }
        vocabulary
    }
}

/// One-hot encoder over a single categorical column
#[derive(Debug, Clone, Default)]
pub struct CategoricalEncoder {
    vocabulary: Option<Vocabulary>,
}

impl CategoricalEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a fitted encoder from a persisted vocabulary
    pub fn from_vocabulary(vocabulary: Vocabulary) -> Self {
        Self {
            vocabulary: Some(vocabulary),
        }
    }

    /// Learn the vocabulary. Absent values are skipped.
    pub fn fit<'a, I>(&mut self, values: I) -> Result<&Vocabulary>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        if self.vocabulary.is_some() {
            return Err(CongestionError::AlreadyFitted("CategoricalEncoder"));
        }

        let mut rows = 0usize;
        let mut vocabulary = Vocabulary::default();
        for value in values {
            rows += 1;
            if let Some(v) = value {
                vocabulary.insert(v);
            }
        }

        if rows == 0 {
            return Err(CongestionError::EmptyInput(
                "cannot fit CategoricalEncoder on zero rows",
            ));
        }

        Ok(&*self.vocabulary.insert(vocabulary))
    }

    pub fn vocabulary(&self) -> Result<&Vocabulary> {
        self.vocabulary
            .as_ref()
            .ok_or(CongestionError::NotFitted("CategoricalEncoder"))
    }

    /// Tagged encoding for a single value
    pub fn encode(&self, value: Option<&str>) -> Result<Encoding> {
        Ok(self.vocabulary()?.lookup(value))
    }

    /// One one-hot row per value; unknown values give all zeros
    pub fn transform<'a, I>(&self, values: I) -> Result<Vec<Vec<f64>>>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let vocabulary = self.vocabulary()?;
        Ok(values
            .into_iter()
            .map(|value| {
                let mut row = vec![0.0; vocabulary.len()];
                if let Encoding::Known(idx) = vocabulary.lookup(value) {
                    row[idx] = 1.0;
                }
                row
            })
            .collect())
    }
}
