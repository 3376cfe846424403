//! Final feature-vector layout.
//!
//! The assembler records the column order once, at fit time, and every later
//! row is built by walking that recorded order.

use super::encoder::{Encoding, Vocabulary};
use super::engineer::EngineeredRecord;
use crate::errors::{CongestionError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Prefix of the one-hot column names
pub const CATEGORY_PREFIX: &str = "weather_condition_";

/// Numeric inputs, in canonical column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericFeature {
    Lat,
    Lng,
    HourOfDay,
    DayOfWeek,
    Month,
    IsWeekday,
    Temperature,
    Humidity,
}

impl NumericFeature {
    pub const CANONICAL: [NumericFeature; 8] = [
        NumericFeature::Lat,
        NumericFeature::Lng,
        NumericFeature::HourOfDay,
        NumericFeature::DayOfWeek,
        NumericFeature::Month,
        NumericFeature::IsWeekday,
        NumericFeature::Temperature,
        NumericFeature::Humidity,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NumericFeature::Lat => "lat",
            NumericFeature::Lng => "lng",
            NumericFeature::HourOfDay => "hour_of_day",
            NumericFeature::DayOfWeek => "day_of_week",
            NumericFeature::Month => "month",
            NumericFeature::IsWeekday => "is_weekday",
            NumericFeature::Temperature => "temperature",
            NumericFeature::Humidity => "humidity",
        }
    }

    /// Value for this feature, `None` when the raw field is absent.
    /// Calendar features always exist once a record is engineered.
    fn value(&self, record: &EngineeredRecord) -> Option<f64> {
        let raw = record.record();
        match self {
            NumericFeature::Lat => raw.lat,
            NumericFeature::Lng => raw.lng,
            NumericFeature::HourOfDay => Some(f64::from(record.hour_of_day())),
            NumericFeature::DayOfWeek => Some(f64::from(record.day_of_week())),
            NumericFeature::Month => Some(f64::from(record.month())),
            NumericFeature::IsWeekday => Some(f64::from(record.is_weekday())),
            NumericFeature::Temperature => raw.temperature,
            NumericFeature::Humidity => raw.humidity,
        }
    }
}

/// What to do when a numeric field is absent from an input record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFeaturePolicy {
    /// Substitute 0. Lenient, and can silently yield a plausible but wrong
    /// prediction.
    #[default]
    ZeroFill,
    /// Fail with `InvalidInput`
    Reject,
}

/// Where a column's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "of")]
pub enum ColumnSource {
    Numeric(NumericFeature),
    Category(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub source: ColumnSource,
}

/// Recorded column layout plus the missing-feature policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureAssembler {
    columns: Vec<Column>,
    policy: MissingFeaturePolicy,
}

impl FeatureAssembler {
    /// Record the column order for a fitted vocabulary
    pub fn fit(vocabulary: &Vocabulary, policy: MissingFeaturePolicy) -> Self {
        let numeric = NumericFeature::CANONICAL.iter().map(|feature| Column {
            name: feature.name().to_string(),
            source: ColumnSource::Numeric(*feature),
        });
        let categories = vocabulary.iter().enumerate().map(|(idx, value)| Column {
            name: format!("{CATEGORY_PREFIX}{value}"),
            source: ColumnSource::Category(idx),
        });

        Self {
            columns: numeric.chain(categories).collect(),
            policy,
        }
    }

    /// Rebuild from a persisted layout, checking it against the vocabulary
    pub fn from_columns(
        columns: Vec<Column>,
        vocabulary: &Vocabulary,
        policy: MissingFeaturePolicy,
    ) -> Result<Self> {
        let expected = Self::fit(vocabulary, policy);
        if expected.columns != columns {
            return Err(CongestionError::Serialization(format!(
                "column layout does not match vocabulary: expected {} columns {:?}, found {}",
                expected.columns.len(),
                expected.column_names(),
                columns.len()
            )));
        }
        Ok(expected)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn policy(&self) -> MissingFeaturePolicy {
        self.policy
    }

    /// Build one row in the recorded column order
    pub fn assemble(&self, record: &EngineeredRecord, encoding: Encoding) -> Result<Vec<f64>> {
        self.columns
            .iter()
            .map(|column| match column.source {
                ColumnSource::Numeric(feature) => match (feature.value(record), self.policy) {
                    (Some(value), _) => Ok(value),
                    (None, MissingFeaturePolicy::ZeroFill) => {
                        warn!(feature = feature.name(), "numeric feature missing, substituting 0");
                        Ok(0.0)
                    }
                    (None, MissingFeaturePolicy::Reject) => Err(CongestionError::invalid_input(
                        feature.name(),
                        "required numeric field is missing",
                    )),
                },
                ColumnSource::Category(idx) => Ok(if encoding == Encoding::Known(idx) {
                    1.0
                } else {
                    0.0
                }),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::engineer::engineer;
    use crate::record::Record;

    fn vocabulary() -> Vocabulary {
        ["Rain", "Clear"].into_iter().collect()
    }

    fn record() -> EngineeredRecord {
        engineer(&Record {
            timestamp: Some("2024-03-09T17:30:00".into()),
            lat: Some(40.75),
            lng: Some(-73.99),
            temperature: Some(12.5),
            humidity: Some(81.0),
            weather_condition: Some("Clear".into()),
            congestion_level: None,
        })
        .unwrap()
    }

    #[test]
    fn test_column_order() {
        let assembler = FeatureAssembler::fit(&vocabulary(), MissingFeaturePolicy::ZeroFill);
        assert_eq!(
            assembler.column_names(),
            [
                "lat",
                "lng",
                "hour_of_day",
                "day_of_week",
                "month",
                "is_weekday",
                "temperature",
                "humidity",
                "weather_condition_Rain",
                "weather_condition_Clear",
            ]
        );
    }

    #[test]
    fn test_assemble_row() {
        let assembler = FeatureAssembler::fit(&vocabulary(), MissingFeaturePolicy::ZeroFill);
        let row = assembler.assemble(&record(), Encoding::Known(1)).unwrap();
        // 2024-03-09 is a Saturday
        assert_eq!(
            row,
            vec![40.75, -73.99, 17.0, 5.0, 3.0, 0.0, 12.5, 81.0, 0.0, 1.0]
        );
    }

    #[test]
    fn test_unknown_category_width_is_stable() {
        let assembler = FeatureAssembler::fit(&vocabulary(), MissingFeaturePolicy::ZeroFill);
        let row = assembler.assemble(&record(), Encoding::Unknown).unwrap();
        assert_eq!(row.len(), assembler.width());
        assert_eq!(&row[8..], &[0.0, 0.0]);
    }

    #[test]
    fn test_missing_numeric_policies() {
        let mut raw = record().record().clone();
        raw.humidity = None;
        let engineered = engineer(&raw).unwrap();

        let lenient = FeatureAssembler::fit(&vocabulary(), MissingFeaturePolicy::ZeroFill);
        let row = lenient.assemble(&engineered, Encoding::Unknown).unwrap();
        assert_eq!(row[7], 0.0);

        let strict = FeatureAssembler::fit(&vocabulary(), MissingFeaturePolicy::Reject);
        let err = strict.assemble(&engineered, Encoding::Unknown).unwrap_err();
        assert!(matches!(
            err,
            CongestionError::InvalidInput { ref field, .. } if field == "humidity"
        ));
    }

    #[test]
    fn test_from_columns_rejects_drift() {
        let assembler = FeatureAssembler::fit(&vocabulary(), MissingFeaturePolicy::ZeroFill);

        let restored = FeatureAssembler::from_columns(
            assembler.columns().to_vec(),
            &vocabulary(),
            MissingFeaturePolicy::ZeroFill,
        )
        .unwrap();
        assert_eq!(restored, assembler);

        let mut swapped = assembler.columns().to_vec();
        swapped.swap(0, 1);
        let err = FeatureAssembler::from_columns(
            swapped,
            &vocabulary(),
            MissingFeaturePolicy::ZeroFill,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "serialization_error");
    }
}
