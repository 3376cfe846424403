//! Raw observations as read from the historical dataset or a prediction
//! request.

use serde::{Deserialize, Serialize};

/// Name of the regression target column
pub const TARGET_COLUMN: &str = "congestion_level";

/// One observation. Every field is optional so that absence is explicit and
/// handled by policy rather than by implicit coercion; unknown fields in the
/// source mapping are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub weather_condition: Option<String>,
    /// Regression target, training rows only
    #[serde(default)]
    pub congestion_level: Option<f64>,
}

impl Record {
    pub fn from_json(input: &str) -> crate::Result<Self> {
        serde_json::from_str(input)
            .map_err(|e| crate::CongestionError::invalid_input("record", e.to_string()))
    }
}
