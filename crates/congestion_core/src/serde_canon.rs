//! Canonical JSON serialization for artifact fingerprints
//!
//! Artifacts are written with recursively sorted object keys and no
//! whitespace, so the same state always yields the same bytes and the same
//! Blake3 fingerprint.

use crate::errors::{CongestionError, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Serialize a value to canonical JSON (sorted keys, no whitespace)
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let json_value = serde_json::to_value(value)?;
    let canonical = canonicalize_value(&json_value);
    Ok(serde_json::to_string(&canonical)?)
}

fn canonicalize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut btree = BTreeMap::new();
            for (k, v) in map {
                btree.insert(k.clone(), canonicalize_value(v));
            }
            Value::Object(btree.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.iter().map(canonicalize_value).collect()),
        other => other.clone(),
    }
}

/// Blake3 hex digest of the canonical JSON representation
pub fn hash_canonical_hex<T: Serialize>(value: &T) -> Result<String> {
    let json = to_canonical_json(value)?;
    Ok(hex::encode(blake3::hash(json.as_bytes()).as_bytes()))
}

/// Deserialize an artifact body, mapping parse failures to `Serialization`
pub fn from_json_bytes<T: serde::de::DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| CongestionError::Serialization(format!("corrupt {what} artifact: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Columns {
        vocabulary: Vec<String>,
        columns: Vec<String>,
        version: u32,
    }

    fn sample() -> Columns {
        Columns {
            vocabulary: vec!["Rain".into(), "Clear".into()],
            columns: vec!["lat".into(), "weather_condition_Rain".into()],
            version: 1,
        }
    }

    #[test]
    fn keys_are_sorted_and_compact() {
        let json = to_canonical_json(&sample()).unwrap();
        assert!(!json.contains('\n'));
        assert!(!json.contains(": "));

        let columns = json.find("columns").unwrap();
        let version = json.find("version").unwrap();
        let vocabulary = json.find("vocabulary").unwrap();
        assert!(columns < version && version < vocabulary);
    }

    #[test]
    fn array_order_is_preserved() {
        let json = to_canonical_json(&sample()).unwrap();
        assert!(json.contains(r#"["Rain","Clear"]"#));
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = hash_canonical_hex(&sample()).unwrap();
        assert_eq!(a, hash_canonical_hex(&sample()).unwrap());
        assert_eq!(a.len(), 64);

        let mut changed = sample();
        changed.vocabulary.reverse();
        assert_ne!(a, hash_canonical_hex(&changed).unwrap());
    }

    #[test]
    fn corrupt_bytes_become_serialization_errors() {
        let err = from_json_bytes::<serde_json::Value>(b"{not json", "model").unwrap_err();
        assert_eq!(err.kind(), "serialization_error");
        assert!(err.to_string().contains("corrupt model artifact"));
    }
}
