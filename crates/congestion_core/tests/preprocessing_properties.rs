//! Preprocessor contract tests
//!
//! The fitted column layout must survive any input: unseen categories,
//! missing numeric fields, arbitrary field order.

use anyhow::Result;
use congestion_core::features::{MissingFeaturePolicy, Preprocessor};
use congestion_core::Record;
use proptest::prelude::*;

fn training_record(ts: &str, weather: &str, congestion: f64) -> Record {
    Record {
        timestamp: Some(ts.to_string()),
        lat: Some(51.5072),
        lng: Some(-0.1276),
        temperature: Some(9.5),
        humidity: Some(77.0),
        weather_condition: Some(weather.to_string()),
        congestion_level: Some(congestion),
    }
}

fn fitted(weathers: &[&str]) -> Result<(Preprocessor, Vec<String>)> {
    let records: Vec<Record> = weathers
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let ts = format!("2024-06-{:02}T{:02}:00:00", i + 1, i * 3 % 24);
            training_record(&ts, w, 0.3)
        })
        .collect();
    let mut preprocessor = Preprocessor::new(MissingFeaturePolicy::ZeroFill);
    let output = preprocessor.fit(&records)?;
    Ok((preprocessor, output.features.columns().to_vec()))
}

#[test]
fn unseen_category_encodes_to_zeros() -> Result<()> {
    let (preprocessor, columns) = fitted(&["Rain", "Clear"])?;
    let snow = Record::from_json(concat!(
        r#"{"timestamp":"2024-12-02T09:00:00","lat":1.0,"lng":2.0,"#,
        r#""temperature":-3.0,"humidity":90.0,"weather_condition":"Snow"}"#,
    ))?;

    let matrix = preprocessor.transform_one(&snow)?;
    assert_eq!(matrix.columns(), columns.as_slice());

    let row = &matrix.rows()[0];
    let one_hot: Vec<f64> = columns
        .iter()
        .zip(row)
        .filter(|(name, _)| name.starts_with("weather_condition_"))
        .map(|(_, v)| *v)
        .collect();
    assert_eq!(one_hot, vec![0.0, 0.0]);
    Ok(())
}

#[test]
fn missing_humidity_is_zero_filled() -> Result<()> {
    let (preprocessor, columns) = fitted(&["Rain", "Clear", "Clouds"])?;
    let record = Record::from_json(concat!(
        r#"{"timestamp":"2024-12-02T09:00:00","lat":1.0,"lng":2.0,"#,
        r#""temperature":12.0,"weather_condition":"Clouds"}"#,
    ))?;

    let matrix = preprocessor.transform_one(&record)?;
    let humidity = columns.iter().position(|c| c == "humidity").expect("humidity column");
    assert_eq!(matrix.rows()[0][humidity], 0.0);
    assert_eq!(matrix.width(), columns.len());
    Ok(())
}

#[test]
fn repeated_transforms_are_identical() -> Result<()> {
    let (preprocessor, _) = fitted(&["Rain", "Clear", "Clouds"])?;
    let record = training_record("2024-08-15 16:45:00", "Clear", 0.0);

    let first = preprocessor.transform_one(&record)?;
    for _ in 0..25 {
        assert_eq!(preprocessor.transform_one(&record)?, first);
    }
    Ok(())
}

fn timestamp() -> impl Strategy<Value = String> {
    (
        2020u32..2026,
        1u32..=12,
        1u32..=28,
        0u32..24,
        0u32..60,
        prop_oneof![Just('T'), Just(' ')],
    )
        .prop_map(|(y, mo, d, h, mi, sep)| format!("{y:04}-{mo:02}-{d:02}{sep}{h:02}:{mi:02}:00"))
}

/// A JSON record whose fields appear in a random order, with numeric fields
/// sometimes absent and the weather drawn from a wider set than training saw
fn shuffled_json_record() -> impl Strategy<Value = String> {
    (
        timestamp(),
        prop::option::of(-90.0f64..90.0),
        prop::option::of(-180.0f64..180.0),
        prop::option::of(-30.0f64..45.0),
        prop::option::of(0.0f64..100.0),
        prop::option::of(prop::sample::select(vec!["Rain", "Clear", "Clouds", "Snow", "Fog"])),
    )
        .prop_flat_map(|(ts, lat, lng, temperature, humidity, weather)| {
            let mut fields = vec![format!(r#""timestamp":"{ts}""#)];
            let numeric = [
                ("lat", lat),
                ("lng", lng),
                ("temperature", temperature),
                ("humidity", humidity),
            ];
            for (name, value) in numeric {
                if let Some(v) = value {
                    fields.push(format!(r#""{name}":{v}"#));
                }
            }
            if let Some(w) = weather {
                fields.push(format!(r#""weather_condition":"{w}""#));
            }
            Just(fields).prop_shuffle()
        })
        .prop_map(|fields| format!("{{{}}}", fields.join(",")))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn column_layout_is_stable(json in shuffled_json_record()) {
        let (preprocessor, columns) = fitted(&["Rain", "Clear", "Clouds"]).unwrap();
        let record = Record::from_json(&json).unwrap();

        let matrix = preprocessor.transform_one(&record).unwrap();
        prop_assert_eq!(matrix.columns(), columns.as_slice());
        prop_assert_eq!(matrix.rows()[0].len(), columns.len());

        let hot: f64 = matrix.rows()[0][8..].iter().sum();
        prop_assert!(hot == 0.0 || hot == 1.0);

        prop_assert_eq!(preprocessor.transform_one(&record).unwrap(), matrix);
    }
}
