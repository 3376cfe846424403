//! Deterministic synthetic traffic data
//!
//! Congestion rises linearly with the hour of day, shifted by a small
//! per-weather offset and bounded noise, so a trained model has a known
//! relationship to recover.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use congestion_core::Record;

use crate::deterministic::LcgRng;

/// Weather conditions drawn for synthetic rows
pub const WEATHER_CONDITIONS: [&str; 3] = ["Clear", "Clouds", "Rain"];

/// Congestion at midnight in clear weather
const BASE: f64 = 0.05;

/// Congestion added per hour of day
const PER_HOUR: f64 = 0.035;

/// Half-width of the uniform noise term
const NOISE: f64 = 0.02;

/// Noise-free congestion for an hour and weather condition
pub fn expected_congestion(hour: u32, weather: &str) -> f64 {
    let weather_offset = match weather {
        "Rain" => 0.05,
        "Clouds" => 0.02,
        _ => 0.0,
    };
    BASE + PER_HOUR * f64::from(hour) + weather_offset
}

/// `rows` observations spread over 2024, identical for identical seeds
pub fn generate(rows: usize, seed: u64) -> Vec<Record> {
    let mut rng = LcgRng::new(seed);
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN);

    (0..rows)
        .map(|_| {
            let minutes = rng.next_range(366 * 24 * 60) as i64;
            let timestamp = start + Duration::minutes(minutes);
            let hour = (minutes / 60 % 24) as u32;
            let weather = WEATHER_CONDITIONS[rng.next_range(WEATHER_CONDITIONS.len())];
            let noise = (rng.next_unit() * 2.0 - 1.0) * NOISE;

            Record {
                timestamp: Some(timestamp.format("%Y-%m-%dT%H:%M:%S").to_string()),
                lat: Some(round3(40.70 + rng.next_unit() * 0.1)),
                lng: Some(round3(-74.02 + rng.next_unit() * 0.1)),
                temperature: Some(round3(-5.0 + rng.next_unit() * 35.0)),
                humidity: Some(round3(30.0 + rng.next_unit() * 60.0)),
                weather_condition: Some(weather.to_string()),
                congestion_level: Some(round3(expected_congestion(hour, weather) + noise)),
            }
        })
        .collect()
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
