use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::token::TokenId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm25: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm10: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aqi: Option<u16>,
}

impl Measurement {
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..Default::default()
        }
    }
}

/// One acquisition as handed from the station to every feeder and publisher.
#[derive(Debug, Clone)]
pub struct StationData {
    pub version: String,

    pub token_id: TokenId,

    pub uptime: Duration,

    pub last_measurement: Measurement,
}

pub fn round(x: f32, places: i32) -> f32 {
    let pow = 10f64.powi(places);
    ((x as f64 * pow).round() / pow) as f32
}

/// Rounds an optional value, mapping a missing value to zero.
pub fn round_or_zero(x: Option<f32>, places: i32) -> f32 {
    x.map_or(0.0, |v| round(v, places))
}

pub fn format_value(x: Option<f32>) -> String {
    x.map(|v| format!("{v:.1}")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round(1.25, 1), 1.3);
        assert_eq!(round(-1.25, 1), -1.3);
        assert_eq!(round(1013.256, 2), 1013.26);
        assert_eq!(round(7.0, 0), 7.0);
    }

    #[test]
    fn missing_values_round_to_zero() {
        assert_eq!(round_or_zero(None, 1), 0.0);
        assert_eq!(round_or_zero(Some(14.46), 1), 14.5);
    }

    #[test]
    fn serializes_only_present_fields() {
        let m = Measurement {
            temperature: Some(25.0),
            pm25: Some(1.5),
            ..Measurement::at(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
        };

        let json = serde_json::to_value(&m).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"timestamp": 1_700_000_000, "temperature": 25.0, "pm25": 1.5})
        );
    }
}
