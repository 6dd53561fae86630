use std::{collections::VecDeque, time::Duration};

use anyhow::Context as _;
use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::{
    feeder::{Feeder, truncated},
    http::{Transport, post_json},
    measurement::{Measurement, StationData},
};

pub const OPENAIR_API_URL: &str = "https://api.openair.city/v1/feeder";

const STATUS_OK: i32 = 0;

#[derive(Debug, Serialize)]
struct FeederData<'a> {
    token_id: &'a str,
    version: &'a str,
    measurements: &'a VecDeque<Measurement>,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    status: i32,
    #[serde(default)]
    message: String,
}

/// Feeds the OpenAir API. Unacknowledged measurements are re-sent on every
/// tick until they age out of the keep window.
pub struct OpenAirFeeder<T> {
    transport: T,
    url: String,
    keep_duration: TimeDelta,
    measurements: VecDeque<Measurement>,
}

impl<T: Transport> OpenAirFeeder<T> {
    pub fn new(transport: T, url: String, keep_duration: Duration) -> Self {
        Self {
            transport,
            url,
            keep_duration: TimeDelta::from_std(keep_duration).unwrap_or(TimeDelta::MAX),
            measurements: VecDeque::new(),
        }
    }

    fn evict_expired(&mut self, now: DateTime<Utc>) {
        while let Some(oldest) = self.measurements.front() {
            if let Some(t) = oldest.timestamp
                && now - t < self.keep_duration
            {
                break;
            }
            self.measurements.pop_front();
        }
    }

    async fn post(&self, data: &StationData) -> anyhow::Result<ApiResult> {
        let body = FeederData {
            token_id: data.token_id.as_str(),
            version: &data.version,
            measurements: &self.measurements,
        };

        let response = post_json(&self.transport, &self.url, &[], &body).await?;
        serde_json::from_slice(&response).context("failed to decode OpenAir API result")
    }
}

impl<T: Transport> Feeder for OpenAirFeeder<T> {
    async fn feed(&mut self, data: &StationData) {
        self.evict_expired(Utc::now());
        self.measurements.push_back(data.last_measurement.clone());

        let count = self.measurements.len();
        debug!("[OpenAir] posting {count} measurement(s) to {}", self.url);

        match self.post(data).await {
            Err(e) => {
                error!("[OpenAir] data posting failed: {}", truncated(&e));
            }
            Ok(r) if r.status != STATUS_OK => {
                error!("[OpenAir] data posting error: {}: {}", r.status, r.message);
            }
            Ok(_) => {
                debug!("[OpenAir] successfully posted {count} measurement(s) to {}", self.url);
                self.measurements.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    const OK: &str = r#"{"status":0}"#;
    const REJECTED: &str = r#"{"status":2,"message":"invalid token"}"#;

    fn feeder(transport: &MockTransport, keep: Duration) -> OpenAirFeeder<MockTransport> {
        OpenAirFeeder::new(transport.clone(), OPENAIR_API_URL.to_owned(), keep)
    }

    fn station_data(timestamp: DateTime<Utc>, pm25: f32) -> StationData {
        StationData {
            version: "esp-0.1.0".to_owned(),
            token_id: "0123456789abcdef0123456789abcdef01234567".parse().unwrap(),
            uptime: Duration::from_secs(600),
            last_measurement: Measurement {
                pm25: Some(pm25),
                ..Measurement::at(timestamp)
            },
        }
    }

    fn payload_sizes(transport: &MockTransport) -> Vec<usize> {
        transport
            .json_bodies()
            .iter()
            .map(|b| b["measurements"].as_array().unwrap().len())
            .collect()
    }

    #[tokio::test]
    async fn acknowledged_posts_clear_the_buffer() {
        let transport = MockTransport::new();
        transport.set_fallback(200, OK);
        let mut feeder = feeder(&transport, Duration::from_secs(3600));

        for i in 0..3 {
            feeder.feed(&station_data(Utc::now(), i as f32)).await;
        }

        assert_eq!(payload_sizes(&transport), vec![1, 1, 1]);
        assert!(feeder.measurements.is_empty());
        let body = &transport.json_bodies()[0];
        assert_eq!(body["token_id"], "0123456789abcdef0123456789abcdef01234567");
        assert_eq!(body["version"], "esp-0.1.0");
    }

    #[tokio::test]
    async fn unacknowledged_measurements_accumulate_until_success() {
        let transport = MockTransport::new();
        transport.push_response(200, REJECTED);
        transport.push_error("connection reset");
        transport.push_response(502, "bad gateway");
        transport.push_response(200, REJECTED);
        transport.push_response(200, OK);
        let mut feeder = feeder(&transport, Duration::from_secs(3600));

        for i in 0..5 {
            feeder.feed(&station_data(Utc::now(), i as f32)).await;
            if i < 4 {
                assert_eq!(feeder.measurements.len(), i + 1);
            }
        }

        assert_eq!(payload_sizes(&transport), vec![1, 2, 3, 4, 5]);
        assert!(feeder.measurements.is_empty());
        let last = &transport.json_bodies()[4];
        let pm25: Vec<f64> = last["measurements"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["pm25"].as_f64().unwrap())
            .collect();
        assert_eq!(pm25, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn expired_measurements_are_dropped_before_posting() {
        let transport = MockTransport::new();
        transport.set_fallback(500, "down");
        let mut feeder = feeder(&transport, Duration::from_secs(3600));
        let now = Utc::now();
        feeder.measurements.push_back(station_data(now - TimeDelta::hours(2), 1.0).last_measurement);
        feeder.measurements.push_back(Measurement::default());
        feeder.measurements.push_back(station_data(now - TimeDelta::minutes(30), 2.0).last_measurement);

        feeder.feed(&station_data(now, 3.0)).await;

        let body = &transport.json_bodies()[0];
        let pm25: Vec<f64> = body["measurements"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["pm25"].as_f64().unwrap())
            .collect();
        assert_eq!(pm25, vec![2.0, 3.0]);
        assert_eq!(feeder.measurements.len(), 2);
    }
}
