mod aircms;
mod luftdaten;
mod openair;
mod throttle;

use std::{fmt, str::FromStr};

use anyhow::{Error, Result, bail};
use serde::Serialize;

pub use aircms::*;
pub use luftdaten::*;
pub use openair::*;
pub use throttle::*;

use crate::{http::Transport, measurement::StationData};

/// Max feeder error length to log without truncating.
const MAX_ERROR_LOG_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeederName {
    All,
    OpenAir,
    Luftdaten,
    AirCms,
}

impl FeederName {
    pub const FEEDERS: [FeederName; 3] =
        [FeederName::OpenAir, FeederName::Luftdaten, FeederName::AirCms];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeederName::All => "all",
            FeederName::OpenAir => "openair",
            FeederName::Luftdaten => "luftdaten",
            FeederName::AirCms => "aircms",
        }
    }

    /// A feeder runs unless it is disabled (by name or `all`) and not re-enabled (by name or `all`).
    pub fn is_selected(&self, enabled: &[FeederName], disabled: &[FeederName]) -> bool {
        let listed = |names: &[FeederName]| names.contains(&FeederName::All) || names.contains(self);
        !listed(disabled) || listed(enabled)
    }
}

impl FromStr for FeederName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(FeederName::All),
            "openair" => Ok(FeederName::OpenAir),
            "luftdaten" => Ok(FeederName::Luftdaten),
            "aircms" => Ok(FeederName::AirCms),
            _ => bail!("unknown feeder: {s} (all, openair, luftdaten, aircms)"),
        }
    }
}

impl fmt::Display for FeederName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[allow(async_fn_in_trait)]
pub trait Feeder {
    /// Relays one station snapshot. Failures are logged, never returned.
    async fn feed(&mut self, data: &StationData);
}

pub enum AnyFeeder<T> {
    OpenAir(OpenAirFeeder<T>),
    Luftdaten(LuftdatenFeeder<T>),
    AirCms(AirCmsFeeder<T>),
}

impl<T: Transport> Feeder for AnyFeeder<T> {
    async fn feed(&mut self, data: &StationData) {
        match self {
            AnyFeeder::OpenAir(f) => f.feed(data).await,
            AnyFeeder::Luftdaten(f) => f.feed(data).await,
            AnyFeeder::AirCms(f) => f.feed(data).await,
        }
    }
}

#[derive(Debug, Serialize)]
struct SensorData<'a> {
    software_version: &'a str,
    #[serde(rename = "sensordatavalues")]
    sensor_data_values: Vec<SensorDataValue>,
}

#[derive(Debug, Serialize)]
struct SensorDataValue {
    value_type: &'static str,
    value: f32,
}

impl SensorDataValue {
    fn new(value_type: &'static str, value: f32) -> Self {
        Self { value_type, value }
    }
}

fn truncated(err: &Error) -> String {
    let message = format!("{err:#}");
    match message.char_indices().nth(MAX_ERROR_LOG_LEN) {
        Some((end, _)) => format!("{}…", &message[..end]),
        None => message,
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn selects_feeders_by_enable_and_disable_lists() {
        use FeederName::*;

        assert!(OpenAir.is_selected(&[], &[]));
        assert!(!OpenAir.is_selected(&[], &[OpenAir]));
        assert!(!Luftdaten.is_selected(&[], &[All]));
        assert!(Luftdaten.is_selected(&[Luftdaten], &[All]));
        assert!(AirCms.is_selected(&[All], &[AirCms]));
        assert!(AirCms.is_selected(&[], &[OpenAir]));
    }

    #[test]
    fn parses_feeder_names() {
        assert_eq!("aircms".parse::<FeederName>().unwrap(), FeederName::AirCms);
        assert!("sensor.community".parse::<FeederName>().is_err());
    }

    #[test]
    fn truncates_long_errors() {
        let short = anyhow!("503: unavailable");
        assert_eq!(truncated(&short), "503: unavailable");

        let long = anyhow!("{}", "é".repeat(300));
        let message = truncated(&long);
        assert_eq!(message.chars().count(), MAX_ERROR_LOG_LEN + 1);
        assert!(message.ends_with('…'));
    }
}
