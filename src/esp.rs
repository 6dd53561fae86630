//! ESP Easy `/json` status document, as served by the network board and
//! re-served by the local publisher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::measurement::{Measurement, StationData, round};

pub const ENVIRONMENT_TASK: &str = "BME280";

pub const PARTICULATE_TASK: &str = "SDS011";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EspData {
    #[serde(rename = "System")]
    pub system: EspSystem,

    #[serde(rename = "WiFi")]
    pub wifi: EspWifi,

    #[serde(rename = "Sensors")]
    pub sensors: Vec<EspSensor>,

    #[serde(rename = "TTL")]
    pub ttl: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EspSystem {
    #[serde(rename = "Build")]
    pub build: u32,

    #[serde(rename = "Git Build")]
    pub git_build: String,

    #[serde(rename = "Local time")]
    pub local_time: String,

    #[serde(rename = "Unit")]
    pub unit: u32,

    #[serde(rename = "Name")]
    pub name: String,

    /// Minutes since boot.
    #[serde(rename = "Uptime")]
    pub uptime: u64,

    #[serde(rename = "Last boot cause")]
    pub last_boot_cause: String,

    #[serde(rename = "Reset Reason")]
    pub reset_reason: String,

    #[serde(rename = "Free RAM")]
    pub free_ram: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EspWifi {
    #[serde(rename = "Hostname")]
    pub hostname: String,

    #[serde(rename = "IP")]
    pub ip: String,

    // firmware mega-20190301
    #[serde(rename = "MAC address", skip_serializing_if = "String::is_empty")]
    pub mac_address: String,

    // firmware mega-20190903 and later
    #[serde(rename = "STA MAC", skip_serializing_if = "String::is_empty")]
    pub sta_mac: String,

    #[serde(rename = "SSID")]
    pub ssid: String,

    #[serde(rename = "RSSI")]
    pub rssi: i32,
}

impl EspWifi {
    pub fn mac_address(&self) -> &str {
        if self.mac_address.is_empty() {
            &self.sta_mac
        } else {
            &self.mac_address
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EspSensor {
    #[serde(rename = "TaskValues")]
    pub task_values: Vec<EspTaskValue>,

    #[serde(rename = "DataAcquisition")]
    pub data_acquisition: Vec<EspDataAcquisition>,

    #[serde(rename = "TaskInterval")]
    pub task_interval: u32,

    #[serde(rename = "Type")]
    pub sensor_type: String,

    #[serde(rename = "TaskName")]
    pub task_name: String,

    #[serde(rename = "TaskEnabled", with = "bool_string")]
    pub task_enabled: bool,

    #[serde(rename = "TaskNumber")]
    pub task_number: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EspTaskValue {
    #[serde(rename = "ValueNumber")]
    pub value_number: u32,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "NrDecimals")]
    pub nr_decimals: u32,

    #[serde(rename = "Value")]
    pub value: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EspDataAcquisition {
    #[serde(rename = "Controller")]
    pub controller: u32,

    #[serde(rename = "IDX")]
    pub idx: u32,

    #[serde(rename = "Enabled", with = "bool_string")]
    pub enabled: bool,
}

/// Reply of the `/control?cmd=GPIO,<pin>,<state>` command.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EspGpioControlResponse {
    pub log: String,
    pub plugin: u32,
    pub pin: u32,
    pub mode: String,
    pub state: u8,
}

impl EspData {
    pub fn measurement(&self, timestamp: DateTime<Utc>) -> Measurement {
        let mut m = Measurement::at(timestamp);

        for sensor in self.sensors.iter().filter(|s| s.task_enabled) {
            for v in &sensor.task_values {
                let field = match (sensor.task_name.as_str(), v.name.as_str()) {
                    (ENVIRONMENT_TASK, "Temperature") => &mut m.temperature,
                    (ENVIRONMENT_TASK, "Humidity") => &mut m.humidity,
                    (ENVIRONMENT_TASK, "Pressure") => &mut m.pressure,
                    (PARTICULATE_TASK, "PM2.5") => &mut m.pm25,
                    (PARTICULATE_TASK, "PM10") => &mut m.pm10,
                    _ => continue,
                };
                *field = Some(v.value);
            }
        }

        m
    }

    pub fn from_station_data(data: &StationData) -> Self {
        let m = &data.last_measurement;
        let mut sensors = Vec::new();

        let environment = task_values(&[
            ("Temperature", m.temperature),
            ("Humidity", m.humidity),
            ("Pressure", m.pressure),
        ]);
        if !environment.is_empty() {
            sensors.push(EspSensor::new(
                1,
                ENVIRONMENT_TASK,
                "Environment - BMx280",
                environment,
            ));
        }

        let particulate = task_values(&[("PM2.5", m.pm25), ("PM10", m.pm10)]);
        if !particulate.is_empty() {
            sensors.push(EspSensor::new(
                2,
                PARTICULATE_TASK,
                "Dust - SDS011/018/198",
                particulate,
            ));
        }

        Self {
            system: EspSystem {
                git_build: data.version.clone(),
                local_time: m
                    .timestamp
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default(),
                uptime: data.uptime.as_secs() / 60,
                ..Default::default()
            },
            wifi: EspWifi::default(),
            sensors,
            ttl: 60000,
        }
    }
}

impl EspSensor {
    fn new(
        task_number: u32,
        task_name: &str,
        sensor_type: &str,
        task_values: Vec<EspTaskValue>,
    ) -> Self {
        Self {
            task_values,
            data_acquisition: Vec::new(),
            task_interval: 60,
            sensor_type: sensor_type.to_owned(),
            task_name: task_name.to_owned(),
            task_enabled: true,
            task_number,
        }
    }
}

fn task_values(values: &[(&str, Option<f32>)]) -> Vec<EspTaskValue> {
    values
        .iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .enumerate()
        .map(|(i, (name, value))| EspTaskValue {
            value_number: i as u32 + 1,
            name: name.to_string(),
            nr_decimals: 2,
            value: round(value, 2),
        })
        .collect()
}

/// ESP Easy encodes booleans as `"true"` / `"false"` strings.
mod bool_string {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "true" } else { "false" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match BoolOrString::deserialize(deserializer)? {
            BoolOrString::Bool(b) => Ok(b),
            BoolOrString::String(s) => s
                .parse()
                .map_err(|_| D::Error::custom(format!("invalid boolean string: {s}"))),
        }
    }
}
