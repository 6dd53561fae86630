use anyhow::{Error, Result};
use log::{debug, error, info};

use crate::{
    feeder::{
        Feeder, SENSOR_DATA_POST_INTERVAL, SensorData, SensorDataValue, Throttle, truncated,
    },
    http::{Transport, is_forbidden, post_json},
    measurement::{StationData, round_or_zero},
};

// Ref: https://github.com/opendata-stuttgart/meta/wiki/APIs
pub const LUFTDATEN_API_URL: &str = "https://api.luftdaten.info/v1/push-sensor-data/";

const PM_SENSOR_PIN: u8 = 1;
const ENV_SENSOR_PIN: u8 = 11;

/// Feeds Sensor.community (formerly Luftdaten), which accepts one sample per
/// sensor pin and no history.
pub struct LuftdatenFeeder<T> {
    transport: T,
    url: String,
    throttle: Throttle,
}

impl<T: Transport> LuftdatenFeeder<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            url: LUFTDATEN_API_URL.to_owned(),
            throttle: Throttle::new(SENSOR_DATA_POST_INTERVAL),
        }
    }

    async fn post(&self, sensor_id: &str, pin: u8, sensor_data: &SensorData<'_>) -> Result<()> {
        debug!("[Luftdaten] {sensor_id}: posting sensor [{pin}] data to {}", self.url);

        let headers = [("X-Sensor", sensor_id.to_owned()), ("X-Pin", pin.to_string())];
        post_json(&self.transport, &self.url, &headers, sensor_data).await?;

        debug!("[Luftdaten] {sensor_id}: successfully posted sensor [{pin}] data");
        Ok(())
    }
}

fn log_post_error(sensor_id: &str, pin: u8, err: &Error) {
    error!(
        "[Luftdaten] {sensor_id}: sensor [{pin}] data posting failed: {}",
        truncated(err)
    );
}

impl<T: Transport> Feeder for LuftdatenFeeder<T> {
    async fn feed(&mut self, data: &StationData) {
        let num_sensor_id = data.token_id.sensor_id();
        let sensor_id = format!("raspi-{num_sensor_id}");

        if !self.throttle.is_due() {
            debug!("[Luftdaten] {sensor_id}: skip sensor data posting");
            return;
        }
        self.throttle.mark();

        let m = &data.last_measurement;

        let pm_data = SensorData {
            software_version: &data.version,
            sensor_data_values: vec![
                SensorDataValue::new("P1", round_or_zero(m.pm10, 1)),
                SensorDataValue::new("P2", round_or_zero(m.pm25, 1)),
            ],
        };
        if let Err(e) = self.post(&sensor_id, PM_SENSOR_PIN, &pm_data).await {
            log_post_error(&sensor_id, PM_SENSOR_PIN, &e);
            if is_forbidden(&e) {
                info!(
                    "[Luftdaten] please register your station at https://devices.sensor.community/sensors/register \
                     (Sensor ID: {num_sensor_id}, Sensor Board: raspi, Sensor Types: SDS011/BME280)"
                );
                return;
            }
        }

        let env_data = SensorData {
            software_version: &data.version,
            sensor_data_values: vec![
                SensorDataValue::new("temperature", round_or_zero(m.temperature, 1)),
                SensorDataValue::new("humidity", round_or_zero(m.humidity, 1)),
                SensorDataValue::new("pressure", 100.0 * round_or_zero(m.pressure, 2)),
            ],
        };
        if let Err(e) = self.post(&sensor_id, ENV_SENSOR_PIN, &env_data).await {
            log_post_error(&sensor_id, ENV_SENSOR_PIN, &e);
        }
    }
}
