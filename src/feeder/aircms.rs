use chrono::Utc;
use log::{debug, error, info};

use crate::{
    feeder::{
        Feeder, SENSOR_DATA_POST_INTERVAL, SensorData, SensorDataValue, Throttle, truncated,
    },
    http::{CONTENT_TYPE_FORM, Transport, is_forbidden, post_data},
    measurement::{StationData, round_or_zero},
    token::sha1_hex,
};

// Ref: https://github.com/zakarlyukin/aircms/blob/master/docs/index.rst
pub const AIRCMS_API_URL: &str = "http://doiot.ru/php/sensors.php";

/// Feeds AirCMS. Requests are signed with a key derived from the station token.
pub struct AirCmsFeeder<T> {
    transport: T,
    url: String,
    throttle: Throttle,
}

impl<T: Transport> AirCmsFeeder<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            url: AIRCMS_API_URL.to_owned(),
            throttle: Throttle::new(SENSOR_DATA_POST_INTERVAL),
        }
    }
}

/// `SHA1(SHA1(key) + SHA1(body + key))`, each digest hex-encoded.
pub fn sign(body: &str, key: &str) -> String {
    sha1_hex(&format!("{}{}", sha1_hex(key), sha1_hex(&format!("{body}{key}"))))
}

impl<T: Transport> Feeder for AirCmsFeeder<T> {
    async fn feed(&mut self, data: &StationData) {
        let login = match data.token_id.login() {
            Ok(login) => login,
            Err(e) => {
                error!("[AirCMS] can't get login from token {}: {e:#}", data.token_id);
                return;
            }
        };

        if !self.throttle.is_due() {
            debug!("[AirCMS] {login}: skip sensor data posting");
            return;
        }

        let key = data.token_id.signing_key();
        let m = &data.last_measurement;

        let sensor_data = SensorData {
            software_version: &data.version,
            sensor_data_values: vec![
                SensorDataValue::new("SDS_P1", round_or_zero(m.pm10, 1)),
                SensorDataValue::new("SDS_P2", round_or_zero(m.pm25, 1)),
                SensorDataValue::new("BME280_temperature", round_or_zero(m.temperature, 1)),
                SensorDataValue::new("BME280_humidity", round_or_zero(m.humidity, 1)),
                SensorDataValue::new("BME280_pressure", 100.0 * round_or_zero(m.pressure, 2)),
            ],
        };
        let json = match serde_json::to_string(&sensor_data) {
            Ok(json) => json,
            Err(e) => {
                error!("[AirCMS] {login}: can't encode sensor data: {e}");
                return;
            }
        };

        let timestamp = m.timestamp.unwrap_or_else(Utc::now).timestamp();
        let body = format!("L={login}&t={timestamp}&airrohr={json}");
        debug!("[AirCMS] {login}: data to post: {body}");

        let url = format!("{}?h={}", self.url, sign(&body, &key));
        debug!("[AirCMS] {login}: posting sensor data to {}, token: {key}", self.url);

        match post_data(&self.transport, &url, CONTENT_TYPE_FORM, body.into_bytes()).await {
            Ok(response) => {
                self.throttle.mark();
                debug!(
                    "[AirCMS] {login}: successfully posted sensor data, response: {}",
                    String::from_utf8_lossy(&response)
                );
            }
            Err(e) => {
                error!("[AirCMS] {login}: sensor data posting failed: {}", truncated(&e));
                if is_forbidden(&e) {
                    info!(
                        "[AirCMS] please register your station at https://aircms.online/#/adddevice \
                         (ID: {login}, MAC: {key})"
                    );
                }
            }
        }
    }
}
