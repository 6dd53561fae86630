use std::time::Duration;

use anyhow::{Context as _, Result};
use chrono::Utc;
use log::{debug, error, info, warn};

use crate::{
    esp::{EspData, EspGpioControlResponse},
    heater::HeaterState,
    http::{Transport, get_json},
    measurement::StationData,
    station::Station,
    token::TokenId,
};

#[derive(Debug, Clone)]
pub struct EspConfig {
    pub host: String,
    pub port: u16,
    pub heater_pin: u8,
}

/// Network board polled over its ESP Easy HTTP interface.
pub struct EspStation<T> {
    version: String,
    config: EspConfig,
    token_id: Option<TokenId>,
    transport: T,
    heater_state: HeaterState,
    last_uptime: Option<Duration>,
}

impl<T: Transport> EspStation<T> {
    pub fn new(version: String, config: EspConfig, token_id: Option<TokenId>, transport: T) -> Self {
        Self {
            version,
            config,
            token_id,
            transport,
            heater_state: HeaterState::Off,
            last_uptime: None,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}:{}{}", self.config.host, self.config.port, path)
    }
}

impl<T: Transport> Station for EspStation<T> {
    fn version(&self) -> &str {
        &self.version
    }

    async fn start(&mut self) -> Result<()> {
        info!("started ESP station at {}", self.url(""));
        Ok(())
    }

    async fn stop(&mut self) {
        info!("stopped ESP station");
    }

    fn heater_state(&self) -> HeaterState {
        self.heater_state
    }

    async fn turn_heater(&mut self, state: HeaterState) {
        let pin = self.config.heater_pin;
        let level = state.pin_level();
        let url = self.url(&format!("/control?cmd=GPIO,{pin},{level}"));

        if let Err(e) = get_json::<_, EspGpioControlResponse>(&self.transport, &url).await {
            error!("can't set heater pin {pin} state {level}: {e:#}");
            return;
        }

        self.heater_state = state;
        debug!("heater turned {state}");
    }

    async fn get_data(&mut self) -> Result<StationData> {
        let url = self.url("/json");
        debug!("getting sensor data from ESP station {url}");

        let data: EspData = get_json(&self.transport, &url)
            .await
            .context("sensor data request failed")?;
        debug!("received sensor data: {data:?}");

        let last_measurement = data.measurement(Utc::now());

        let token_id = match &self.token_id {
            Some(token_id) => token_id.clone(),
            None => TokenId::from_mac_str(data.wifi.mac_address()),
        };
        debug!("token ID: {token_id}");

        let uptime = Duration::from_secs(data.system.uptime.saturating_mul(60));
        if let Some(last_uptime) = self.last_uptime
            && uptime < last_uptime
        {
            warn!("ESP station reboot detected");
            self.heater_state = HeaterState::Off;
        }
        self.last_uptime = Some(uptime);

        Ok(StationData {
            version: self.version.clone(),
            token_id,
            uptime,
            last_measurement,
        })
    }
}
