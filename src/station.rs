mod esp;
mod rpi;
mod sds011;

use std::{fmt, str::FromStr};

use anyhow::{Error, Result, bail};

pub use esp::*;
pub use rpi::*;
pub use sds011::*;

use crate::{heater::HeaterState, http::Transport, measurement::StationData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationMode {
    Esp,
    Rpi,
}

impl StationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StationMode::Esp => "esp",
            StationMode::Rpi => "rpi",
        }
    }
}

impl FromStr for StationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "esp" => Ok(StationMode::Esp),
            "rpi" => Ok(StationMode::Rpi),
            _ => bail!("invalid station mode: {s} (esp, rpi)"),
        }
    }
}

impl fmt::Display for StationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[allow(async_fn_in_trait)]
pub trait Station {
    fn version(&self) -> &str;

    async fn start(&mut self) -> Result<()>;

    async fn stop(&mut self);

    fn heater_state(&self) -> HeaterState;

    /// Drives the heater. Failures are logged and leave the state unchanged.
    async fn turn_heater(&mut self, state: HeaterState);

    async fn get_data(&mut self) -> Result<StationData>;
}

pub enum AnyStation<T> {
    Esp(EspStation<T>),
    Rpi(RpiStation),
}

impl<T: Transport> Station for AnyStation<T> {
    fn version(&self) -> &str {
        match self {
            AnyStation::Esp(s) => s.version(),
            AnyStation::Rpi(s) => s.version(),
        }
    }

    async fn start(&mut self) -> Result<()> {
        match self {
            AnyStation::Esp(s) => s.start().await,
            AnyStation::Rpi(s) => s.start().await,
        }
    }

    async fn stop(&mut self) {
        match self {
            AnyStation::Esp(s) => s.stop().await,
            AnyStation::Rpi(s) => s.stop().await,
        }
    }

    fn heater_state(&self) -> HeaterState {
        match self {
            AnyStation::Esp(s) => s.heater_state(),
            AnyStation::Rpi(s) => s.heater_state(),
        }
    }

    async fn turn_heater(&mut self, state: HeaterState) {
        match self {
            AnyStation::Esp(s) => s.turn_heater(state).await,
            AnyStation::Rpi(s) => s.turn_heater(state).await,
        }
    }

    async fn get_data(&mut self) -> Result<StationData> {
        match self {
            AnyStation::Esp(s) => s.get_data().await,
            AnyStation::Rpi(s) => s.get_data().await,
        }
    }
}
