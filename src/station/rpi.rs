use std::{
    fs,
    path::Path,
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{Context as _, Result, anyhow};
use bme280_rs::{Bme280, Configuration, Oversampling, SensorMode};
use chrono::Utc;
use linux_embedded_hal::{Delay, I2cdev};
use log::{debug, error, info};
use macaddr::MacAddr6;
use tokio::time::Instant;

use crate::{
    exec::execute,
    heater::HeaterState,
    measurement::{Measurement, StationData},
    station::{PmSample, SerialLink, Sds011, Station},
    token::TokenId,
};

const SDS_RETRY_DELAY: Duration = Duration::from_secs(3);
const GPIO_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
const NET_CLASS_DIR: &str = "/sys/class/net";

type Bme = Bme280<I2cdev, Delay>;

#[derive(Debug, Clone)]
pub struct RpiConfig {
    pub i2c_bus: u8,
    pub bme_address: u8,
    pub serial_port: String,
    pub sds_period: u8,
    pub heater_pin: u8,
}

/// Latest PM pair shared between the serial reader thread and `get_data`.
#[derive(Debug, Clone, Default)]
pub struct PmCache(Arc<RwLock<Option<PmSample>>>);

impl PmCache {
    pub fn get(&self) -> Option<PmSample> {
        self.0.read().map(|pm| *pm).unwrap_or_else(|e| *e.into_inner())
    }

    pub fn set(&self, sample: PmSample) {
        match self.0.write() {
            Ok(mut pm) => *pm = Some(sample),
            Err(e) => *e.into_inner() = Some(sample),
        }
    }
}

/// Station wired to local sensors: BME280 on I2C and SDS011 on a serial port.
pub struct RpiStation {
    version: String,
    config: RpiConfig,
    token_id: TokenId,
    started_at: Instant,
    bme: Option<Bme>,
    pm: PmCache,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    heater_state: HeaterState,
}

impl RpiStation {
    pub fn new(version: String, config: RpiConfig, token_id: Option<TokenId>) -> Result<Self> {
        let token_id = match token_id {
            Some(token_id) => token_id,
            None => {
                let mac = wireless_mac_address(Path::new(NET_CLASS_DIR))?
                    .ok_or_else(|| anyhow!("can't determine RPi station MAC address"))?;
                debug!("MAC address: {mac}");
                TokenId::from_mac_address(mac)
            }
        };
        debug!("token ID: {token_id}");

        Ok(Self {
            version,
            config,
            token_id,
            started_at: Instant::now(),
            bme: None,
            pm: PmCache::default(),
            stop: Arc::new(AtomicBool::new(false)),
            reader: None,
            heater_state: HeaterState::Off,
        })
    }

    fn init_bme(&self) -> Result<Bme> {
        let path = format!("/dev/i2c-{}", self.config.i2c_bus);
        let i2c = I2cdev::new(&path).with_context(|| format!("I2C bus {path} init error"))?;

        let mut bme = Bme280::new_with_address(i2c, self.config.bme_address, Delay);
        bme.init()
            .map_err(|e| anyhow!("{e:?}"))
            .context("can't find BME280 sensor")?;

        let sampling = Configuration::default()
            .with_temperature_oversampling(Oversampling::Oversample1)
            .with_humidity_oversampling(Oversampling::Oversample1)
            .with_pressure_oversampling(Oversampling::Oversample1)
            .with_sensor_mode(SensorMode::Normal);
        bme.set_sampling_configuration(sampling)
            .map_err(|e| anyhow!("{e:?}"))
            .context("invalid BME280 sensor state")?;

        Ok(bme)
    }

    async fn set_heater_pin(&self, state: HeaterState) -> Result<()> {
        let pin = self.config.heater_pin;
        execute(&format!("gpio -1 mode {pin} out"), GPIO_COMMAND_TIMEOUT)
            .await
            .with_context(|| format!("can't set heater pin {pin} output mode"))?;

        let level = state.pin_level();
        execute(&format!("gpio -1 write {pin} {level}"), GPIO_COMMAND_TIMEOUT)
            .await
            .with_context(|| format!("can't set heater pin {pin} state {level}"))
    }
}

impl Station for RpiStation {
    fn version(&self) -> &str {
        &self.version
    }

    async fn start(&mut self) -> Result<()> {
        info!("starting RPi station...");

        self.bme = Some(self.init_bme().context("BME280 sensor init error")?);

        let mut sds = Sds011::open(&self.config.serial_port).context("serial port init error")?;
        sds.set_working_period(self.config.sds_period)
            .context("SDS011 sensor init error")?;

        self.stop.store(false, Ordering::Relaxed);
        let pm = self.pm.clone();
        let stop = self.stop.clone();
        let reader = thread::Builder::new()
            .name("sds011-reader".to_owned())
            .spawn(move || read_sds_sensor(sds, pm, stop, SDS_RETRY_DELAY))
            .context("failed to spawn SDS011 reader")?;
        self.reader = Some(reader);

        Ok(())
    }

    async fn stop(&mut self) {
        info!("stopping RPi station...");

        self.stop.store(true, Ordering::Relaxed);
        if let Some(reader) = self.reader.take() {
            let joined = tokio::task::spawn_blocking(move || reader.join()).await;
            if !matches!(joined, Ok(Ok(()))) {
                error!("SDS011 reader terminated abnormally");
            }
        }
        self.bme = None;
    }

    fn heater_state(&self) -> HeaterState {
        self.heater_state
    }

    async fn turn_heater(&mut self, state: HeaterState) {
        if let Err(e) = self.set_heater_pin(state).await {
            error!("{e:#}");
            return;
        }

        self.heater_state = state;
        debug!("heater turned {state}");
    }

    async fn get_data(&mut self) -> Result<StationData> {
        let timestamp = Utc::now();

        let bme = self
            .bme
            .as_mut()
            .ok_or_else(|| anyhow!("RPi station is not started"))?;
        let sample = bme
            .read_sample()
            .map_err(|e| anyhow!("{e:?}"))
            .context("failed to read BME280 sensor")?;

        let pm = self.pm.get();

        Ok(StationData {
            version: self.version.clone(),
            token_id: self.token_id.clone(),
            uptime: self.started_at.elapsed(),
            last_measurement: Measurement {
                temperature: sample.temperature,
                humidity: sample.humidity,
                pressure: sample.pressure.map(|pa| pa / 100.0),
                pm25: pm.map(|pm| pm.pm25),
                pm10: pm.map(|pm| pm.pm10),
                ..Measurement::at(timestamp)
            },
        })
    }
}

fn read_sds_sensor<L: SerialLink>(
    mut sds: Sds011<L>,
    pm: PmCache,
    stop: Arc<AtomicBool>,
    retry_delay: Duration,
) {
    while !stop.load(Ordering::Relaxed) {
        match sds.read_sample() {
            Ok(Some(sample)) => {
                pm.set(sample);
                debug!(
                    "read SDS011 sensor values, PM2.5: {}, PM10: {}",
                    sample.pm25, sample.pm10
                );
            }
            Ok(None) => {}
            Err(e) => {
                error!("can't read SDS011 sensor: {e:#}");
                thread::sleep(retry_delay);
                if let Err(e) = sds.clear_input() {
                    error!("{e:#}");
                }
            }
        }
    }
}

/// MAC address of the first wireless (`wl*`) interface, if any.
fn wireless_mac_address(net_class_dir: &Path) -> Result<Option<MacAddr6>> {
    let mut names = fs::read_dir(net_class_dir)
        .with_context(|| format!("failed to list {}", net_class_dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("wl"))
        .collect::<Vec<_>>();
    names.sort();

    let Some(name) = names.first() else {
        return Ok(None);
    };

    let path = net_class_dir.join(name).join("address");
    let address = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mac = address
        .trim()
        .parse()
        .with_context(|| format!("invalid MAC address of {name}: {}", address.trim()))?;

    Ok(Some(mac))
}
