use std::{future::Future, time::Duration};

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use tokio::time::{MissedTickBehavior, interval};

use crate::{
    correction::correct_pm,
    feeder::Feeder,
    heater::{HeaterControl, HeaterState},
    measurement::format_value,
    publisher::Publisher,
    station::Station,
};

/// Unix time of 2019-01-01T00:00:00Z. A clock before it has not been synced yet.
pub const SYSTEM_EPOCH: i64 = 1_546_300_800;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub update_interval: Duration,
    pub settle_time: Duration,
    pub disable_pm_correction: bool,
    /// Heater control, when the heater is enabled.
    pub heater: Option<HeaterControl>,
}

pub struct Runner<S, F, P> {
    station: S,
    feeders: Vec<F>,
    publishers: Vec<P>,
    options: RunOptions,
}

impl<S: Station, F: Feeder, P: Publisher> Runner<S, F, P> {
    pub fn new(station: S, feeders: Vec<F>, publishers: Vec<P>, options: RunOptions) -> Self {
        Self {
            station,
            feeders,
            publishers,
            options,
        }
    }

    /// Ticks until `shutdown` resolves, then stops everything in reverse start order.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        for publisher in self.publishers.iter_mut() {
            if let Err(e) = publisher.start().await {
                error!("{e:#}");
            }
        }

        if let Err(e) = self.station.start().await {
            self.stop_publishers().await;
            return Err(e).context("can't start station");
        }
        info!("station {} started", self.station.version());

        if self.options.heater.is_some() {
            self.station.turn_heater(HeaterState::Off).await;
        }

        let mut ticker = interval(self.options.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => self.tick(Utc::now()).await,
            }
        }

        if self.options.heater.is_some() {
            self.station.turn_heater(HeaterState::Off).await;
        }
        self.station.stop().await;
        self.stop_publishers().await;

        Ok(())
    }

    pub async fn tick(&mut self, now: DateTime<Utc>) {
        let mut data = match self.station.get_data().await {
            Ok(data) => data,
            Err(e) => {
                error!("station data request failed: {e:#}");
                return;
            }
        };

        let m = &mut data.last_measurement;

        if let Some(control) = self.options.heater
            && let Some(humidity) = m.humidity
        {
            if let Some(next) = control.transition(self.station.heater_state(), humidity) {
                info!("turning heater {next} (humidity: {}%)", humidity as i32);
                self.station.turn_heater(next).await;
            }
        } else if !self.options.disable_pm_correction {
            correct_pm(m);
        }

        debug!(
            "temperature: {}, humidity: {}, pressure: {}, pm2.5: {}, pm10: {}",
            format_value(m.temperature),
            format_value(m.humidity),
            format_value(m.pressure),
            format_value(m.pm25),
            format_value(m.pm10),
        );

        if now.timestamp() < SYSTEM_EPOCH {
            info!("ignoring station data since station system time probably is not in sync");
            return;
        }

        if data.uptime < self.options.settle_time {
            info!(
                "ignoring station data since station uptime ({:?}) is shorter than data settle time ({:?})",
                data.uptime, self.options.settle_time
            );
            return;
        }

        for feeder in self.feeders.iter_mut() {
            feeder.feed(&data).await;
        }

        for publisher in self.publishers.iter_mut() {
            publisher.publish(&data);
        }
    }

    async fn stop_publishers(&mut self) {
        for publisher in self.publishers.iter_mut().rev() {
            publisher.stop().await;
        }
    }
}
