mod args;

use std::{env::consts, future::Future, process::ExitCode};

use airstation::{
    feeder::{AirCmsFeeder, AnyFeeder, FeederName, LuftdatenFeeder, OpenAirFeeder},
    heater::HeaterControl,
    http::{HttpClient, HttpConfig},
    publisher::HttpPublisher,
    runner::{RunOptions, Runner},
    station::{AnyStation, EspConfig, EspStation, RpiConfig, RpiStation, StationMode},
};
use anyhow::{Context as _, Result};
use args::Args;
use clap::Parser as _;
use indexmap::IndexMap;
use log::info;
use tokio::signal::unix::{SignalKind, signal};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = run().await {
        eprintln!("{e:#}");
        return ExitCode::from(1);
    }

    ExitCode::from(0)
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { "info,airstation=debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let version = format!(
        "{}-{}-{}_{}",
        args.mode,
        env!("CARGO_PKG_VERSION"),
        consts::ARCH,
        consts::OS
    );
    info!("starting air station {version}");

    let client = HttpClient::new(&HttpConfig {
        timeout: args.http_timeout,
    })?;

    let mut feeders: IndexMap<FeederName, AnyFeeder<HttpClient>> = IndexMap::new();
    for name in FeederName::FEEDERS {
        if !name.is_selected(&args.enabled, &args.disabled) {
            info!("feeder {name} is disabled");
            continue;
        }

        let feeder = match name {
            FeederName::OpenAir => AnyFeeder::OpenAir(OpenAirFeeder::new(
                client.clone(),
                args.api_server_url.clone(),
                args.keep_duration,
            )),
            FeederName::Luftdaten => AnyFeeder::Luftdaten(LuftdatenFeeder::new(client.clone())),
            FeederName::AirCms => AnyFeeder::AirCms(AirCmsFeeder::new(client.clone())),
            FeederName::All => continue,
        };
        feeders.insert(name, feeder);
    }
    info!(
        "enabled feeders: {}",
        feeders.keys().map(FeederName::as_str).collect::<Vec<_>>().join(", ")
    );

    let publishers = match args.publisher_port {
        0 => Vec::new(),
        port => vec![HttpPublisher::new(port)],
    };

    let station = match args.mode {
        StationMode::Esp => AnyStation::Esp(EspStation::new(
            version,
            EspConfig {
                host: args.esp_host.clone(),
                port: args.esp_port,
                heater_pin: args.esp_heater_pin,
            },
            args.token_id.clone(),
            client,
        )),
        StationMode::Rpi => AnyStation::Rpi(
            RpiStation::new(
                version,
                RpiConfig {
                    i2c_bus: args.i2c_bus,
                    bme_address: args.bme_address,
                    serial_port: args.serial_port.clone(),
                    sds_period: args.sds_period,
                    heater_pin: args.rpi_heater_pin,
                },
                args.token_id.clone(),
            )
            .context("failed to initialize local station")?,
        ),
    };

    let heater = args.enable_heater.then(|| {
        let control = HeaterControl::new(args.heater_humidity);
        info!("heater control enabled, turn-on humidity: {}%", control.turn_on_humidity());
        control
    });

    let options = RunOptions {
        update_interval: args.update_interval,
        settle_time: args.settle_time,
        disable_pm_correction: args.disable_pm_correction,
        heater,
    };

    let shutdown = shutdown_signal().context("failed to install signal handlers")?;

    Runner::new(station, feeders.into_values().collect(), publishers, options)
        .run(shutdown)
        .await?;

    info!("air station stopped");

    Ok(())
}

fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut hangup = signal(SignalKind::hangup())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    Ok(async move {
        let name = tokio::select! {
            _ = hangup.recv() => "SIGHUP",
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
            _ = quit.recv() => "SIGQUIT",
        };
        info!("received {name}, shutting down...");
    })
}
