use std::time::Duration;

use airstation::{feeder::FeederName, station::StationMode, token::TokenId};
use anyhow::{Context as _, Result};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(version, about = "Relays air quality station data to open data services")]
pub struct Args {
    #[arg(long, env = "AIRSTATION_DEBUG")]
    pub debug: bool,

    #[arg(long, env = "AIRSTATION_MODE", default_value = "esp")]
    pub mode: StationMode,

    #[arg(long, env = "AIRSTATION_ESP_HOST", default_value = "OpenAir.local")]
    pub esp_host: String,

    #[arg(long, env = "AIRSTATION_ESP_PORT", default_value_t = 80)]
    pub esp_port: u16,

    #[arg(long, default_value_t = 14)]
    pub esp_heater_pin: u8,

    /// I2C bus id of the BME280 (`/dev/i2c-<N>`)
    #[arg(long, default_value_t = 1)]
    pub i2c_bus: u8,

    #[arg(long, default_value = "0x76", value_parser = parse_i2c_address)]
    pub bme_address: u8,

    #[arg(long, default_value = "/dev/ttyAMA0")]
    pub serial_port: String,

    /// SDS011 working period in minutes
    #[arg(long, default_value_t = 3)]
    pub sds_period: u8,

    #[arg(long, default_value_t = 7)]
    pub rpi_heater_pin: u8,

    #[arg(
        long,
        env = "AIRSTATION_API_SERVER_URL",
        default_value = "https://api.openair.city/v1/feeder"
    )]
    pub api_server_url: String,

    #[arg(long, default_value = "1m", value_parser = humantime::parse_duration)]
    pub update_interval: Duration,

    /// How long unsent measurements are kept for the token API
    #[arg(long, default_value = "6h", value_parser = humantime::parse_duration)]
    pub keep_duration: Duration,

    /// Station uptime below which data is not relayed
    #[arg(long, default_value = "5m", value_parser = humantime::parse_duration)]
    pub settle_time: Duration,

    #[arg(long, default_value = "15s", value_parser = humantime::parse_duration)]
    pub http_timeout: Duration,

    #[arg(long)]
    pub disable_pm_correction: bool,

    #[arg(long)]
    pub enable_heater: bool,

    /// Humidity (%) at which the heater turns on
    #[arg(long, default_value_t = 60)]
    pub heater_humidity: i32,

    #[arg(long, env = "AIRSTATION_TOKEN_ID")]
    pub token_id: Option<TokenId>,

    /// Feeder to enable (all, openair, luftdaten, aircms)
    #[arg(long = "enable", value_name = "NAME")]
    pub enabled: Vec<FeederName>,

    /// Feeder to disable (all, openair, luftdaten, aircms)
    #[arg(long = "disable", value_name = "NAME")]
    pub disabled: Vec<FeederName>,

    /// Port of the local sensor data publisher, 0 disables it
    #[arg(long, default_value_t = 0)]
    pub publisher_port: u16,
}

fn parse_i2c_address(s: &str) -> Result<u8> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .with_context(|| format!("invalid I2C address: {s}"))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["airstation"]).unwrap();

        assert_eq!(args.mode, StationMode::Esp);
        assert_eq!(args.bme_address, 0x76);
        assert_eq!(args.update_interval, Duration::from_secs(60));
        assert_eq!(args.keep_duration, Duration::from_secs(6 * 3600));
        assert!(args.enabled.is_empty() && args.disabled.is_empty());
    }

    #[test]
    fn repeatable_feeder_selection() {
        let args = Args::try_parse_from([
            "airstation",
            "--disable",
            "all",
            "--enable",
            "openair",
            "--enable",
            "aircms",
        ])
        .unwrap();

        assert_eq!(args.disabled, vec![FeederName::All]);
        assert_eq!(args.enabled, vec![FeederName::OpenAir, FeederName::AirCms]);
    }

    #[test]
    fn parses_i2c_addresses() {
        assert_eq!(parse_i2c_address("0x77").unwrap(), 0x77);
        assert_eq!(parse_i2c_address("118").unwrap(), 0x76);
        assert!(parse_i2c_address("0x1ff").is_err());
    }

    #[test]
    fn rejects_malformed_token() {
        assert!(Args::try_parse_from(["airstation", "--token-id", "not-a-token"]).is_err());
    }
}
