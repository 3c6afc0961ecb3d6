use anyhow::{Context, Result};
use clap::{Arg, Command};
use config::{Config, Environment, File};
use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::{
    alertmanager_webhook_receiver::AlertReceiverSettings, dingtalk::DispatchSettings,
    log::LogSettings, telemetry_endpoint::TelemetryEndpointSettings,
};

static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// prefix of environment variables overriding config file values, e.g. `DINGTALK_RELAY__RECEIVER__PORT`
const ENV_PREFIX: &str = "DINGTALK_RELAY";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub receiver: AlertReceiverSettings,
    pub dispatch: DispatchSettings,
    pub log: LogSettings,
    pub telemetry_endpoint: TelemetryEndpointSettings,
}

impl Settings {
    pub fn global() -> &'static Self {
        SETTINGS.get_or_init(|| {
            match Self::load().context("failed to load config and command line arguments") {
                Ok(settings) => settings,
                Err(err) => {
                    // tracing wasn't setup yet
                    panic!("{:#?}", err);
                }
            }
        })
    }

    fn load() -> Result<Self> {
        let opts = Command::new(clap::crate_name!())
            .version(clap::crate_version!())
            .about(clap::crate_description!())
            .author(clap::crate_authors!())
            .args(&[
                Arg::new("config")
                    .help("path of config file")
                    .takes_value(true)
                    .short('c')
                    .long("config")
                    .default_value("./config.yaml"),
                Arg::new("level")
                    .help("log level")
                    .possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
                    .ignore_case(true)
                    .takes_value(true)
                    .long("log"),
            ])
            .get_matches();

        let config_path = opts.value_of("config").unwrap_or("./config.yaml");

        Self::from_sources(config_path, opts.value_of("level"))
    }

    /// Builds the settings from the defaults, the optional config file at `config_path`
    /// and the environment. `level` overrides the configured log level.
    fn from_sources(config_path: &str, level: Option<&str>) -> Result<Self> {
        let conf = Config::builder()
            .set_default("receiver.bind_address", "0.0.0.0")?
            .set_default("receiver.port", 9090)?
            .set_default("receiver.path", "/dingtalk")?
            .set_default("dispatch.accept_invalid_certs", true)?
            .set_default("telemetry_endpoint.bind_address", "127.0.0.1")?
            .set_default("telemetry_endpoint.port", 9091)?
            .set_default("log.level", "Info")?
            .add_source(File::with_name(config_path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .context("can't load config")?;

        let mut settings: Settings = conf.try_deserialize().context("can't load config")?;

        if let Some(level) = level {
            settings.log.level = level.to_string();
        }

        Ok(settings)
    }
}
