//! Static startup configuration and the enforcement configuration re-read every cycle.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::LevelFilter;
use serde::Deserialize;
use shared::parser::interval;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "/etc/mysql-quotad/quotad.toml";

/// Used until a config file has been loaded successfully once
pub const FALLBACK_CHECK_FREQUENCY: Duration = Duration::from_secs(60);

/// Settings determined once at startup
#[derive(Debug)]
pub struct Config {
    pub config_file: PathBuf,
    pub once: bool,
    pub log_target: LogTarget,
    pub log_level: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_file: DEFAULT_CONFIG_FILE.into(),
            once: false,
            log_target: LogTarget::Std,
            log_level: LevelFilter::Info,
        }
    }
}

/// Enforces per database storage quotas on a MySQL server
///
/// Periodically measures the storage used by each database. Databases reaching their quota lose
/// the CREATE, INSERT and UPDATE privileges of their scoped accounts until they drop below it
/// again.
#[derive(Debug, Default, Parser, Deserialize)]
#[command(
    author,
    version,
    rename_all = "kebab-case",
    hide_possible_values = false
)]
struct ConfigArgs {
    //
    // CLI and config file args - can be filled in later from another ConfigArgs if they are
    // still none
    /// Log target [default: std]
    ///
    /// Sets the logging mechanism to use.
    #[arg(long)]
    log_target: Option<LogTarget>,
    /// Log level [default: info]
    ///
    /// Sets the maximum level to log.
    ///
    /// When logging to std, the logging behavior can be fine controlled by
    /// setting the RUST_LOG environment variable. This overwrites this
    /// setting.
    #[arg(long)]
    log_level: Option<LogLevel>,

    //
    // CLI only args - we do not parse them from file
    /// Config file location [default: /etc/mysql-quotad/quotad.toml]
    ///
    /// Re-read at the beginning of every check cycle.
    #[arg(long, short = 'c')]
    #[serde(skip)]
    config_file: Option<PathBuf>,
    /// Run a single check cycle, then quit
    #[arg(long)]
    #[serde(skip)]
    once: bool,
}

impl ConfigArgs {
    /// Fill None fields from another source - ignore Some(_) fields
    /// This means, what is put in first has higher priority
    fn fill_from(&mut self, other: Self) {
        if self.log_target.is_none() {
            self.log_target = other.log_target
        };

        if self.log_level.is_none() {
            self.log_level = other.log_level
        };
    }

    fn into_config(self) -> Config {
        let mut config = Config {
            once: self.once,
            ..Config::default()
        };

        config.config_file = self.config_file.unwrap_or(config.config_file);
        config.log_target = self.log_target.unwrap_or(config.log_target);
        if let Some(l) = self.log_level {
            config.log_level = l.into();
        }

        config
    }
}

/// Parses the command line and the logging settings from the config file.
///
/// Returns the config and info messages to be logged once logging is set up. A missing config
/// file at the default location is not an error here, the check cycles will report it.
pub fn load_and_parse() -> Result<(Config, Vec<String>)> {
    let mut args = ConfigArgs::parse();
    let mut info_log = vec![];

    let file = args
        .config_file
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.into());

    match std::fs::read_to_string(&file) {
        Ok(ref toml_config) => {
            let file_args: ConfigArgs =
                toml::from_str(toml_config).with_context(|| "Couldn't parse config file")?;

            info_log.push(format!("Loaded logging configuration from {file:?}"));

            args.fill_from(file_args);
        }
        Err(err) => {
            if args.config_file.is_some() {
                return Err(err)
                    .with_context(|| format!("Could not open config file at {file:?}"));
            }

            info_log.push(format!("No config file found at {file:?} yet"));
        }
    }

    Ok((args.into_config(), info_log))
}

/// Everything a check cycle needs. Loaded at the beginning of each cycle and passed down
/// explicitly.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnforcementConfig {
    pub mysql: MySqlParams,
    /// Pause between two check cycles
    #[serde(with = "interval")]
    pub check_frequency: Duration,
    /// Quota for databases without an entry in `databases`
    pub default_quota: String,
    /// Per database quota overrides. `"-1"` excludes a database from enforcement.
    #[serde(default)]
    pub databases: HashMap<String, String>,

    // Handled by ConfigArgs, accepted here so the file can be shared
    #[serde(default, rename = "log_target")]
    _log_target: Option<LogTarget>,
    #[serde(default, rename = "log_level")]
    _log_level: Option<LogLevel>,
}

impl EnforcementConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let toml_config = std::fs::read_to_string(path)
            .with_context(|| format!("Could not open config file at {path:?}"))?;

        Self::from_toml(&toml_config)
            .with_context(|| format!("Couldn't parse config file {path:?}"))
    }

    pub fn from_toml(toml_config: &str) -> Result<Self> {
        Ok(toml::from_str(toml_config)?)
    }
}

/// Connection parameters for the server
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MySqlParams {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    /// Unix socket to connect through instead of TCP
    #[serde(default)]
    pub socket: Option<PathBuf>,
}

fn default_host() -> String {
    "localhost".into()
}

fn default_port() -> u16 {
    3306
}

/// Keeps the password out of the logs
impl std::fmt::Debug for MySqlParams {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("MySqlParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<hidden>"))
            .field("socket", &self.socket)
            .finish()
    }
}

#[derive(Clone, Debug, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    Std,
    Journald,
}

// To be able to parse the log level, we need to make our own enum and convert
// it
#[derive(Clone, Debug, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(usize)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}
