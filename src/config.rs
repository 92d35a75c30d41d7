//! Configuration for the fcgi-relay command.
//!
//! Supports both command-line arguments and a TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::{Params, RequestOptions};
use crate::runtime::{Backoff, Endpoint, ParseEndpointError};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "fcgi-relay")]
#[command(version)]
#[command(about = "Send one request to a FastCGI application", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Application endpoint (e.g., /run/php/php-fpm.sock or 127.0.0.1:9000)
    #[arg(short = 'C', long)]
    pub connect: Option<String>,

    /// Request driver
    #[arg(short, long, value_enum)]
    pub runtime: Option<RuntimeType>,

    /// CGI parameter as NAME=VALUE (repeatable)
    #[arg(short, long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    /// File sent as the stdin stream ("-" for standard input)
    #[arg(long, value_name = "FILE")]
    pub stdin: Option<PathBuf>,

    /// File sent as the data stream
    #[arg(long, value_name = "FILE")]
    pub data: Option<PathBuf>,

    /// Close the data stream with an empty record on the blocking path
    #[arg(long)]
    pub terminate_data: bool,

    /// Give up after this many failed connection attempts
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Print the raw stdout stream instead of the response body
    #[arg(long)]
    pub raw: bool,

    /// Query the application's management variables and exit
    #[arg(long)]
    pub get_values: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {s:?}"))?;
    if name.is_empty() {
        return Err(format!("empty parameter name in {s:?}"));
    }
    Ok((name.to_string(), value.to_string()))
}

/// How the request is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    /// Blocking client on the calling thread
    #[default]
    Blocking,
    /// Incremental session on a mio event loop
    Mio,
    /// Incremental session on a tokio runtime
    Tokio,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub params: Params,
}

/// Client-related configuration
#[derive(Debug, Deserialize, Default)]
pub struct ClientConfig {
    /// Application endpoint
    pub connect: Option<String>,
    /// Request driver
    #[serde(default)]
    pub runtime: RuntimeType,
    /// Send an empty Data record on the blocking path
    #[serde(default)]
    pub terminate_data: bool,
}

/// Connection retry configuration
#[derive(Debug, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Absent means retry forever
    pub max_attempts: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: None,
        }
    }
}

impl From<&RetryConfig> for Backoff {
    fn from(retry: &RetryConfig) -> Self {
        Backoff {
            initial: Duration::from_millis(retry.initial_delay_ms),
            multiplier: retry.multiplier,
            max: Duration::from_millis(retry.max_delay_ms),
            max_attempts: retry.max_attempts,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_multiplier() -> u32 {
    2
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: Endpoint,
    pub runtime: RuntimeType,
    pub options: RequestOptions,
    pub backoff: Backoff,
    pub params: Params,
    pub stdin: Option<PathBuf>,
    pub data: Option<PathBuf>,
    pub raw: bool,
    pub get_values: bool,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let connect = cli
            .connect
            .or(toml_config.client.connect)
            .ok_or(ConfigError::MissingEndpoint)?;
        let endpoint = connect
            .parse::<Endpoint>()
            .map_err(|e| ConfigError::InvalidEndpoint(connect.clone(), e))?;

        validate_retry(&toml_config.retry)?;
        let mut backoff = Backoff::from(&toml_config.retry);
        if cli.max_attempts.is_some() {
            backoff.max_attempts = cli.max_attempts;
        }

        let mut params = toml_config.params;
        params.extend(cli.params);

        Ok(Config {
            endpoint,
            runtime: cli.runtime.unwrap_or(toml_config.client.runtime),
            options: RequestOptions {
                keep_conn: false,
                terminate_data: cli.terminate_data || toml_config.client.terminate_data,
            },
            backoff,
            params,
            stdin: cli.stdin,
            data: cli.data,
            raw: cli.raw,
            get_values: cli.get_values,
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        })
    }
}

/// Zero delays would turn an unbounded retry policy into a busy loop.
fn validate_retry(retry: &RetryConfig) -> Result<(), ConfigError> {
    if retry.multiplier < 1 {
        return Err(ConfigError::InvalidRetry("multiplier must be at least 1"));
    }
    if retry.initial_delay_ms == 0 {
        return Err(ConfigError::InvalidRetry("initial_delay_ms must be greater than 0"));
    }
    if retry.max_delay_ms == 0 {
        return Err(ConfigError::InvalidRetry("max_delay_ms must be greater than 0"));
    }
    Ok(())
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),

    #[error("No endpoint configured: pass --connect or set client.connect")]
    MissingEndpoint,

    #[error("Invalid retry configuration: {0}")]
    InvalidRetry(&'static str),

    #[error("Invalid endpoint '{0}': {1}")]
    InvalidEndpoint(String, #[source] ParseEndpointError),
}
