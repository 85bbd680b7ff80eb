//! Configuration module for crlf-probe.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::framer::{Framer, DEFAULT_READ_TIMEOUT};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Well-known POP3 port.
pub const DEFAULT_PORT: u16 = 110;

/// How operator input is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// `send`/`recv`/`fail`/`quit` commands; an empty `send ` sends a blank line.
    #[default]
    Explicit,
    /// Every input line is sent as-is and a response line is awaited.
    /// An empty line sends nothing and just reads the next response line.
    Auto,
}

/// Command-line arguments for the probe client
#[derive(Parser, Debug)]
#[command(name = "crlf-probe")]
#[command(version)]
#[command(about = "Interactive probe client for CRLF-delimited text protocols", long_about = None)]
pub struct CliArgs {
    /// Server host name or address
    pub host: Option<String>,

    /// Server port (defaults to 110)
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// How operator input is interpreted
    #[arg(short, long, value_enum)]
    pub mode: Option<Mode>,

    /// Read a greeting line before the first prompt
    #[arg(short, long)]
    pub greeting: bool,

    /// Seconds to wait for one response line
    #[arg(short = 't', long = "timeout", value_parser = clap::value_parser!(u64).range(1..))]
    pub read_timeout: Option<u64>,

    /// Seconds to wait for the TCP connection to be established
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub connect_timeout: Option<u64>,

    /// Reject response lines longer than this many bytes
    #[arg(long)]
    pub max_line_length: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote endpoint configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_port(),
        }
    }
}

/// Session behaviour configuration
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub greeting: bool,
    /// Per-line read deadline in seconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    pub max_line_length: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            greeting: false,
            read_timeout_secs: default_read_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_line_length: None,
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

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_read_timeout() -> u64 {
    DEFAULT_READ_TIMEOUT.as_secs()
}

fn default_connect_timeout() -> u64 {
    10
}

// stdout is the operator channel, so stay quiet unless asked.
fn default_log_level() -> String {
    "warn".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub mode: Mode,
    pub greeting: bool,
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_line_length: Option<usize>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Merge parsed CLI args with the TOML file they name, if any.
    /// CLI arguments take precedence over TOML file values.
    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|source| ConfigError::FileRead {
                    path: config_path.clone(),
                    source,
                })?;
            toml::from_str(&contents)
                .map_err(|source| ConfigError::TomlParse {
                    path: config_path.clone(),
                    source,
                })?
        } else {
            TomlConfig::default()
        };

        let host = cli
            .host
            .or(toml_config.server.host)
            .ok_or(ConfigError::MissingHost)?;

        let read_timeout = cli
            .read_timeout
            .unwrap_or(toml_config.session.read_timeout_secs);
        let connect_timeout = cli
            .connect_timeout
            .unwrap_or(toml_config.session.connect_timeout_secs);
        if read_timeout == 0 || connect_timeout == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(Config {
            host,
            port: cli.port.unwrap_or(toml_config.server.port),
            mode: cli.mode.unwrap_or(toml_config.session.mode),
            greeting: cli.greeting || toml_config.session.greeting,
            read_timeout: Duration::from_secs(read_timeout),
            connect_timeout: Duration::from_secs(connect_timeout),
            max_line_length: cli
                .max_line_length
                .or(toml_config.session.max_line_length),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        })
    }

    /// Framer settings for response lines.
    pub fn framer(&self) -> Framer {
        Framer::new(self.read_timeout).with_max_line_length(self.max_line_length)
    }

    /// `host:port` as shown to the operator and in logs.
    pub fn peer(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", .path.display())]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("No server host given on the command line or in the config file")]
    MissingHost,

    #[error("Timeouts must be at least one second")]
    ZeroTimeout,
}
