//! # Configuration Module
//!
//! Handles loading and validating monitor configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::connection::{ConnectionOptions, DEFAULT_MAX_BUFFER_BYTES};
use crate::error::{LapRfError, Result};
use crate::transport::serial::{DEFAULT_BAUD_RATE, SUPPORTED_BAUD_RATES};
use crate::transport::tcp::DEFAULT_TCP_PORT;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the device is reached
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Serial,
    Tcp,
}

/// Transport and connection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub transport: TransportKind,

    /// Empty means auto-detect
    #[serde(default)]
    pub serial_port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_tcp_host")]
    pub tcp_host: String,

    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,

    /// 0 writes each command whole; wireless bridges need 20
    #[serde(default)]
    pub max_write_chunk: usize,

    #[serde(default = "default_max_buffer_bytes")]
    pub max_buffer_bytes: usize,

    #[serde(default)]
    pub read_only: bool,

    /// Send the ASCII binary-mode switch on connect
    #[serde(default)]
    pub enable_binary_protocol: bool,
}

/// Commands sent to the device after connecting
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    #[serde(default)]
    pub status_interval_ms: Option<u16>,

    #[serde(default)]
    pub rssi_packet_rate_ms: Option<u32>,

    #[serde(default)]
    pub min_lap_time_ms: Option<u32>,

    #[serde(default = "default_true")]
    pub request_rtc_time_on_connect: bool,

    #[serde(default = "default_true")]
    pub request_rf_setup_on_connect: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write daily-rotated log files here
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Print events as JSON lines on stdout
    #[serde(default = "default_true")]
    pub json_events: bool,
}

// Default value functions
fn default_baud_rate() -> u32 { DEFAULT_BAUD_RATE }
fn default_tcp_host() -> String { "127.0.0.1".to_string() }
fn default_tcp_port() -> u16 { DEFAULT_TCP_PORT }
fn default_max_buffer_bytes() -> usize { DEFAULT_MAX_BUFFER_BYTES }

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            serial_port: String::new(),
            baud_rate: default_baud_rate(),
            tcp_host: default_tcp_host(),
            tcp_port: default_tcp_port(),
            max_write_chunk: 0,
            max_buffer_bytes: default_max_buffer_bytes(),
            read_only: false,
            enable_binary_protocol: false,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            status_interval_ms: None,
            rssi_packet_rate_ms: None,
            min_lap_time_ms: None,
            request_rtc_time_on_connect: true,
            request_rf_setup_on_connect: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
            json_events: true,
        }
    }
}

impl ConnectionConfig {
    pub fn options(&self) -> ConnectionOptions {
        ConnectionOptions {
            read_only: self.read_only,
            max_buffer_bytes: self.max_buffer_bytes,
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> LapRfError {
    LapRfError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use laprf::config::Config;
    ///
    /// let config = Config::load("laprf.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Returns
    ///
    /// * `Result<()>` - Ok if valid, Err if invalid
    pub fn validate(&self) -> Result<()> {
        let connection = &self.connection;

        if !SUPPORTED_BAUD_RATES.contains(&connection.baud_rate) {
            return Err(invalid(format!(
                "baud_rate {} is not one of {:?}",
                connection.baud_rate, SUPPORTED_BAUD_RATES
            )));
        }

        if connection.transport == TransportKind::Tcp {
            if connection.tcp_host.is_empty() {
                return Err(invalid("tcp_host cannot be empty when transport is tcp"));
            }
            if connection.tcp_port == 0 {
                return Err(invalid("tcp_port must be greater than 0"));
            }
        }

        if connection.max_buffer_bytes != 0 && connection.max_buffer_bytes < 64 {
            return Err(invalid("max_buffer_bytes must be 0 (unlimited) or at least 64"));
        }

        if let Some(rate) = self.device.rssi_packet_rate_ms {
            if rate > 60000 {
                return Err(invalid("rssi_packet_rate_ms must be between 0 and 60000"));
            }
        }

        if self.device.status_interval_ms == Some(0) {
            return Err(invalid("status_interval_ms must be greater than 0"));
        }

        if let Some(dir) = &self.logging.log_dir {
            if dir.is_empty() {
                return Err(invalid("log_dir cannot be empty when set"));
            }
        }

        if self.logging.level.is_empty() {
            return Err(invalid("logging level cannot be empty"));
        }

        Ok(())
    }
}
