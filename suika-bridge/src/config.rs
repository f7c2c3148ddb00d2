//! Configuration for the Suika bridge.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use thiserror::Error;

pub use suika_common::config::{LogFormat, LoggingConfig};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] suika_common::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Raw input channel settings.
    #[serde(default)]
    pub input: InputConfig,

    /// HTTP serving settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where sensor frames are read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    /// Process standard input.
    #[default]
    Stdin,
    /// A TCP listener accepting one producer connection at a time.
    Tcp,
    /// A device node or file, reopened after EOF.
    Path,
    /// A serial port opened with the configured line settings.
    Serial,
}

impl std::fmt::Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputSource::Stdin => write!(f, "stdin"),
            InputSource::Tcp => write!(f, "tcp"),
            InputSource::Path => write!(f, "path"),
            InputSource::Serial => write!(f, "serial"),
        }
    }
}

/// Frame reader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Input channel kind (default: "stdin").
    #[serde(default)]
    pub source: InputSource,

    /// Listen address for the tcp source (default: "0.0.0.0:7878").
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Device or file path for the path and serial sources.
    #[serde(default)]
    pub path: String,

    /// Serial baud rate (default: 115200).
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Serial data bits, 5 to 8 (default: 8).
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,

    /// Serial parity (default: "none").
    #[serde(default)]
    pub parity: SerialParity,

    /// Serial stop bits, 1 or 2 (default: 1).
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,

    /// Largest accepted frame in bytes, excluding the terminator (default: 1024).
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Minimum interval between accepted frames in milliseconds (default: 1000).
    #[serde(default = "default_min_interval")]
    pub min_interval_ms: u64,

    /// Delay before reopening a closed path source in milliseconds (default: 1000).
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

fn default_bind() -> String {
    "0.0.0.0:7878".to_string()
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_max_frame_bytes() -> usize {
    1024
}

fn default_min_interval() -> u64 {
    1000
}

fn default_reconnect_delay() -> u64 {
    1000
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            source: InputSource::default(),
            bind: default_bind(),
            path: String::new(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: SerialParity::default(),
            stop_bits: default_stop_bits(),
            max_frame_bytes: default_max_frame_bytes(),
            min_interval_ms: default_min_interval(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

/// Serial parity setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialParity {
    #[default]
    None,
    Even,
    Odd,
}

impl From<SerialParity> for tokio_serial::Parity {
    fn from(parity: SerialParity) -> Self {
        match parity {
            SerialParity::None => tokio_serial::Parity::None,
            SerialParity::Even => tokio_serial::Parity::Even,
            SerialParity::Odd => tokio_serial::Parity::Odd,
        }
    }
}

impl InputConfig {
    /// Port settings for the serial source.
    pub fn serial_builder(&self) -> tokio_serial::SerialPortBuilder {
        let data_bits = match self.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        };
        let stop_bits = match self.stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        };

        tokio_serial::new(&self.path, self.baud_rate)
            .data_bits(data_bits)
            .parity(self.parity.into())
            .stop_bits(stop_bits)
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Address reported in the status payload (default: "192.168.4.1").
    #[serde(default = "default_advertise_ip")]
    pub advertise_ip: String,

    /// Data older than this is considered stale (default: 15000 ms).
    #[serde(default = "default_stale_timeout")]
    pub stale_timeout_ms: u64,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_advertise_ip() -> String {
    "192.168.4.1".to_string()
}

fn default_stale_timeout() -> u64 {
    15_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            advertise_ip: default_advertise_ip(),
            stale_timeout_ms: default_stale_timeout(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: BridgeConfig = suika_common::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = suika_common::parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input.max_frame_bytes == 0 {
            return Err(ConfigError::Validation(
                "max_frame_bytes must be > 0".to_string(),
            ));
        }

        if self.server.stale_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "stale_timeout_ms must be > 0".to_string(),
            ));
        }

        if self.server.listen.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.server.listen
            )));
        }

        if self.server.advertise_ip.parse::<IpAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid advertise_ip: {}",
                self.server.advertise_ip
            )));
        }

        match self.input.source {
            InputSource::Tcp if self.input.bind.parse::<SocketAddr>().is_err() => {
                return Err(ConfigError::Validation(format!(
                    "Invalid input bind address: {}",
                    self.input.bind
                )));
            }
            InputSource::Path | InputSource::Serial if self.input.path.trim().is_empty() => {
                return Err(ConfigError::Validation(format!(
                    "input.path is required for the {} source",
                    self.input.source
                )));
            }
            InputSource::Serial if !(5..=8).contains(&self.input.data_bits) => {
                return Err(ConfigError::Validation(format!(
                    "Invalid data_bits {} (use 5 to 8)",
                    self.input.data_bits
                )));
            }
            InputSource::Serial if !matches!(self.input.stop_bits, 1 | 2) => {
                return Err(ConfigError::Validation(format!(
                    "Invalid stop_bits {} (use 1 or 2)",
                    self.input.stop_bits
                )));
            }
            InputSource::Serial if self.input.baud_rate == 0 => {
                return Err(ConfigError::Validation(
                    "baud_rate must be > 0".to_string(),
                ));
            }
            _ => {}
        }

        Ok(())
    }
}
