use crate::database::engines::data_api::DataApiConfig;
use crate::database::engines::mongodb::MongoConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Which backend serves document-store calls
    #[serde(default)]
    pub backend: BackendKind,

    /// Per-operation deadline in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// HTTP Data API settings, required when `backend = "data_api"`
    #[serde(default)]
    pub data_api: Option<DataApiConfig>,

    /// Native driver settings, required when `backend = "driver"`
    #[serde(default)]
    pub mongodb: Option<MongoConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// MongoDB Atlas Data API over HTTPS
    #[default]
    DataApi,
    /// Official MongoDB driver
    Driver,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::DataApi => f.write_str("data_api"),
            BackendKind::Driver => f.write_str("driver"),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

impl BridgeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check that the selected backend has a complete configuration section
    pub fn validate(&self) -> Result<()> {
        match self.backend {
            BackendKind::DataApi => self
                .data_api
                .as_ref()
                .ok_or_else(|| Error::Config("data_api section is required".to_string()))?
                .validate(),
            BackendKind::Driver => self
                .mongodb
                .as_ref()
                .ok_or_else(|| Error::Config("mongodb section is required".to_string()))?
                .validate(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            timeout_secs: default_timeout_secs(),
            data_api: None,
            mongodb: None,
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (error, warn, info, debug, trace)
    #[serde(default = "default_level")]
    pub level: String,

    /// Console log format
    #[serde(default)]
    pub format: LogFormat,

    /// Write logs to stderr
    #[serde(default = "default_true")]
    pub console: bool,

    /// Optional rolling log file
    #[serde(default)]
    pub file: Option<LogFileConfig>,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            console: true,
            file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    /// Pretty-printed format
    #[default]
    #[serde(rename = "pretty")]
    Pretty,

    /// JSON format
    #[serde(rename = "json")]
    Json,

    /// Compact format
    #[serde(rename = "compact")]
    Compact,
}

/// Rolling log file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFileConfig {
    /// Directory the log files are written to
    pub directory: PathBuf,

    /// File name prefix, e.g. `mongo-bridge.log.2024-05-01`
    #[serde(default = "default_file_prefix")]
    pub prefix: String,

    #[serde(default)]
    pub rotation: RotationStrategy,
}

fn default_file_prefix() -> String {
    "mongo-bridge.log".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationStrategy {
    #[default]
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "hourly")]
    Hourly,
    #[serde(rename = "never")]
    Never,
}
