use super::types::BridgeConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use std::path::PathBuf;

/// Environment variable prefix, e.g. `MONGO_BRIDGE_DATA_API__APP_ID`
pub const ENV_PREFIX: &str = "MONGO_BRIDGE";

/// Configuration loader with builder pattern
///
/// Layers, later ones winning: built-in defaults, a TOML file, then
/// environment variables.
pub struct ConfigLoader {
    config_file: Option<PathBuf>,
    load_env: bool,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            config_file: None,
            load_env: false,
        }
    }

    /// Load configuration from file. Without a path, `mongo-bridge.toml` and
    /// `config/mongo-bridge.toml` are tried.
    pub fn load_from_file(mut self, path: Option<impl Into<PathBuf>>) -> Self {
        self.config_file = path.map(Into::into);
        self
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> Result<BridgeConfig> {
        let mut builder =
            Config::builder().add_source(Config::try_from(&BridgeConfig::default())?);

        if let Some(config_path) = &self.config_file {
            // An explicit file must exist
            builder = builder.add_source(File::from(config_path.as_path()).required(true));
        } else {
            // Try to load from standard locations
            builder = builder
                .add_source(File::with_name("mongo-bridge").required(false))
                .add_source(File::with_name("config/mongo-bridge").required(false));
        }

        if self.load_env {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        let config: BridgeConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
