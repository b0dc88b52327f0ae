//! Layered configuration: defaults, TOML file, environment

pub mod loader;
pub mod types;

pub use loader::{ConfigLoader, ENV_PREFIX};
pub use types::{
    BackendKind, BridgeConfig, LogFileConfig, LogFormat, LoggingConfig, RotationStrategy,
};
