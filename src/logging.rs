//! Tracing subscriber setup for the `mongo-bridge` binary
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the application, which calls [`init`] once at startup.

use crate::config::{LogFileConfig, LogFormat, LoggingConfig, RotationStrategy};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber
///
/// `RUST_LOG`, when set, takes precedence over `config.level`. The returned
/// guard flushes the file writer on drop and must be kept alive for the
/// lifetime of the program.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.console {
        layers.push(console_layer(config.format));
    }

    let mut guard = None;
    if let Some(file) = &config.file {
        let (layer, file_guard) = file_layer(file)?;
        layers.push(layer);
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(build_filter(&config.level))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!(level = %config.level, format = ?config.format, "Logging initialized");
    Ok(guard)
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn console_layer(format: LogFormat) -> BoxedLayer {
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    match format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

/// JSON lines to a rolling file
fn file_layer(config: &LogFileConfig) -> Result<(BoxedLayer, WorkerGuard)> {
    ensure_log_dir(&config.directory)?;

    let appender = match config.rotation {
        RotationStrategy::Daily => rolling::daily(&config.directory, &config.prefix),
        RotationStrategy::Hourly => rolling::hourly(&config.directory, &config.prefix),
        RotationStrategy::Never => rolling::never(&config.directory, &config.prefix),
    };
    let (writer, guard) = non_blocking(appender);

    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .json()
        .boxed();

    Ok((layer, guard))
}

fn ensure_log_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    }
    Ok(())
}
