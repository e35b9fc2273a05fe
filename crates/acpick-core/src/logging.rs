//! Logging setup.
//!
//! Logs go to stderr, and optionally to a file under `${ACPICK_HOME}/logs`.
//! `ACPICK_LOG` takes precedence over the configured level; `-v` flags raise
//! the configured level.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::config::{LoggingConfig, paths};

pub const LOG_ENV: &str = "ACPICK_LOG";

/// Resolves the effective filter directive.
pub fn filter_directive(config: &LoggingConfig, verbosity: u8) -> String {
    if let Ok(value) = std::env::var(LOG_ENV)
        && !value.trim().is_empty()
    {
        return value;
    }
    match verbosity {
        0 => config.level.clone(),
        1 => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Installs the global subscriber.
///
/// Keep the returned guard alive until exit; dropping it flushes the file
/// writer.
pub fn init(config: &LoggingConfig, verbosity: u8) -> Result<Option<WorkerGuard>> {
    let directive = filter_directive(config, verbosity);
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter '{directive}'"))?;

    let (file_layer, guard) = match config.file.as_deref() {
        Some(name) => {
            let dir = paths::logs_dir();
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("create log dir {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(&dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init()
        .context("install tracing subscriber")?;

    Ok(guard)
}
