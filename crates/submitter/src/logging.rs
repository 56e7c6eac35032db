//! Process-wide tracing setup.
//!
//! `log` records from the pipeline are forwarded into tracing, so one
//! subscriber formats everything. `RUST_LOG` takes precedence over the
//! configured level.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

use crate::config::LoggingConfig;

static INITIALIZED: OnceLock<()> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("Failed to forward log records to tracing: {0}")]
    SetLogger(#[from] log::SetLoggerError),

    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }

    let filter = build_filter(config)?;

    let (plain, json) = if config.json {
        (None, Some(fmt::layer().json().with_current_span(true)))
    } else {
        (Some(fmt::layer().with_target(true)), None)
    };

    let subscriber = Registry::default().with(filter).with(plain).with(json);

    tracing_log::LogTracer::init()?;
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = INITIALIZED.set(());

    tracing::debug!(level = %config.level, json = config.json, "logging initialised");
    Ok(())
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(&config.level).map_err(|e| LoggingError::InvalidFilter {
        filter: config.level.clone(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_filter_from_config() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "submitter=debug,warn".to_string(),
            json: false,
        };
        assert!(build_filter(&config).is_ok());
    }

    #[test]
    #[serial]
    fn test_invalid_filter() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "submitter=loud".to_string(),
            json: false,
        };
        assert!(matches!(
            build_filter(&config),
            Err(LoggingError::InvalidFilter { .. })
        ));
    }
}
