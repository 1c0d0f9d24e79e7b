//! Tracing subscriber setup.
//!
//! Orchestration code emits `tracing` events and spans; persistence code uses
//! `log` macros, which `tracing_log::LogTracer` forwards into the same
//! subscriber.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggingConfig};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("A global subscriber is already installed")]
    AlreadyInitialized,
}

/// Filter from `RUST_LOG` when set, otherwise from the configured level.
fn build_env_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let directives = format!("{},sqlx=warn,sea_orm=warn,hyper=warn,reqwest=warn", level);
    EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter {
        filter: directives,
        reason: e.to_string(),
    })
}

fn fmt_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(true)
            .boxed(),
    }
}

/// Installs the global subscriber. Call once, at startup.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_env_filter(&config.level)?;

    let subscriber = Registry::default().with(fmt_layer(config.format)).with(filter);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    // Bridge `log` records; a logger installed by the host is left in place.
    if tracing_log::LogTracer::init().is_err() {
        tracing::debug!("log bridge not installed, a logger is already set");
    }

    Ok(())
}
