//! Structured logging setup.
//!
//! The library itself only emits `tracing` events; binaries and tests call
//! [`init_logging`] once to install a subscriber. `RUST_LOG` takes precedence
//! over the configured level.

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber built from `config`.
///
/// # Errors
/// Returns `ProtocolError::ConfigError` if a global subscriber is already set
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed
        .map_err(|e| ProtocolError::ConfigError(format!("Failed to install subscriber: {e}")))?;

    info!(app = %config.app_name, level = %config.log_level, "Logging initialized");
    Ok(())
}
