//! Structured debug logging system

use surfacecast_core::CastError;
use tracing_subscriber::EnvFilter;

/// Debug logger for structured logging
#[derive(Debug)]
pub struct DebugLogger;

impl DebugLogger {
    /// Initialize the logging system
    ///
    /// Respects `RUST_LOG` when set; defaults to `debug` otherwise. Fails
    /// if another subscriber is already installed.
    pub fn init_logging() -> Result<(), CastError> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| CastError::Initialization {
                reason: e.to_string(),
            })
    }
}
