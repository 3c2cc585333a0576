//! Configuration types and defaults

use surfacecast_core::DEFAULT_SERVICE_URL;

/// Global Surfacecast configuration
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    /// Enable debug logging
    pub debug_logging: bool,
    /// Base URL of the embedded viewer service
    pub service_url: String,
    /// Maximum number of concurrent channels
    pub max_channels: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            debug_logging: false,
            service_url: DEFAULT_SERVICE_URL.to_string(),
            max_channels: 8,
        }
    }
}
