//! Error types for Surfacecast

use thiserror::Error;

/// Main error type for Surfacecast operations
#[derive(Error, Debug)]
pub enum CastError {
    /// Initialization error
    #[error("Initialization failed: {reason}")]
    Initialization {
        /// Reason for initialization failure
        reason: String,
    },

    /// Missing configuration error
    #[error("Missing required configuration: {field}")]
    MissingConfiguration {
        /// Missing configuration field
        field: String,
    },

    /// Invalid address error
    #[error("Invalid address: {reason}")]
    InvalidAddress {
        /// Reason the address could not be built or parsed
        reason: String,
    },

    /// Channel limit exceeded
    #[error("Channel limit ({limit}) exceeded")]
    ChannelLimit {
        /// Maximum number of concurrent channels allowed
        limit: usize,
    },

    /// Embedded frame could not be attached
    #[error("Failed to attach embedded frame for channel {channel_id}: {reason}")]
    Attach {
        /// Channel the frame was being attached for
        channel_id: String,
        /// Reason the attach failed
        reason: String,
    },

    /// Cross-boundary channel is closed
    #[error("Message channel closed for channel {channel_id}")]
    ChannelClosed {
        /// Channel whose message channel closed
        channel_id: String,
    },

    /// Zero-copy capture setup failed
    #[error("Capture setup failed: {reason}")]
    CaptureSetup {
        /// Reason the frame processor could not be opened
        reason: String,
    },

    /// Raster encoding failed
    #[error("Raster encoding failed: {reason}")]
    Encode {
        /// Reason the surface could not be encoded
        reason: String,
    },

    /// Invalid state error
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },
}

impl CastError {
    /// Get error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            CastError::Initialization { .. } => "INITIALIZATION_FAILED",
            CastError::MissingConfiguration { .. } => "MISSING_CONFIGURATION",
            CastError::InvalidAddress { .. } => "INVALID_ADDRESS",
            CastError::ChannelLimit { .. } => "CHANNEL_LIMIT_EXCEEDED",
            CastError::Attach { .. } => "ATTACH_FAILED",
            CastError::ChannelClosed { .. } => "CHANNEL_CLOSED",
            CastError::CaptureSetup { .. } => "CAPTURE_SETUP_FAILED",
            CastError::Encode { .. } => "ENCODE_FAILED",
            CastError::InvalidState { .. } => "INVALID_STATE",
        }
    }
}
