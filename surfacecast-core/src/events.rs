//! Relay event vocabulary for the passive diagnostic channel
//!
//! Events are broadcast best-effort; a lagging or absent subscriber never
//! affects the relays. No error is surfaced to the embedded collaborator
//! through this channel or any other.

use crate::capability::{BindingMode, TransportStrategy};

/// Events emitted by the publisher and consumer during a session
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// An outbound session started
    StreamStarted {
        /// Channel the session publishes on
        channel_id: String,
        /// Shareable view link, computed before any frame was sent
        view_link: String,
        /// Transport strategy selected for the session
        strategy: TransportStrategy,
    },
    /// An outbound session stopped
    StreamStopped {
        /// Channel the session published on
        channel_id: String,
    },
    /// Zero-copy setup failed and the session switched to software capture
    FallbackEngaged {
        /// Setup failure that triggered the switch
        reason: String,
    },
    /// A frame was posted into the embedded frame
    FramePublished {
        /// Capture timestamp in milliseconds since the Unix epoch
        timestamp_ms: u64,
    },
    /// An inbound stream was bound to a named input source
    SourceBound {
        /// Channel the stream arrived on
        channel_id: String,
        /// How the stream was bound
        mode: BindingMode,
    },
    /// An inbound frame was drawn onto the relay surface
    FrameDrawn {
        /// Channel the frame arrived on
        channel_id: String,
    },
    /// A frame was dropped without being delivered or drawn
    FrameDropped {
        /// Why the frame was dropped
        reason: String,
    },
    /// A channel's embedded frame and auxiliary surface were released
    ChannelReleased {
        /// The released channel
        channel_id: String,
    },
}

impl RelayEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            RelayEvent::StreamStarted { .. } => "stream_started",
            RelayEvent::StreamStopped { .. } => "stream_stopped",
            RelayEvent::FallbackEngaged { .. } => "fallback_engaged",
            RelayEvent::FramePublished { .. } => "frame_published",
            RelayEvent::SourceBound { .. } => "source_bound",
            RelayEvent::FrameDrawn { .. } => "frame_drawn",
            RelayEvent::FrameDropped { .. } => "frame_dropped",
            RelayEvent::ChannelReleased { .. } => "channel_released",
        }
    }

    /// Check if this is a session lifecycle event
    pub fn is_session_event(&self) -> bool {
        matches!(
            self,
            RelayEvent::StreamStarted { .. }
                | RelayEvent::StreamStopped { .. }
                | RelayEvent::FallbackEngaged { .. }
                | RelayEvent::ChannelReleased { .. }
        )
    }

    /// Check if this is a per-frame event
    pub fn is_frame_event(&self) -> bool {
        matches!(
            self,
            RelayEvent::FramePublished { .. }
                | RelayEvent::FrameDrawn { .. }
                | RelayEvent::FrameDropped { .. }
        )
    }
}
