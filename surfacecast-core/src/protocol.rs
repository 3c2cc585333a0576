//! Cross-boundary message vocabulary
//!
//! The embedded page is reachable only through an untyped, asynchronous
//! message channel; this module is the typed vocabulary both relays speak
//! over it. Delivery is best-effort: no acknowledgments, no retries, and
//! ordering is advisory. Every message carries the window token of the
//! sending frame so listeners can discard messages from unexpected windows.

use crate::frame::{FramePayload, VideoFrame};
use uuid::Uuid;

/// Opaque identity of an embedded frame's window
///
/// Stands in for the content-window identity a message listener compares
/// against before trusting a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowToken(Uuid);

impl WindowToken {
    /// Allocate a fresh window token
    pub fn allocate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Messages exchanged with the embedded page
///
/// `kind` returns the wire tag each variant travels under.
#[derive(Debug)]
pub enum BoundaryMessage {
    /// Outbound frame data published into the embedded frame
    CanvasFrame {
        /// Transferred frame contents or a compressed raster encoding
        frame: FramePayload,
        /// Capture timestamp in milliseconds since the Unix epoch
        timestamp_ms: Option<u64>,
    },
    /// Readiness signal: the page has a playable or requestable video source
    VideoElementCreated {
        /// Remote stream the video element belongs to, when known
        stream_id: Option<String>,
    },
    /// Inbound frame data, used only on the cross-origin relay path
    Frame {
        /// Zero-copy frame handle; the receiver must release it after drawing
        frame: VideoFrame,
    },
    /// On-demand request for a single frame of a remote stream
    FrameRequest {
        /// Remote stream to request a frame from
        stream_id: String,
    },
}

impl BoundaryMessage {
    /// Wire tag of this message
    pub fn kind(&self) -> &'static str {
        match self {
            BoundaryMessage::CanvasFrame { .. } => "canvas-frame",
            BoundaryMessage::VideoElementCreated { .. } => "video-element-created",
            BoundaryMessage::Frame { .. } => "frame",
            BoundaryMessage::FrameRequest { .. } => "get-video-frame",
        }
    }
}

/// A message together with the window it came from
#[derive(Debug)]
pub struct Envelope {
    /// Window the message was posted from
    pub source: WindowToken,
    /// The message itself
    pub message: BoundaryMessage,
}
