//! # Surfacecast Core
//!
//! Frame relay primitives and embedded-frame lifecycle for the Surfacecast
//! system. This crate provides the capability probe, the channel registry,
//! the cross-boundary message vocabulary, and the frame/surface data model
//! the relays are built on.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod capability;
pub mod engine;
pub mod error;
pub mod events;
pub mod frame;
pub mod host;
pub mod protocol;
pub mod registry;
pub mod surface;

// Re-export main types
pub use address::{
    consume_address, parse_service_url, publish_address, view_link, IngestPreset, StreamTarget,
    DEFAULT_SERVICE_URL,
};
pub use capability::{probe, BindingMode, RuntimeCapabilities, TransportStrategy};
pub use engine::{
    BoundSource, Drawable, InputSource, RenderEngine, TextureBinding, TextureFilter,
    TextureHandle, TextureParams,
};
pub use error::CastError;
pub use events::RelayEvent;
pub use frame::{
    unix_timestamp_ms, FrameData, FramePayload, FramePool, RasterImage, VideoFrame,
};
pub use host::loopback::{Collaborator, LoopbackConfig, LoopbackHost, MediaController};
pub use host::{
    EmbeddedDocument, EmbeddedFrame, FrameHost, FrameLayout, FrameProcessor, MediaElement,
};
pub use protocol::{BoundaryMessage, Envelope, WindowToken};
pub use registry::{ChannelEntry, ChannelState, FrameRegistry};
pub use surface::{PixelBuffer, Surface};
