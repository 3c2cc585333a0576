//! # Surfacecast Relay
//!
//! The two frame relays of the Surfacecast system: the publisher captures
//! the local render surface and transports frames into an embedded viewer
//! frame, the consumer turns a remote stream arriving through an embedded
//! frame into a texture source for the local render pipeline. Both select a
//! transport strategy once per session from the probed runtime
//! capabilities and fall back gracefully when the preferred primitive is
//! unavailable.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod consume;
pub mod publish;
pub mod raster;

// Re-export main types
pub use consume::{ConsumeOptions, Consumer};
pub use publish::{PublishOptions, Publisher, StartedStream, FALLBACK_FRAME_INTERVAL};
pub use raster::{encode_raster, RASTER_MEDIA_TYPE};
