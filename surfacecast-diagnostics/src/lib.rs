//! # Surfacecast Diagnostics
//!
//! Passive diagnostics for the Surfacecast relays: structured logging
//! bootstrap and an event-driven statistics collector. Nothing in this
//! crate feeds back into relay behavior; a lagging or absent collector
//! never affects a session.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod debug_logger;
pub mod stats;

// Re-export main types
pub use debug_logger::DebugLogger;
pub use stats::{RelaySnapshot, StatsCollector};
