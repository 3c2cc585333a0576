//! Runtime capability probing and transport strategy selection
//!
//! The probe is a pure function of the host environment: absence of the
//! zero-copy frame processor is a normal outcome, not a failure. Strategy
//! selection happens exactly once per session, at stream start.

use crate::host::FrameHost;
use serde::{Deserialize, Serialize};

/// Capabilities observed in the current runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeCapabilities {
    /// Whether the host exposes a zero-copy frame-processing primitive
    pub has_zero_copy_processor: bool,
}

/// Probe the host environment for frame-capture capabilities
///
/// Pure and synchronous; no side effects and no error conditions.
pub fn probe(host: &dyn FrameHost) -> RuntimeCapabilities {
    RuntimeCapabilities {
        has_zero_copy_processor: host.has_zero_copy_processor(),
    }
}

/// Outbound transport strategy, selected once per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportStrategy {
    /// Per-frame zero-copy handles from the host's frame processor
    ZeroCopy,
    /// Timer-driven raster capture at a fixed, coarser rate
    SoftwareFallback,
}

impl TransportStrategy {
    /// Select the strategy for a session from the probed capabilities
    ///
    /// A caller preference for the software path is always honored; the
    /// zero-copy path can only be chosen when the capability is present.
    pub fn select(
        capabilities: &RuntimeCapabilities,
        preferred: Option<TransportStrategy>,
    ) -> TransportStrategy {
        match preferred {
            Some(TransportStrategy::SoftwareFallback) => TransportStrategy::SoftwareFallback,
            _ if capabilities.has_zero_copy_processor => TransportStrategy::ZeroCopy,
            _ => TransportStrategy::SoftwareFallback,
        }
    }
}

/// How an inbound stream ended up bound to the render pipeline
///
/// The two-state outcome of the readiness handshake: either the embedded
/// document was reachable and handed over a live media element, or frames
/// are relayed message-by-message into an owned raster surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingMode {
    /// Live media element bound directly (same-origin document access)
    DirectMedia,
    /// Owned raster surface redrawn per received frame (cross-origin)
    RasterRelay,
}
