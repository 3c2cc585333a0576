//! Embedded-frame registry
//!
//! One registry instance owns every live embedded frame, keyed by channel.
//! Acquisition is creation-or-reuse: asking for a channel that already has
//! a frame returns the existing entry instead of attaching a second one.
//! The registry is created at subsystem init with its host injected and is
//! passed to the relays by reference; there is no ambient global state.

use crate::engine::BoundSource;
use crate::error::CastError;
use crate::host::{EmbeddedFrame, FrameHost, FrameLayout};
use crate::surface::Surface;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};
use url::Url;

/// Connection state of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No entry exists for the channel
    Uninitialized,
    /// Frame attached, waiting on readiness or settle
    Negotiating,
    /// Frames are flowing
    Active,
    /// Entry released
    Closed,
}

/// Registry entry owning one channel's frame and auxiliary resources
///
/// The embedded frame, the optional raster surface, and the bound drawable
/// are exclusively owned by this entry; no two relays hold a live handle
/// for the same channel at the same time.
#[derive(Debug)]
pub struct ChannelEntry {
    channel: String,
    frame: Arc<EmbeddedFrame>,
    state: RwLock<ChannelState>,
    surface: RwLock<Option<Surface>>,
    stream_ids: RwLock<Vec<String>>,
    bound: watch::Sender<Option<BoundSource>>,
}

impl ChannelEntry {
    fn new(channel: &str, frame: Arc<EmbeddedFrame>) -> Self {
        let (bound, _) = watch::channel(None);
        Self {
            channel: channel.to_string(),
            frame,
            state: RwLock::new(ChannelState::Negotiating),
            surface: RwLock::new(None),
            stream_ids: RwLock::new(Vec::new()),
            bound,
        }
    }

    /// Channel this entry belongs to
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The channel's embedded frame
    pub fn frame(&self) -> Arc<EmbeddedFrame> {
        Arc::clone(&self.frame)
    }

    /// Current connection state
    pub fn state(&self) -> ChannelState {
        *self.state.read()
    }

    /// Record a state transition
    pub fn set_state(&self, state: ChannelState) {
        *self.state.write() = state;
    }

    /// Auxiliary raster surface, when one was created for this channel
    pub fn surface(&self) -> Option<Surface> {
        self.surface.read().clone()
    }

    /// Attach an auxiliary surface to this channel
    pub fn set_surface(&self, surface: Surface) {
        *self.surface.write() = Some(surface);
    }

    /// Remote stream ids announced on this channel so far
    pub fn stream_ids(&self) -> Vec<String> {
        self.stream_ids.read().clone()
    }

    /// Record a remote stream id announced by a readiness message
    pub fn record_stream_id(&self, stream_id: String) {
        let mut ids = self.stream_ids.write();
        if !ids.contains(&stream_id) {
            ids.push(stream_id);
        }
    }

    /// Drawable the channel's inbound stream is bound to, if any
    pub fn bound(&self) -> Option<BoundSource> {
        self.bound.borrow().clone()
    }

    /// Publish the bound drawable to waiting binders
    pub fn set_bound(&self, bound: BoundSource) {
        let _ = self.bound.send(Some(bound));
    }

    /// Watch for the bound drawable; used by concurrent binders
    pub fn subscribe_bound(&self) -> watch::Receiver<Option<BoundSource>> {
        self.bound.subscribe()
    }
}

/// Registry of live embedded frames, keyed by channel id
pub struct FrameRegistry {
    host: Arc<dyn FrameHost>,
    channels: DashMap<String, Arc<ChannelEntry>>,
    max_channels: usize,
}

impl FrameRegistry {
    /// Create a registry operating through the given host
    pub fn new(host: Arc<dyn FrameHost>, max_channels: usize) -> Self {
        Self {
            host,
            channels: DashMap::new(),
            max_channels,
        }
    }

    /// Return the existing entry for `channel_id`, or attach a new frame
    ///
    /// `configure` maps the channel id to a fully qualified address with
    /// protocol query parameters; it is only invoked when a frame is
    /// actually created. Idempotent with respect to the channel id.
    pub fn acquire(
        &self,
        channel_id: &str,
        layout: FrameLayout,
        configure: impl FnOnce(&str) -> Result<Url, CastError>,
    ) -> Result<Arc<ChannelEntry>, CastError> {
        if !self.channels.contains_key(channel_id) && self.channels.len() >= self.max_channels {
            return Err(CastError::ChannelLimit {
                limit: self.max_channels,
            });
        }
        match self.channels.entry(channel_id.to_string()) {
            Entry::Occupied(existing) => {
                debug!(channel = %channel_id, "reusing embedded frame");
                Ok(Arc::clone(existing.get()))
            }
            Entry::Vacant(vacant) => {
                let address = configure(channel_id)?;
                let frame = self.host.attach_frame(channel_id, &address, layout)?;
                info!(channel = %channel_id, address = %address, "attached embedded frame");
                let entry = Arc::new(ChannelEntry::new(channel_id, frame));
                vacant.insert(Arc::clone(&entry));
                Ok(entry)
            }
        }
    }

    /// Entry for a channel, if one is live
    pub fn get(&self, channel_id: &str) -> Option<Arc<ChannelEntry>> {
        self.channels
            .get(channel_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Detach and discard a channel's frame and auxiliary surface
    ///
    /// Safe to call when the channel is absent; that is a no-op.
    pub fn release(&self, channel_id: &str) {
        if let Some((_, entry)) = self.channels.remove(channel_id) {
            entry.set_state(ChannelState::Closed);
            if let Some(surface) = entry.surface() {
                self.host.remove_surface(&surface);
            }
            self.host.detach_frame(&entry.frame());
            debug!(channel = %channel_id, "released channel");
        }
    }

    /// Connection state of a channel; `Uninitialized` when absent
    pub fn state(&self, channel_id: &str) -> ChannelState {
        self.channels
            .get(channel_id)
            .map(|entry| entry.state())
            .unwrap_or(ChannelState::Uninitialized)
    }

    /// Number of live channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether no channels are live
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl std::fmt::Debug for FrameRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRegistry")
            .field("channels", &self.channels.len())
            .field("max_channels", &self.max_channels)
            .finish()
    }
}
