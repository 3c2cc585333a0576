//! Inbound relay: bind a remote stream to a named engine input source
//!
//! `bind_source` acquires the channel's embedded frame, waits for exactly
//! one readiness message from the frame's own window, and then branches on
//! document access: same-origin binds the playing media element directly,
//! cross-origin relays frames message-by-message into an owned raster
//! surface. Both outcomes are variants of one `BoundSource` type, so the
//! caller never needs to know which branch fired.

use std::sync::Arc;
use surfacecast_core::address::consume_address;
use surfacecast_core::engine::{BoundSource, InputSource, RenderEngine, TextureBinding, TextureParams};
use surfacecast_core::error::CastError;
use surfacecast_core::events::RelayEvent;
use surfacecast_core::host::{EmbeddedFrame, FrameHost, FrameLayout};
use surfacecast_core::protocol::{BoundaryMessage, Envelope};
use surfacecast_core::registry::{ChannelEntry, ChannelState, FrameRegistry};
use surfacecast_core::surface::Surface;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};
use url::Url;

/// Options for an inbound binding
#[derive(Debug, Clone, Default)]
pub struct ConsumeOptions {
    /// Optional room password, passed through opaquely
    pub password: Option<String>,
    /// Parameters for the constructed texture
    pub texture: TextureParams,
}

/// Inbound relay turning remote streams into texture sources
pub struct Consumer {
    host: Arc<dyn FrameHost>,
    engine: Arc<dyn RenderEngine>,
    registry: Arc<FrameRegistry>,
    service: Url,
    events: broadcast::Sender<RelayEvent>,
}

impl Consumer {
    /// Create a consumer operating through the given host and registry
    pub fn new(
        host: Arc<dyn FrameHost>,
        engine: Arc<dyn RenderEngine>,
        registry: Arc<FrameRegistry>,
        service: Url,
        events: broadcast::Sender<RelayEvent>,
    ) -> Self {
        Self {
            host,
            engine,
            registry,
            service,
            events,
        }
    }

    /// Bind the remote stream on `channel_id` to the given input source
    ///
    /// Resolves once the source first becomes available; subsequent updates
    /// happen asynchronously without re-resolving. Binding the same channel
    /// again reuses the existing embedded frame and drawable instead of
    /// opening a second remote connection. A collaborator that never sends
    /// a readiness signal leaves this call pending forever.
    pub async fn bind_source(
        &self,
        source: &Arc<InputSource>,
        channel_id: &str,
        options: ConsumeOptions,
    ) -> Result<BoundSource, CastError> {
        let (width, height) = self.engine.output_surface().dimensions();
        let address = consume_address(&self.service, channel_id, options.password.as_deref());
        let entry = self
            .registry
            .acquire(channel_id, FrameLayout::viewer(width, height), |_| {
                Ok(address)
            })?;

        // Reuse an existing binding for this channel.
        if let Some(bound) = entry.bound() {
            self.apply_binding(source, &bound, &options);
            return Ok(bound);
        }

        let frame = entry.frame();
        let Some(messages) = frame.take_messages() else {
            // Another binder is negotiating this channel; wait for its
            // outcome instead of racing it.
            let bound = self.await_existing_binding(&entry, channel_id).await?;
            self.apply_binding(source, &bound, &options);
            return Ok(bound);
        };

        let bound = self
            .negotiate(&entry, &frame, messages, channel_id)
            .await?;
        entry.set_state(ChannelState::Active);
        self.apply_binding(source, &bound, &options);
        entry.set_bound(bound.clone());
        info!(channel = %channel_id, mode = ?bound.mode(), "inbound stream bound");
        let _ = self.events.send(RelayEvent::SourceBound {
            channel_id: channel_id.to_string(),
            mode: bound.mode(),
        });
        Ok(bound)
    }

    /// Post an on-demand frame request for every stream seen on a channel
    ///
    /// Returns the number of requests posted; zero when the channel is not
    /// live or has not announced any streams.
    pub fn request_frame(&self, channel_id: &str) -> Result<usize, CastError> {
        let Some(entry) = self.registry.get(channel_id) else {
            return Ok(0);
        };
        let stream_ids = entry.stream_ids();
        let frame = entry.frame();
        for stream_id in &stream_ids {
            frame.post(BoundaryMessage::FrameRequest {
                stream_id: stream_id.clone(),
            })?;
        }
        Ok(stream_ids.len())
    }

    async fn await_existing_binding(
        &self,
        entry: &Arc<ChannelEntry>,
        channel_id: &str,
    ) -> Result<BoundSource, CastError> {
        let mut bound_rx = entry.subscribe_bound();
        loop {
            if let Some(bound) = bound_rx.borrow_and_update().clone() {
                return Ok(bound);
            }
            if bound_rx.changed().await.is_err() {
                return Err(CastError::ChannelClosed {
                    channel_id: channel_id.to_string(),
                });
            }
        }
    }

    /// Wait for the readiness signal, then establish the branch
    async fn negotiate(
        &self,
        entry: &Arc<ChannelEntry>,
        frame: &Arc<EmbeddedFrame>,
        mut messages: mpsc::UnboundedReceiver<Envelope>,
        channel_id: &str,
    ) -> Result<BoundSource, CastError> {
        loop {
            let Some(envelope) = messages.recv().await else {
                return Err(CastError::ChannelClosed {
                    channel_id: channel_id.to_string(),
                });
            };
            if envelope.source != frame.token() {
                debug!(channel = %channel_id, "ignoring message from unexpected window");
                continue;
            }
            match envelope.message {
                BoundaryMessage::VideoElementCreated { stream_id } => {
                    if let Some(stream_id) = stream_id {
                        entry.record_stream_id(stream_id);
                    }
                    return self
                        .establish_binding(entry, frame, messages, channel_id)
                        .await;
                }
                BoundaryMessage::Frame { frame: early } => {
                    // No drawing surface exists yet; drop the payload but
                    // still release it so the remote pipeline cannot stall.
                    debug!(channel = %channel_id, "ignoring frame received before readiness");
                    early.release();
                }
                other => {
                    debug!(channel = %channel_id, kind = other.kind(), "ignoring message before readiness");
                }
            }
        }
    }

    async fn establish_binding(
        &self,
        entry: &Arc<ChannelEntry>,
        frame: &Arc<EmbeddedFrame>,
        messages: mpsc::UnboundedReceiver<Envelope>,
        channel_id: &str,
    ) -> Result<BoundSource, CastError> {
        match frame.document() {
            Some(document) => {
                // Same-origin: wait (one-shot mutation watch, not polling)
                // for a playing media element and bind it directly. The
                // frame is hidden, not torn down; it stays attached and
                // active behind the binding.
                debug!(channel = %channel_id, "same-origin document access, waiting for media element");
                let media = document.wait_for_playing_media().await;
                self.host.hide_frame(frame);
                Ok(BoundSource::DirectMedia(media))
            }
            None => {
                // Cross-origin: no document access is possible. Relay
                // frames into an owned surface sized to the local render
                // surface.
                debug!(channel = %channel_id, "cross-origin embedding, relaying frames to a surface");
                self.host.grant_permission(frame, "sendframes");
                let (width, height) = self.engine.output_surface().dimensions();
                let surface = self.host.create_surface(width, height);
                entry.set_surface(surface.clone());
                self.spawn_frame_drain(
                    Arc::clone(entry),
                    surface.clone(),
                    messages,
                    channel_id.to_string(),
                );
                Ok(BoundSource::RasterRelay(surface))
            }
        }
    }

    /// Drain inbound messages for a cross-origin binding
    ///
    /// Frames are drawn in the order their messages arrive; each payload is
    /// released after drawing, regardless of how the draw went.
    fn spawn_frame_drain(
        &self,
        entry: Arc<ChannelEntry>,
        surface: Surface,
        mut messages: mpsc::UnboundedReceiver<Envelope>,
        channel_id: String,
    ) {
        let host = Arc::clone(&self.host);
        let events = self.events.clone();
        tokio::spawn(async move {
            let frame = entry.frame();
            let mut hidden = false;
            while let Some(envelope) = messages.recv().await {
                if envelope.source != frame.token() {
                    debug!(channel = %channel_id, "ignoring message from unexpected window");
                    continue;
                }
                match envelope.message {
                    BoundaryMessage::Frame { frame: video } => {
                        if !hidden {
                            host.hide_frame(&frame);
                            hidden = true;
                        }
                        surface.draw_data(&video.payload());
                        video.release();
                        let _ = events.send(RelayEvent::FrameDrawn {
                            channel_id: channel_id.clone(),
                        });
                    }
                    BoundaryMessage::VideoElementCreated { stream_id } => {
                        if let Some(stream_id) = stream_id {
                            entry.record_stream_id(stream_id);
                        }
                    }
                    other => {
                        debug!(channel = %channel_id, kind = other.kind(), "ignoring unexpected message");
                    }
                }
            }
            debug!(channel = %channel_id, "inbound message channel closed");
        });
    }

    fn apply_binding(
        &self,
        source: &Arc<InputSource>,
        bound: &BoundSource,
        options: &ConsumeOptions,
    ) {
        let drawable = bound.drawable();
        let texture = self.engine.create_texture(&drawable, &options.texture);
        source.bind(TextureBinding {
            drawable,
            dynamic: true,
            texture,
        });
    }
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("service", &self.service.as_str())
            .finish()
    }
}
