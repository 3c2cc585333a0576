//! Outbound relay: publish the local render surface into an embedded frame
//!
//! `start` derives the view link first, attaches the channel's embedded
//! frame through the registry, waits out a fixed settling delay (the
//! publish direction has no readiness signal), selects a transport
//! strategy, and spawns the capture loop. The zero-copy loop releases every
//! frame handle exactly once, on success and on send failure; a setup
//! failure switches the session to the software loop once and is never
//! retried.

use crate::raster::encode_raster;
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use surfacecast_core::address::{publish_address, view_link, StreamTarget};
use surfacecast_core::capability::{probe, TransportStrategy};
use surfacecast_core::engine::RenderEngine;
use surfacecast_core::error::CastError;
use surfacecast_core::events::RelayEvent;
use surfacecast_core::frame::{unix_timestamp_ms, FramePayload, VideoFrame};
use surfacecast_core::host::{EmbeddedFrame, FrameHost, FrameLayout};
use surfacecast_core::protocol::BoundaryMessage;
use surfacecast_core::registry::{ChannelState, FrameRegistry};
use surfacecast_core::surface::Surface;
use tokio::sync::{broadcast, watch};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};
use url::Url;

/// Fixed cadence of the software capture loop
///
/// Independent of the configured frame rate and intentionally coarser; the
/// degraded rate is the expected cost of the fallback.
pub const FALLBACK_FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Settling delay after attaching a direct-mode frame
const DIRECT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Settling delay after attaching an ingest-mode frame
const INGEST_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Options for an outbound session
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Composite surface width in pixels
    pub width: u32,
    /// Composite surface height in pixels
    pub height: u32,
    /// Capture rate for the zero-copy path, frames per second
    pub frame_rate: u32,
    /// Preferred transport strategy; zero-copy still requires the capability
    pub preferred_strategy: Option<TransportStrategy>,
    /// Override the per-mode settling delay
    pub settle_delay: Option<Duration>,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frame_rate: 30,
            preferred_strategy: None,
            settle_delay: None,
        }
    }
}

/// Result of starting an outbound session
#[derive(Debug, Clone)]
pub struct StartedStream {
    /// Channel the session publishes on
    pub channel_id: String,
    /// Shareable view link, computed before any frame was sent
    pub view_link: String,
    /// Transport strategy selected for the session
    pub strategy: TransportStrategy,
}

struct ActiveStream {
    channel_id: String,
    view_link: String,
    stop_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

/// Outbound relay for the local render surface
pub struct Publisher {
    host: Arc<dyn FrameHost>,
    engine: Arc<dyn RenderEngine>,
    registry: Arc<FrameRegistry>,
    service: Url,
    events: broadcast::Sender<RelayEvent>,
    active: Mutex<Option<ActiveStream>>,
}

impl Publisher {
    /// Create a publisher operating through the given host and registry
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
            active: Mutex::new(None),
        }
    }

    /// Start publishing to the given target
    ///
    /// Starting while a session is active replaces the previous session.
    pub async fn start(
        &self,
        target: StreamTarget,
        options: PublishOptions,
    ) -> Result<StartedStream, CastError> {
        if self.is_active() {
            debug!("replacing active outbound session");
            self.stop().await;
        }

        let channel_id = match target.push_id() {
            Some(push) => push.to_string(),
            None => generate_push_id(),
        };
        let (room, password) = match &target {
            StreamTarget::Direct { room, password, .. } => {
                (room.as_deref(), password.as_deref())
            }
            _ => (None, None),
        };

        // The link is shared out-of-band, so derive it before any channel
        // activity.
        let view_link = view_link(&self.service, &channel_id, room, password);

        let address = publish_address(&self.service, &target);
        let entry = self
            .registry
            .acquire(&channel_id, FrameLayout::publisher(), |_| Ok(address))?;

        // No readiness signal exists in the publish direction; give the
        // embedded page a fixed settling delay instead.
        let settle = options.settle_delay.unwrap_or(if target.is_ingest() {
            INGEST_SETTLE_DELAY
        } else {
            DIRECT_SETTLE_DELAY
        });
        sleep(settle).await;

        let capabilities = probe(self.host.as_ref());
        let strategy = TransportStrategy::select(&capabilities, options.preferred_strategy);
        entry.set_state(ChannelState::Active);

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_capture(
            Arc::clone(&self.host),
            Arc::clone(&self.engine),
            entry.frame(),
            strategy,
            options,
            self.events.clone(),
            stop_rx,
        ));

        *self.active.lock() = Some(ActiveStream {
            channel_id: channel_id.clone(),
            view_link: view_link.clone(),
            stop_tx,
            task,
        });

        info!(channel = %channel_id, ?strategy, "outbound session started");
        let _ = self.events.send(RelayEvent::StreamStarted {
            channel_id: channel_id.clone(),
            view_link: view_link.clone(),
            strategy,
        });

        Ok(StartedStream {
            channel_id,
            view_link,
            strategy,
        })
    }

    /// Stop the active session, if any
    ///
    /// Safe to call multiple times and at any point in the lifecycle.
    pub async fn stop(&self) {
        let Some(active) = self.active.lock().take() else {
            return;
        };
        let _ = active.stop_tx.send(true);
        let _ = active.task.await;
        self.registry.release(&active.channel_id);
        info!(channel = %active.channel_id, "outbound session stopped");
        let _ = self.events.send(RelayEvent::StreamStopped {
            channel_id: active.channel_id.clone(),
        });
        let _ = self.events.send(RelayEvent::ChannelReleased {
            channel_id: active.channel_id,
        });
    }

    /// Whether a session is currently active
    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// View link of the active session, if any
    pub fn view_link(&self) -> Option<String> {
        self.active.lock().as_ref().map(|active| active.view_link.clone())
    }

    /// Channel id of the active session, if any
    pub fn channel_id(&self) -> Option<String> {
        self.active
            .lock()
            .as_ref()
            .map(|active| active.channel_id.clone())
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("service", &self.service.as_str())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Generate a random 8-character alphanumeric push id
fn generate_push_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}

async fn run_capture(
    host: Arc<dyn FrameHost>,
    engine: Arc<dyn RenderEngine>,
    frame: Arc<EmbeddedFrame>,
    strategy: TransportStrategy,
    options: PublishOptions,
    events: broadcast::Sender<RelayEvent>,
    mut stop_rx: watch::Receiver<bool>,
) {
    match strategy {
        TransportStrategy::ZeroCopy => {
            if let Err(error) =
                run_zero_copy(&host, &engine, &frame, &options, &events, &mut stop_rx).await
            {
                // One-time silent recovery: the software loop carries the
                // rest of the session, and zero-copy is not retried.
                warn!(%error, "zero-copy capture setup failed, switching to software capture");
                let _ = events.send(RelayEvent::FallbackEngaged {
                    reason: error.to_string(),
                });
                run_software(&engine, &frame, &options, &events, &mut stop_rx).await;
            }
        }
        TransportStrategy::SoftwareFallback => {
            run_software(&engine, &frame, &options, &events, &mut stop_rx).await;
        }
    }
}

/// Zero-copy capture loop
///
/// Returns `Err` only for setup failures; once frames are flowing the loop
/// ends through `stop`, stream end, or a closed boundary channel.
async fn run_zero_copy(
    host: &Arc<dyn FrameHost>,
    engine: &Arc<dyn RenderEngine>,
    frame: &Arc<EmbeddedFrame>,
    options: &PublishOptions,
    events: &broadcast::Sender<RelayEvent>,
    stop_rx: &mut watch::Receiver<bool>,
) -> Result<(), CastError> {
    let composite = Surface::new(options.width, options.height);
    let mut processor = host.open_frame_processor(&composite, options.frame_rate)?;

    let output = engine.output_surface();
    let period = Duration::from_secs_f64(1.0 / f64::from(options.frame_rate.max(1)));
    let mut redraw = interval(period);
    redraw.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(
        width = options.width,
        height = options.height,
        frame_rate = options.frame_rate,
        "zero-copy capture loop running"
    );

    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            _ = redraw.tick() => {
                composite.draw_surface(&output);
            }
            captured = processor.next_frame() => {
                let Some(video) = captured else {
                    debug!("capture stream ended");
                    break;
                };
                if !publish_frame(frame, video, events) {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Post one zero-copy frame and release its handle
///
/// The handle is released on every path: after a successful send and after
/// a send failure alike. Returns `false` when the boundary channel is gone.
fn publish_frame(
    frame: &EmbeddedFrame,
    video: VideoFrame,
    events: &broadcast::Sender<RelayEvent>,
) -> bool {
    let timestamp_ms = video.timestamp_ms();
    let message = BoundaryMessage::CanvasFrame {
        frame: FramePayload::Video(video.payload()),
        timestamp_ms: Some(timestamp_ms),
    };
    let result = frame.post(message);
    video.release();
    match result {
        Ok(()) => {
            let _ = events.send(RelayEvent::FramePublished { timestamp_ms });
            true
        }
        Err(error) => {
            debug!(%error, "dropping frame, boundary channel closed");
            let _ = events.send(RelayEvent::FrameDropped {
                reason: error.to_string(),
            });
            false
        }
    }
}

/// Software capture loop at the fixed fallback cadence
async fn run_software(
    engine: &Arc<dyn RenderEngine>,
    frame: &Arc<EmbeddedFrame>,
    options: &PublishOptions,
    events: &broadcast::Sender<RelayEvent>,
    stop_rx: &mut watch::Receiver<bool>,
) {
    let composite = Surface::new(options.width, options.height);
    let output = engine.output_surface();
    let mut ticker = interval(FALLBACK_FRAME_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("software capture loop running at the fallback rate");

    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                composite.draw_surface(&output);
                let raster = match encode_raster(&composite.snapshot()) {
                    Ok(raster) => raster,
                    Err(error) => {
                        warn!(%error, "raster encode failed, dropping frame");
                        let _ = events.send(RelayEvent::FrameDropped {
                            reason: error.to_string(),
                        });
                        continue;
                    }
                };
                let timestamp_ms = unix_timestamp_ms();
                let message = BoundaryMessage::CanvasFrame {
                    frame: FramePayload::Raster(raster),
                    timestamp_ms: Some(timestamp_ms),
                };
                if let Err(error) = frame.post(message) {
                    debug!(%error, "dropping frame, boundary channel closed");
                    let _ = events.send(RelayEvent::FrameDropped {
                        reason: error.to_string(),
                    });
                    break;
                }
                let _ = events.send(RelayEvent::FramePublished { timestamp_ms });
            }
        }
    }
}
