//! In-process host environment with programmable collaborators
//!
//! Each attached frame is wired to a [`Collaborator`] handle that plays the
//! embedded page: tests and demos read what the relay posted, announce
//! readiness, send frames back, and (under same-origin configuration)
//! create playable media elements. The zero-copy processor is an interval
//! capture over the target surface, backed by a bounded [`FramePool`] so
//! unreleased frames stall capture exactly like the real primitive.

use super::{
    EmbeddedDocument, EmbeddedFrame, FrameHost, FrameLayout, FrameProcessor, MediaElement,
};
use crate::error::CastError;
use crate::frame::{unix_timestamp_ms, FrameData, FramePool, VideoFrame};
use crate::protocol::{BoundaryMessage, Envelope, WindowToken};
use crate::surface::Surface;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::debug;
use url::Url;

/// Configuration of the loopback environment
#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    /// Report the zero-copy frame processor as available
    pub zero_copy_processor: bool,
    /// Attach frames with same-origin document access
    pub same_origin: bool,
    /// Make `open_frame_processor` fail, as a broken runtime primitive would
    pub fail_processor_setup: bool,
    /// Capture slots per frame pool
    pub capture_slots: usize,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            zero_copy_processor: true,
            same_origin: false,
            fail_processor_setup: false,
            capture_slots: 4,
        }
    }
}

/// In-process [`FrameHost`] implementation
pub struct LoopbackHost {
    config: LoopbackConfig,
    collaborators: RwLock<HashMap<String, Arc<Collaborator>>>,
    surfaces: RwLock<Vec<Surface>>,
    grants: RwLock<Vec<(WindowToken, String)>>,
    capture_pool: RwLock<Option<FramePool>>,
    attach_events: AtomicU64,
    detach_events: AtomicU64,
    hide_events: AtomicU64,
}

impl LoopbackHost {
    /// Create a loopback host with the given configuration
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            config,
            collaborators: RwLock::new(HashMap::new()),
            surfaces: RwLock::new(Vec::new()),
            grants: RwLock::new(Vec::new()),
            capture_pool: RwLock::new(None),
            attach_events: AtomicU64::new(0),
            detach_events: AtomicU64::new(0),
            hide_events: AtomicU64::new(0),
        }
    }

    /// The collaborator driving a channel's attached frame
    pub fn collaborator(&self, channel: &str) -> Option<Arc<Collaborator>> {
        self.collaborators.read().get(channel).cloned()
    }

    /// Number of frame attach events observed
    pub fn attach_count(&self) -> u64 {
        self.attach_events.load(Ordering::Relaxed)
    }

    /// Number of frame detach events observed
    pub fn detach_count(&self) -> u64 {
        self.detach_events.load(Ordering::Relaxed)
    }

    /// Number of frame hide events observed
    pub fn hide_count(&self) -> u64 {
        self.hide_events.load(Ordering::Relaxed)
    }

    /// Auxiliary surfaces currently attached
    pub fn surface_count(&self) -> usize {
        self.surfaces.read().len()
    }

    /// Permissions granted to frames after attach
    pub fn granted_permissions(&self) -> Vec<(WindowToken, String)> {
        self.grants.read().clone()
    }

    /// Pool backing the most recently opened frame processor
    pub fn capture_pool(&self) -> Option<FramePool> {
        self.capture_pool.read().clone()
    }
}

impl FrameHost for LoopbackHost {
    fn has_zero_copy_processor(&self) -> bool {
        self.config.zero_copy_processor
    }

    fn attach_frame(
        &self,
        channel: &str,
        address: &Url,
        layout: FrameLayout,
    ) -> Result<Arc<EmbeddedFrame>, CastError> {
        let token = WindowToken::allocate();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        let (document, media_tx) = if self.config.same_origin {
            let (media_tx, media_rx) = watch::channel(None);
            (Some(EmbeddedDocument::new(media_rx)), Some(media_tx))
        } else {
            (None, None)
        };

        let frame = Arc::new(EmbeddedFrame::new(
            channel,
            address.clone(),
            layout,
            token,
            out_tx,
            in_rx,
            document,
        ));
        let collaborator = Arc::new(Collaborator {
            channel: channel.to_string(),
            token,
            into_page: Mutex::new(out_rx),
            from_page: in_tx,
            media_tx,
            pool: FramePool::new(self.config.capture_slots),
        });
        self.collaborators
            .write()
            .insert(channel.to_string(), collaborator);
        self.attach_events.fetch_add(1, Ordering::Relaxed);
        debug!(channel = %channel, address = %address, "loopback frame attached");
        Ok(frame)
    }

    fn detach_frame(&self, frame: &EmbeddedFrame) {
        self.collaborators.write().remove(frame.channel());
        self.detach_events.fetch_add(1, Ordering::Relaxed);
        debug!(channel = %frame.channel(), "loopback frame detached");
    }

    fn hide_frame(&self, frame: &EmbeddedFrame) {
        frame.set_hidden(true);
        self.hide_events.fetch_add(1, Ordering::Relaxed);
    }

    fn grant_permission(&self, frame: &EmbeddedFrame, permission: &str) {
        self.grants
            .write()
            .push((frame.token(), permission.to_string()));
    }

    fn create_surface(&self, width: u32, height: u32) -> Surface {
        let surface = Surface::new(width, height);
        self.surfaces.write().push(surface.clone());
        surface
    }

    fn remove_surface(&self, surface: &Surface) {
        self.surfaces
            .write()
            .retain(|attached| attached.id() != surface.id());
    }

    fn open_frame_processor(
        &self,
        surface: &Surface,
        frame_rate: u32,
    ) -> Result<Box<dyn FrameProcessor>, CastError> {
        if self.config.fail_processor_setup {
            return Err(CastError::CaptureSetup {
                reason: "frame processor unavailable in this runtime".to_string(),
            });
        }
        let pool = FramePool::new(self.config.capture_slots);
        *self.capture_pool.write() = Some(pool.clone());
        let period = Duration::from_secs_f64(1.0 / f64::from(frame_rate.max(1)));
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Ok(Box::new(LoopbackProcessor {
            surface: surface.clone(),
            ticker,
            pool,
        }))
    }
}

struct LoopbackProcessor {
    surface: Surface,
    ticker: Interval,
    pool: FramePool,
}

#[async_trait]
impl FrameProcessor for LoopbackProcessor {
    async fn next_frame(&mut self) -> Option<VideoFrame> {
        self.ticker.tick().await;
        let mut data = self.surface.snapshot();
        data.timestamp_ms = unix_timestamp_ms();
        Some(self.pool.frame(data).await)
    }
}

/// Driver handle for the embedded-page side of a loopback frame
pub struct Collaborator {
    channel: String,
    token: WindowToken,
    into_page: Mutex<mpsc::UnboundedReceiver<BoundaryMessage>>,
    from_page: mpsc::UnboundedSender<Envelope>,
    media_tx: Option<watch::Sender<Option<MediaElement>>>,
    pool: FramePool,
}

impl Collaborator {
    /// Channel this collaborator serves
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Window token messages from this collaborator carry
    pub fn token(&self) -> WindowToken {
        self.token
    }

    /// Pool backing frames this collaborator sends to the relay
    pub fn pool(&self) -> &FramePool {
        &self.pool
    }

    /// Receive the next message the relay posted into the page
    pub async fn next_posted(&self) -> Option<BoundaryMessage> {
        self.into_page.lock().await.recv().await
    }

    /// Receive an already-posted message without waiting
    pub fn try_posted(&self) -> Option<BoundaryMessage> {
        self.into_page.try_lock().ok()?.try_recv().ok()
    }

    /// Close the page side of the channel, as a torn-down page would
    ///
    /// Subsequent posts from the relay fail with a closed-channel error.
    pub async fn disconnect(&self) {
        self.into_page.lock().await.close();
    }

    /// Announce that a video element or requestable stream exists
    pub fn announce_video_element(&self, stream_id: Option<&str>) {
        let _ = self.from_page.send(Envelope {
            source: self.token,
            message: BoundaryMessage::VideoElementCreated {
                stream_id: stream_id.map(|id| id.to_string()),
            },
        });
    }

    /// Mint a zero-copy frame from this collaborator's pool
    pub async fn frame(&self, data: FrameData) -> VideoFrame {
        self.pool.frame(data).await
    }

    /// Send a frame to the relay, as the page does on the cross-origin path
    pub fn send_video_frame(&self, frame: VideoFrame) -> Result<(), CastError> {
        self.from_page
            .send(Envelope {
                source: self.token,
                message: BoundaryMessage::Frame { frame },
            })
            .map_err(|returned| {
                if let BoundaryMessage::Frame { frame } = returned.0.message {
                    frame.release();
                }
                CastError::ChannelClosed {
                    channel_id: self.channel.clone(),
                }
            })
    }

    /// Deliver a message tagged with a foreign window token
    ///
    /// Stands in for a message from some unrelated window that listeners
    /// must ignore.
    pub fn send_foreign(&self, message: BoundaryMessage) {
        let _ = self.from_page.send(Envelope {
            source: WindowToken::allocate(),
            message,
        });
    }

    /// Create a media element in the embedded document
    ///
    /// Returns `None` unless the host was configured for same-origin
    /// embedding.
    pub fn create_media_element(&self) -> Option<MediaController> {
        let media_tx = self.media_tx.as_ref()?;
        let (playing_tx, playing_rx) = watch::channel(false);
        let element = MediaElement::new(playing_rx);
        let _ = media_tx.send(Some(element.clone()));
        Some(MediaController {
            element,
            playing: playing_tx,
        })
    }
}

/// Playback control over a loopback media element
pub struct MediaController {
    element: MediaElement,
    playing: watch::Sender<bool>,
}

impl MediaController {
    /// The controlled media element
    pub fn element(&self) -> MediaElement {
        self.element.clone()
    }

    /// Flip the element's playing state
    pub fn set_playing(&self, playing: bool) {
        let _ = self.playing.send(playing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attach(host: &LoopbackHost, channel: &str) -> Arc<EmbeddedFrame> {
        host.attach_frame(
            channel,
            &Url::parse("https://example.invalid/?room=test").unwrap(),
            FrameLayout::publisher(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_posted_messages_reach_collaborator() {
        let host = LoopbackHost::new(LoopbackConfig::default());
        let frame = attach(&host, "room1");
        let collaborator = host.collaborator("room1").unwrap();

        frame
            .post(BoundaryMessage::FrameRequest {
                stream_id: "s1".to_string(),
            })
            .unwrap();
        let message = collaborator.next_posted().await.unwrap();
        assert_eq!(message.kind(), "get-video-frame");
    }

    #[tokio::test]
    async fn test_collaborator_messages_carry_frame_token() {
        let host = LoopbackHost::new(LoopbackConfig::default());
        let frame = attach(&host, "room1");
        let collaborator = host.collaborator("room1").unwrap();
        collaborator.announce_video_element(Some("s1"));

        let mut messages = frame.take_messages().unwrap();
        let envelope = messages.recv().await.unwrap();
        assert_eq!(envelope.source, frame.token());
        assert_eq!(envelope.message.kind(), "video-element-created");
    }

    #[tokio::test]
    async fn test_processor_capture_stalls_without_release() {
        let host = LoopbackHost::new(LoopbackConfig {
            capture_slots: 1,
            ..LoopbackConfig::default()
        });
        let surface = Surface::new(2, 2);
        let mut processor = host.open_frame_processor(&surface, 60).unwrap();

        let first = processor.next_frame().await.unwrap();
        let pool = host.capture_pool().unwrap();
        assert_eq!(pool.outstanding(), 1);

        // With the single slot held, the next capture cannot complete.
        let stalled =
            tokio::time::timeout(Duration::from_millis(50), processor.next_frame()).await;
        assert!(stalled.is_err());

        first.release();
        let second = tokio::time::timeout(Duration::from_millis(200), processor.next_frame())
            .await
            .expect("capture resumes after release")
            .unwrap();
        second.release();
        assert_eq!(pool.released(), 2);
    }

    #[tokio::test]
    async fn test_same_origin_media_element_creation() {
        let host = LoopbackHost::new(LoopbackConfig {
            same_origin: true,
            ..LoopbackConfig::default()
        });
        let frame = attach(&host, "room1");
        let collaborator = host.collaborator("room1").unwrap();

        let controller = collaborator.create_media_element().unwrap();
        controller.set_playing(true);

        let document = frame.document().expect("same-origin document access");
        let media = document.wait_for_playing_media().await;
        assert_eq!(media, controller.element());
    }
}
