//! Host environment seam
//!
//! Everything the relays need from the surrounding visible environment goes
//! through [`FrameHost`]: attaching and detaching embedded frames, hiding
//! them (a presentation concern, never a teardown), creating auxiliary
//! raster surfaces, and opening the zero-copy frame processor when the
//! runtime has one. The subsystem never removes host elements it did not
//! create.
//!
//! [`LoopbackHost`](loopback::LoopbackHost) is the in-tree implementation:
//! an in-process environment whose attached frames are driven by
//! programmable collaborator handles standing in for the embedded page.

use crate::error::CastError;
use crate::frame::VideoFrame;
use crate::protocol::{BoundaryMessage, Envelope, WindowToken};
use crate::surface::Surface;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use url::Url;
use uuid::Uuid;

pub mod loopback;

/// Layout and permission set of an attached frame element
#[derive(Debug, Clone)]
pub struct FrameLayout {
    /// Element width in pixels
    pub width: u32,
    /// Element height in pixels
    pub height: u32,
    /// Whether the element is positioned out of view from the start
    pub offscreen: bool,
    /// Feature-policy grants requested for the frame
    pub allow: Vec<String>,
}

const BASE_PERMISSIONS: [&str; 5] = [
    "camera",
    "microphone",
    "fullscreen",
    "display-capture",
    "autoplay",
];

impl FrameLayout {
    /// Zero-sized off-screen layout used by the publisher
    pub fn publisher() -> Self {
        Self {
            width: 0,
            height: 0,
            offscreen: true,
            allow: BASE_PERMISSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Viewer layout sized to the local render surface
    pub fn viewer(width: u32, height: u32) -> Self {
        let mut allow: Vec<String> = BASE_PERMISSIONS.iter().map(|s| s.to_string()).collect();
        allow.push("cross-origin-isolated".to_string());
        Self {
            width,
            height,
            offscreen: false,
            allow,
        }
    }
}

/// Handle to an attached embedded frame
///
/// Owns the two ends of the cross-boundary channel: `post` sends into the
/// frame's content window, and `take_messages` hands out the (single)
/// receiver for everything the environment delivers back, tagged with the
/// posting window's token.
#[derive(Debug)]
pub struct EmbeddedFrame {
    channel: String,
    address: Url,
    token: WindowToken,
    layout: FrameLayout,
    hidden: AtomicBool,
    outbound: mpsc::UnboundedSender<BoundaryMessage>,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<Envelope>>>,
    document: Option<EmbeddedDocument>,
}

impl EmbeddedFrame {
    /// Construct a frame handle; called by [`FrameHost`] implementations
    pub fn new(
        channel: impl Into<String>,
        address: Url,
        layout: FrameLayout,
        token: WindowToken,
        outbound: mpsc::UnboundedSender<BoundaryMessage>,
        inbound: mpsc::UnboundedReceiver<Envelope>,
        document: Option<EmbeddedDocument>,
    ) -> Self {
        Self {
            channel: channel.into(),
            address,
            token,
            layout,
            hidden: AtomicBool::new(false),
            outbound,
            inbound: Mutex::new(Some(inbound)),
            document,
        }
    }

    /// Channel this frame was attached for
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Fully qualified address the frame was loaded from
    pub fn address(&self) -> &Url {
        &self.address
    }

    /// Window token messages from this frame carry
    pub fn token(&self) -> WindowToken {
        self.token
    }

    /// Layout the frame was attached with
    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Post a message into the frame's content window
    pub fn post(&self, message: BoundaryMessage) -> Result<(), CastError> {
        self.outbound
            .send(message)
            .map_err(|_| CastError::ChannelClosed {
                channel_id: self.channel.clone(),
            })
    }

    /// Take the receiver of messages delivered by the environment
    ///
    /// Returns `None` after the first call; exactly one listener drives a
    /// frame's message stream.
    pub fn take_messages(&self) -> Option<mpsc::UnboundedReceiver<Envelope>> {
        self.inbound.lock().take()
    }

    /// Document handle, present only under same-origin embedding
    pub fn document(&self) -> Option<&EmbeddedDocument> {
        self.document.as_ref()
    }

    /// Whether the frame is currently hidden
    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::Relaxed)
    }

    /// Record the frame's hidden state; called by host implementations
    pub fn set_hidden(&self, hidden: bool) {
        self.hidden.store(hidden, Ordering::Relaxed);
    }
}

/// Same-origin view into the embedded frame's document
#[derive(Debug, Clone)]
pub struct EmbeddedDocument {
    media: watch::Receiver<Option<MediaElement>>,
}

impl EmbeddedDocument {
    /// Construct a document handle from a media-element watch
    pub fn new(media: watch::Receiver<Option<MediaElement>>) -> Self {
        Self { media }
    }

    /// Suspend until a media element exists and is playing
    ///
    /// A one-shot mutation watch, not polling. A document that never
    /// produces a playing element leaves the wait pending forever; that is
    /// the contract, not a bug.
    pub async fn wait_for_playing_media(&self) -> MediaElement {
        let mut media_rx = self.media.clone();
        loop {
            let current = media_rx.borrow_and_update().clone();
            if let Some(media) = current {
                let mut playing = media.playing.clone();
                loop {
                    if *playing.borrow_and_update() {
                        return media;
                    }
                    if playing.changed().await.is_err() {
                        // Element went away before playing; go back to
                        // watching the document.
                        break;
                    }
                }
            }
            if media_rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// A playable media element inside a same-origin embedded document
#[derive(Debug, Clone)]
pub struct MediaElement {
    id: Uuid,
    playing: watch::Receiver<bool>,
}

impl MediaElement {
    /// Construct a media element handle around a playback-state watch
    pub fn new(playing: watch::Receiver<bool>) -> Self {
        Self {
            id: Uuid::new_v4(),
            playing,
        }
    }

    /// Stable identity of the element
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the element is currently playing
    pub fn is_playing(&self) -> bool {
        *self.playing.borrow()
    }
}

impl PartialEq for MediaElement {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MediaElement {}

/// The visible environment the relays operate in
pub trait FrameHost: Send + Sync {
    /// Whether the runtime exposes a zero-copy frame-processing primitive
    fn has_zero_copy_processor(&self) -> bool;

    /// Attach an embedded frame element loading the given address
    fn attach_frame(
        &self,
        channel: &str,
        address: &Url,
        layout: FrameLayout,
    ) -> Result<Arc<EmbeddedFrame>, CastError>;

    /// Detach a previously attached frame
    fn detach_frame(&self, frame: &EmbeddedFrame);

    /// Hide a frame visually; it stays attached and active
    fn hide_frame(&self, frame: &EmbeddedFrame);

    /// Extend a frame's feature-policy grants after attach
    fn grant_permission(&self, frame: &EmbeddedFrame, permission: &str);

    /// Create and attach an auxiliary raster surface
    fn create_surface(&self, width: u32, height: u32) -> Surface;

    /// Detach an auxiliary surface created by `create_surface`
    fn remove_surface(&self, surface: &Surface);

    /// Open a zero-copy frame processor over a surface at the given rate
    ///
    /// Fails when the primitive is absent or refuses to initialize; the
    /// caller is expected to fall back to software capture.
    fn open_frame_processor(
        &self,
        surface: &Surface,
        frame_rate: u32,
    ) -> Result<Box<dyn FrameProcessor>, CastError>;
}

impl fmt::Debug for dyn FrameHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameHost")
            .field("has_zero_copy_processor", &self.has_zero_copy_processor())
            .finish()
    }
}

/// Live capture stream yielding zero-copy frames
#[async_trait]
pub trait FrameProcessor: Send {
    /// Suspend until the next captured frame, or `None` when the stream ends
    async fn next_frame(&mut self) -> Option<VideoFrame>;
}
