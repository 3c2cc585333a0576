//! # Surfacecast: frame relay for embedded viewer frames
//!
//! Surfacecast bridges a locally rendered surface with an externally
//! hosted, sandboxed viewer frame, in either direction:
//!
//! - **Outbound**: capture the render engine's output surface and publish
//!   it into an embedded frame, with a zero-copy capture path and a
//!   software raster fallback.
//! - **Inbound**: consume a remote stream arriving through an embedded
//!   frame and expose it as a texture source on a named engine input,
//!   binding the media element directly under same-origin embedding and
//!   relaying frames into an owned surface otherwise.
//!
//! The embedded page is an opaque collaborator reachable only through an
//! asynchronous message channel; capability probing, strategy selection,
//! and frame resource cleanup all live on this side of the boundary.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use surfacecast::{
//!     LoopbackConfig, LoopbackHost, Surfacecast, FrameHost, RenderEngine,
//! };
//!
//! # async fn example(engine: Arc<dyn RenderEngine>) -> Result<(), surfacecast::CastError> {
//! let host: Arc<dyn FrameHost> = Arc::new(LoopbackHost::new(LoopbackConfig::default()));
//! let cast = Surfacecast::init(engine, host)?;
//!
//! // Publish the render surface under a push id, grouped into a room.
//! let started = cast.stream("my-stream").room("studio").start().await?;
//! println!("share this link: {}", started.view_link);
//!
//! // Bind a remote stream to the first input source.
//! if let Some(source) = cast.engine().input_sources().first() {
//!     cast.bind_source(source, "guest-room", Default::default()).await?;
//! }
//!
//! cast.stop_stream().await;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

use std::sync::Arc;
use tokio::sync::broadcast;

// Re-export core types for easy access
pub use surfacecast_core::{
    consume_address, parse_service_url, probe, publish_address, view_link, BindingMode,
    BoundSource, BoundaryMessage, CastError, ChannelEntry, ChannelState, Collaborator, Drawable,
    EmbeddedDocument, EmbeddedFrame, Envelope, FrameData, FrameHost, FrameLayout, FramePayload,
    FramePool, FrameProcessor, FrameRegistry, IngestPreset, InputSource, LoopbackConfig,
    LoopbackHost, MediaController, MediaElement, PixelBuffer, RasterImage, RelayEvent,
    RenderEngine, RuntimeCapabilities, StreamTarget, Surface, TextureBinding, TextureFilter,
    TextureHandle, TextureParams, TransportStrategy, VideoFrame, WindowToken,
    DEFAULT_SERVICE_URL,
};

pub use surfacecast_relay::{
    encode_raster, ConsumeOptions, Consumer, PublishOptions, Publisher, StartedStream,
    FALLBACK_FRAME_INTERVAL, RASTER_MEDIA_TYPE,
};

#[cfg(feature = "diagnostics")]
pub use surfacecast_diagnostics::{DebugLogger, RelaySnapshot, StatsCollector};

// Public API modules
pub mod config;
pub mod event;
pub mod source;
pub mod stream;

// Re-export main API types
pub use config::GlobalConfig;
pub use event::EventStream;
pub use source::BindStream;
pub use stream::{CastStatus, StreamBuilder};

/// Main entry point for Surfacecast
#[derive(Clone)]
pub struct Surfacecast {
    inner: Arc<SurfacecastInner>,
}

struct SurfacecastInner {
    config: GlobalConfig,
    host: Arc<dyn FrameHost>,
    engine: Arc<dyn RenderEngine>,
    registry: Arc<FrameRegistry>,
    publisher: Publisher,
    consumer: Consumer,
    events: broadcast::Sender<RelayEvent>,
}

impl Surfacecast {
    /// Initialize Surfacecast with default settings
    pub fn init(
        engine: Arc<dyn RenderEngine>,
        host: Arc<dyn FrameHost>,
    ) -> Result<Self, CastError> {
        Self::init_with(engine, host, GlobalConfig::default())
    }

    /// Initialize with custom global configuration
    pub fn init_with(
        engine: Arc<dyn RenderEngine>,
        host: Arc<dyn FrameHost>,
        config: GlobalConfig,
    ) -> Result<Self, CastError> {
        #[cfg(feature = "diagnostics")]
        if config.debug_logging {
            // A subscriber installed elsewhere wins; that is fine.
            let _ = DebugLogger::init_logging();
        }

        let service = parse_service_url(&config.service_url)?;
        let (events, _) = broadcast::channel(256);
        let registry = Arc::new(FrameRegistry::new(Arc::clone(&host), config.max_channels));
        let publisher = Publisher::new(
            Arc::clone(&host),
            Arc::clone(&engine),
            Arc::clone(&registry),
            service.clone(),
            events.clone(),
        );
        let consumer = Consumer::new(
            Arc::clone(&host),
            Arc::clone(&engine),
            Arc::clone(&registry),
            service,
            events.clone(),
        );

        Ok(Self {
            inner: Arc::new(SurfacecastInner {
                config,
                host,
                engine,
                registry,
                publisher,
                consumer,
                events,
            }),
        })
    }

    /// Capabilities of the host environment
    pub fn capabilities(&self) -> RuntimeCapabilities {
        probe(self.inner.host.as_ref())
    }

    /// Create a stream builder publishing under the given push id
    pub fn stream(&self, push_id: &str) -> StreamBuilder {
        StreamBuilder::new(self, push_id)
    }

    /// Start an outbound session; convenience entry point
    pub async fn start_stream(
        &self,
        target: StreamTarget,
        options: PublishOptions,
    ) -> Result<StartedStream, CastError> {
        self.inner.publisher.start(target, options).await
    }

    /// Stop the outbound session; convenience entry point
    ///
    /// Safe to call multiple times and when no session is active.
    pub async fn stop_stream(&self) {
        self.inner.publisher.stop().await;
    }

    /// Bind a remote stream to a named input source
    pub async fn bind_source(
        &self,
        source: &Arc<InputSource>,
        channel_id: &str,
        options: ConsumeOptions,
    ) -> Result<BoundSource, CastError> {
        self.inner.consumer.bind_source(source, channel_id, options).await
    }

    /// Post an on-demand frame request for every stream seen on a channel
    pub fn request_frame(&self, channel_id: &str) -> Result<usize, CastError> {
        self.inner.consumer.request_frame(channel_id)
    }

    /// Current session status
    pub fn status(&self) -> CastStatus {
        CastStatus {
            streaming: self.inner.publisher.is_active(),
            channel_id: self.inner.publisher.channel_id(),
            view_link: self.inner.publisher.view_link(),
        }
    }

    /// View link of the active outbound session, if any
    pub fn view_link(&self) -> Option<String> {
        self.inner.publisher.view_link()
    }

    /// Subscribe to relay events
    pub fn events(&self) -> EventStream {
        EventStream::new(self.inner.events.subscribe())
    }

    /// Sender side of the relay event broadcast
    pub fn event_sender(&self) -> broadcast::Sender<RelayEvent> {
        self.inner.events.clone()
    }

    /// The render engine handle this instance operates on
    pub fn engine(&self) -> &Arc<dyn RenderEngine> {
        &self.inner.engine
    }

    /// The channel registry owned by this instance
    pub fn registry(&self) -> &Arc<FrameRegistry> {
        &self.inner.registry
    }

    /// Global configuration this instance was initialized with
    pub fn config(&self) -> &GlobalConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for Surfacecast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surfacecast")
            .field("config", &self.inner.config)
            .field("channels", &self.inner.registry.len())
            .field("streaming", &self.inner.publisher.is_active())
            .finish()
    }
}
