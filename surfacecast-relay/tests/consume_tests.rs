//! Integration tests for the inbound relay
//!
//! Exercises the readiness handshake, the same-origin and cross-origin
//! binding branches, draw/release accounting per received frame, origin
//! filtering, early-frame handling, and binding reuse.

use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use surfacecast_core::*;
use surfacecast_relay::{ConsumeOptions, Consumer};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Minimal render engine handle for tests
struct StubEngine {
    output: Surface,
    sources: Vec<Arc<InputSource>>,
    textures_created: AtomicU64,
}

impl StubEngine {
    fn new(width: u32, height: u32) -> Self {
        Self {
            output: Surface::new(width, height),
            sources: (0..4)
                .map(|index| Arc::new(InputSource::new(format!("s{index}"), index)))
                .collect(),
            textures_created: AtomicU64::new(0),
        }
    }
}

impl RenderEngine for StubEngine {
    fn output_surface(&self) -> Surface {
        self.output.clone()
    }

    fn input_sources(&self) -> Vec<Arc<InputSource>> {
        self.sources.clone()
    }

    fn create_texture(&self, _drawable: &Drawable, _params: &TextureParams) -> TextureHandle {
        self.textures_created.fetch_add(1, Ordering::Relaxed);
        TextureHandle::allocate()
    }
}

struct Harness {
    host: Arc<LoopbackHost>,
    engine: Arc<StubEngine>,
    registry: Arc<FrameRegistry>,
    consumer: Arc<Consumer>,
    events: broadcast::Sender<RelayEvent>,
}

fn harness(config: LoopbackConfig) -> Harness {
    let host = Arc::new(LoopbackHost::new(config));
    let engine = Arc::new(StubEngine::new(32, 32));
    let registry = Arc::new(FrameRegistry::new(host.clone(), 8));
    let (events, _) = broadcast::channel(256);
    let consumer = Arc::new(Consumer::new(
        host.clone(),
        engine.clone(),
        registry.clone(),
        parse_service_url(DEFAULT_SERVICE_URL).unwrap(),
        events.clone(),
    ));
    Harness {
        host,
        engine,
        registry,
        consumer,
        events,
    }
}

impl Harness {
    /// Start a bind in the background and return its handle
    fn spawn_bind(
        &self,
        source: &Arc<InputSource>,
        channel: &str,
    ) -> JoinHandle<Result<BoundSource, CastError>> {
        let consumer = self.consumer.clone();
        let source = source.clone();
        let channel = channel.to_string();
        tokio::spawn(async move {
            consumer
                .bind_source(&source, &channel, ConsumeOptions::default())
                .await
        })
    }

    /// Wait until the bind has attached the channel's frame
    async fn collaborator(&self, channel: &str) -> Arc<Collaborator> {
        timeout(RECV_TIMEOUT, async {
            loop {
                if let Some(collaborator) = self.host.collaborator(channel) {
                    return collaborator;
                }
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("frame never attached")
    }
}

fn test_frame_data() -> FrameData {
    FrameData {
        data: Bytes::from(vec![5u8; 32 * 32 * 4]),
        width: 32,
        height: 32,
        timestamp_ms: 7,
    }
}

async fn wait_for_event(rx: &mut broadcast::Receiver<RelayEvent>, event_type: &str) -> RelayEvent {
    timeout(RECV_TIMEOUT, async {
        loop {
            match rx.recv().await {
                Ok(event) if event.event_type() == event_type => return event,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {event_type}"))
}

#[tokio::test]
async fn test_same_origin_binds_the_playing_media_element() {
    let h = harness(LoopbackConfig {
        same_origin: true,
        ..LoopbackConfig::default()
    });
    let source = h.engine.source("s0").unwrap();
    let bind = h.spawn_bind(&source, "room1");

    let collaborator = h.collaborator("room1").await;
    collaborator.announce_video_element(None);
    let media = collaborator.create_media_element().unwrap();
    media.set_playing(true);

    let bound = timeout(RECV_TIMEOUT, bind).await.unwrap().unwrap().unwrap();
    match &bound {
        BoundSource::DirectMedia(element) => assert_eq!(*element, media.element()),
        other => panic!("expected a direct media binding, got {other:?}"),
    }

    // The texture source was mutated in place: live drawable, dynamic flag.
    let binding = source.binding().unwrap();
    assert!(binding.dynamic);
    assert_eq!(binding.drawable, Drawable::Media(media.element()));

    // Hidden is presentation only; the frame stays attached and active.
    let entry = h.registry.get("room1").unwrap();
    let layout = entry.frame().layout().clone();
    assert!(!layout.offscreen);
    assert_eq!((layout.width, layout.height), (32, 32));
    assert!(layout.allow.iter().any(|p| p == "cross-origin-isolated"));
    assert!(entry.frame().is_hidden());
    assert_eq!(h.host.hide_count(), 1);
    assert_eq!(h.host.detach_count(), 0);
    assert_eq!(entry.state(), ChannelState::Active);
}

#[tokio::test]
async fn test_cross_origin_draws_and_releases_each_frame() {
    let h = harness(LoopbackConfig::default());
    let source = h.engine.source("s0").unwrap();
    let mut events = h.events.subscribe();
    let bind = h.spawn_bind(&source, "room1");

    let collaborator = h.collaborator("room1").await;
    collaborator.announce_video_element(Some("stream-a"));

    let bound = timeout(RECV_TIMEOUT, bind).await.unwrap().unwrap().unwrap();
    let surface = match &bound {
        BoundSource::RasterRelay(surface) => surface.clone(),
        other => panic!("expected a raster relay binding, got {other:?}"),
    };

    // Owned surface sized to the local render surface, attached as an
    // auxiliary element, bound before any frame arrived.
    assert_eq!(surface.dimensions(), (32, 32));
    assert_eq!(h.host.surface_count(), 1);
    assert_eq!(surface.draw_count(), 0);
    assert!(source.binding().unwrap().dynamic);

    // The frame-sending grant was requested after the branch was known.
    let granted = h.host.granted_permissions();
    assert!(granted.iter().any(|(_, permission)| permission == "sendframes"));

    for sent in 1..=3u64 {
        let video = collaborator.frame(test_frame_data()).await;
        collaborator.send_video_frame(video).unwrap();
        wait_for_event(&mut events, "frame_drawn").await;
        assert_eq!(surface.draw_count(), sent);
        assert_eq!(collaborator.pool().released(), sent);
        assert_eq!(collaborator.pool().leaked(), 0);
    }

    // Hidden once content started flowing.
    assert!(h.registry.get("room1").unwrap().frame().is_hidden());
    // The drawn pixels are the ones the collaborator sent.
    assert_eq!(&surface.snapshot().data[..4], &[5, 5, 5, 5]);
}

#[tokio::test]
async fn test_frames_before_readiness_are_ignored_but_released() {
    let h = harness(LoopbackConfig::default());
    let source = h.engine.source("s0").unwrap();
    let bind = h.spawn_bind(&source, "room1");

    let collaborator = h.collaborator("room1").await;
    let early = collaborator.frame(test_frame_data()).await;
    collaborator.send_video_frame(early).unwrap();
    collaborator.announce_video_element(Some("stream-a"));

    let bound = timeout(RECV_TIMEOUT, bind).await.unwrap().unwrap().unwrap();
    let surface = match bound {
        BoundSource::RasterRelay(surface) => surface,
        other => panic!("expected a raster relay binding, got {other:?}"),
    };

    // The early frame was not drawn, but its payload was released.
    assert_eq!(surface.draw_count(), 0);
    assert_eq!(collaborator.pool().released(), 1);
    assert_eq!(collaborator.pool().leaked(), 0);
}

#[tokio::test]
async fn test_messages_from_unexpected_windows_are_ignored() {
    let h = harness(LoopbackConfig::default());
    let source = h.engine.source("s0").unwrap();
    let mut events = h.events.subscribe();
    let bind = h.spawn_bind(&source, "room1");

    let collaborator = h.collaborator("room1").await;
    // A readiness signal from some other window must not establish the
    // branch.
    collaborator.send_foreign(BoundaryMessage::VideoElementCreated {
        stream_id: Some("intruder".to_string()),
    });
    sleep(Duration::from_millis(20)).await;
    assert!(!bind.is_finished());

    collaborator.announce_video_element(Some("stream-a"));
    let bound = timeout(RECV_TIMEOUT, bind).await.unwrap().unwrap().unwrap();
    let surface = match bound {
        BoundSource::RasterRelay(surface) => surface,
        other => panic!("expected a raster relay binding, got {other:?}"),
    };

    // A foreign frame message is not drawn either.
    collaborator.send_foreign(BoundaryMessage::FrameRequest {
        stream_id: "x".to_string(),
    });
    let video = collaborator.frame(test_frame_data()).await;
    collaborator.send_video_frame(video).unwrap();
    wait_for_event(&mut events, "frame_drawn").await;
    assert_eq!(surface.draw_count(), 1);

    // Only the frame's own stream id was recorded.
    let entry = h.registry.get("room1").unwrap();
    assert_eq!(entry.stream_ids(), vec!["stream-a".to_string()]);
}

#[tokio::test]
async fn test_sequential_binds_share_one_embedded_frame() {
    let h = harness(LoopbackConfig::default());
    let first_source = h.engine.source("s0").unwrap();
    let bind = h.spawn_bind(&first_source, "room1");

    let collaborator = h.collaborator("room1").await;
    collaborator.announce_video_element(Some("stream-a"));
    let first = timeout(RECV_TIMEOUT, bind).await.unwrap().unwrap().unwrap();

    // Second bind to the same channel: no second attach, same drawable.
    let second_source = h.engine.source("s1").unwrap();
    let second = h
        .consumer
        .bind_source(&second_source, "room1", ConsumeOptions::default())
        .await
        .unwrap();

    assert_eq!(h.host.attach_count(), 1);
    assert_eq!(first, second);
    assert!(first_source.is_bound());
    assert!(second_source.is_bound());
    // Each source still gets its own texture.
    assert_eq!(h.engine.textures_created.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn test_concurrent_binds_resolve_from_one_negotiation() {
    let h = harness(LoopbackConfig::default());
    let first_source = h.engine.source("s0").unwrap();
    let second_source = h.engine.source("s1").unwrap();

    let first_bind = h.spawn_bind(&first_source, "room1");
    let collaborator = h.collaborator("room1").await;
    let second_bind = h.spawn_bind(&second_source, "room1");
    sleep(Duration::from_millis(10)).await;

    collaborator.announce_video_element(None);

    let (first, second) = timeout(
        RECV_TIMEOUT,
        futures::future::join(first_bind, second_bind),
    )
    .await
    .unwrap();
    let first = first.unwrap().unwrap();
    let second = second.unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(h.host.attach_count(), 1);
}

#[tokio::test]
async fn test_bind_stays_pending_without_readiness_signal() {
    let h = harness(LoopbackConfig::default());
    let source = h.engine.source("s0").unwrap();
    let bind = h.spawn_bind(&source, "room1");

    h.collaborator("room1").await;
    // No readiness signal: the contract stays unresolved. Accepted
    // limitation, not an error.
    sleep(Duration::from_millis(100)).await;
    assert!(!bind.is_finished());
    bind.abort();
}

#[tokio::test]
async fn test_request_frame_posts_one_request_per_stream() {
    let h = harness(LoopbackConfig::default());
    let source = h.engine.source("s0").unwrap();
    let bind = h.spawn_bind(&source, "room1");

    let collaborator = h.collaborator("room1").await;
    collaborator.announce_video_element(Some("stream-a"));
    timeout(RECV_TIMEOUT, bind).await.unwrap().unwrap().unwrap();

    // A second stream announced after binding is recorded by the drain.
    collaborator.announce_video_element(Some("stream-b"));
    timeout(RECV_TIMEOUT, async {
        while h.registry.get("room1").unwrap().stream_ids().len() < 2 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let posted = h.consumer.request_frame("room1").unwrap();
    assert_eq!(posted, 2);
    for expected in ["stream-a", "stream-b"] {
        let message = timeout(RECV_TIMEOUT, collaborator.next_posted())
            .await
            .unwrap()
            .unwrap();
        match message {
            BoundaryMessage::FrameRequest { stream_id } => assert_eq!(stream_id, expected),
            other => panic!("expected a frame request, got {other:?}"),
        }
    }

    // Requesting on a channel that was never bound is a no-op.
    assert_eq!(h.consumer.request_frame("absent").unwrap(), 0);
}
