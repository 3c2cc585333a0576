//! Integration tests for the outbound relay
//!
//! Exercises strategy selection, frame-handle release accounting on the
//! success and send-failure paths, the one-time software fallback, view
//! link derivation, and idempotent stop.

use std::sync::Arc;
use std::time::Duration;
use surfacecast_core::*;
use surfacecast_relay::{PublishOptions, Publisher};
use tokio::sync::broadcast;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Minimal render engine handle for tests
struct StubEngine {
    output: Surface,
}

impl StubEngine {
    fn new(width: u32, height: u32) -> Self {
        Self {
            output: Surface::new(width, height),
        }
    }
}

impl RenderEngine for StubEngine {
    fn output_surface(&self) -> Surface {
        self.output.clone()
    }

    fn input_sources(&self) -> Vec<Arc<InputSource>> {
        Vec::new()
    }

    fn create_texture(&self, _drawable: &Drawable, _params: &TextureParams) -> TextureHandle {
        TextureHandle::allocate()
    }
}

struct Harness {
    host: Arc<LoopbackHost>,
    engine: Arc<StubEngine>,
    registry: Arc<FrameRegistry>,
    publisher: Publisher,
    events: broadcast::Sender<RelayEvent>,
}

fn harness(config: LoopbackConfig) -> Harness {
    let host = Arc::new(LoopbackHost::new(config));
    let engine = Arc::new(StubEngine::new(64, 64));
    let registry = Arc::new(FrameRegistry::new(host.clone(), 8));
    let (events, _) = broadcast::channel(256);
    let publisher = Publisher::new(
        host.clone(),
        engine.clone(),
        registry.clone(),
        parse_service_url(DEFAULT_SERVICE_URL).unwrap(),
        events.clone(),
    );
    Harness {
        host,
        engine,
        registry,
        publisher,
        events,
    }
}

fn fast_options() -> PublishOptions {
    PublishOptions {
        width: 64,
        height: 64,
        frame_rate: 60,
        preferred_strategy: None,
        settle_delay: Some(Duration::ZERO),
    }
}

fn direct_target() -> StreamTarget {
    StreamTarget::Direct {
        push: "ABC123".to_string(),
        room: Some("studio".to_string()),
        password: None,
    }
}

async fn wait_for_event(
    rx: &mut broadcast::Receiver<RelayEvent>,
    event_type: &str,
) -> RelayEvent {
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
async fn test_view_link_carries_view_room_and_solo() {
    let h = harness(LoopbackConfig::default());
    let started = h
        .publisher
        .start(direct_target(), fast_options())
        .await
        .unwrap();

    assert_eq!(started.channel_id, "ABC123");
    assert!(started.view_link.contains("view=ABC123"));
    assert!(started.view_link.contains("room=studio"));
    assert!(started.view_link.contains("solo"));
    assert_eq!(h.publisher.view_link(), Some(started.view_link.clone()));

    // Publisher frames are zero-sized and positioned off-screen.
    let frame = h.registry.get("ABC123").unwrap().frame();
    assert!(frame.layout().offscreen);
    assert_eq!((frame.layout().width, frame.layout().height), (0, 0));

    h.publisher.stop().await;
}

#[tokio::test]
async fn test_zero_copy_frames_are_transferred_and_released() {
    let h = harness(LoopbackConfig::default());
    h.engine.output.fill([9, 8, 7, 255]);

    let started = h
        .publisher
        .start(direct_target(), fast_options())
        .await
        .unwrap();
    assert_eq!(started.strategy, TransportStrategy::ZeroCopy);

    let collaborator = h.host.collaborator("ABC123").unwrap();
    for _ in 0..3 {
        let message = timeout(RECV_TIMEOUT, collaborator.next_posted())
            .await
            .unwrap()
            .unwrap();
        match message {
            BoundaryMessage::CanvasFrame {
                frame: FramePayload::Video(data),
                timestamp_ms,
            } => {
                assert_eq!((data.width, data.height), (64, 64));
                assert_eq!(&data.data[..4], &[9, 8, 7, 255]);
                assert!(timestamp_ms.is_some());
            }
            other => panic!("expected a zero-copy canvas frame, got {other:?}"),
        }
    }

    // Every handle the capture loop obtained has been released.
    let pool = h.host.capture_pool().unwrap();
    assert_eq!(pool.produced(), pool.released());
    assert_eq!(pool.leaked(), 0);
    assert_eq!(pool.outstanding(), 0);

    h.publisher.stop().await;
}

#[tokio::test]
async fn test_send_failure_still_releases_every_frame() {
    let h = harness(LoopbackConfig::default());
    let mut events = h.events.subscribe();

    h.publisher
        .start(direct_target(), fast_options())
        .await
        .unwrap();
    wait_for_event(&mut events, "frame_published").await;

    // Tear down the page side; the next post fails.
    let collaborator = h.host.collaborator("ABC123").unwrap();
    collaborator.disconnect().await;
    wait_for_event(&mut events, "frame_dropped").await;

    let pool = h.host.capture_pool().unwrap();
    assert_eq!(pool.produced(), pool.released());
    assert_eq!(pool.leaked(), 0);
    assert_eq!(pool.outstanding(), 0);

    h.publisher.stop().await;
}

#[tokio::test]
async fn test_setup_failure_falls_back_exactly_once_and_keeps_publishing() {
    let h = harness(LoopbackConfig {
        fail_processor_setup: true,
        ..LoopbackConfig::default()
    });
    let mut events = h.events.subscribe();

    let started = h
        .publisher
        .start(direct_target(), fast_options())
        .await
        .unwrap();
    // The capability is present, so zero-copy is still selected up front.
    assert_eq!(started.strategy, TransportStrategy::ZeroCopy);

    wait_for_event(&mut events, "fallback_engaged").await;

    // The session continues on the software path: raster frames keep coming.
    let collaborator = h.host.collaborator("ABC123").unwrap();
    for _ in 0..2 {
        let message = timeout(RECV_TIMEOUT, collaborator.next_posted())
            .await
            .unwrap()
            .unwrap();
        match message {
            BoundaryMessage::CanvasFrame {
                frame: FramePayload::Raster(raster),
                ..
            } => assert_eq!(raster.media_type(), "image/png"),
            other => panic!("expected a raster canvas frame, got {other:?}"),
        }
    }
    assert!(h.publisher.is_active());

    // The fallback is engaged once, never retried.
    let mut fallbacks = 1;
    while let Ok(event) = events.try_recv() {
        if event.event_type() == "fallback_engaged" {
            fallbacks += 1;
        }
    }
    assert_eq!(fallbacks, 1);

    h.publisher.stop().await;
}

#[tokio::test]
async fn test_missing_capability_selects_software_without_fallback_event() {
    let h = harness(LoopbackConfig {
        zero_copy_processor: false,
        ..LoopbackConfig::default()
    });
    let mut events = h.events.subscribe();

    let started = h
        .publisher
        .start(direct_target(), fast_options())
        .await
        .unwrap();
    assert_eq!(started.strategy, TransportStrategy::SoftwareFallback);

    wait_for_event(&mut events, "frame_published").await;
    // Capability absence is not a failure; nothing to recover from.
    let mut saw_fallback = false;
    while let Ok(event) = events.try_recv() {
        if event.event_type() == "fallback_engaged" {
            saw_fallback = true;
        }
    }
    assert!(!saw_fallback);

    h.publisher.stop().await;
}

#[tokio::test]
async fn test_software_preference_overrides_available_zero_copy() {
    let h = harness(LoopbackConfig::default());
    let options = PublishOptions {
        preferred_strategy: Some(TransportStrategy::SoftwareFallback),
        ..fast_options()
    };
    let started = h.publisher.start(direct_target(), options).await.unwrap();
    assert_eq!(started.strategy, TransportStrategy::SoftwareFallback);
    h.publisher.stop().await;
}

#[tokio::test]
async fn test_stop_is_idempotent_and_releases_the_channel() {
    let h = harness(LoopbackConfig::default());

    // Stop before any start is a no-op.
    h.publisher.stop().await;

    h.publisher
        .start(direct_target(), fast_options())
        .await
        .unwrap();
    assert_eq!(h.registry.len(), 1);

    h.publisher.stop().await;
    assert!(!h.publisher.is_active());
    assert_eq!(h.registry.len(), 0);
    assert_eq!(h.host.detach_count(), 1);

    // Second stop: no error, nothing further released.
    h.publisher.stop().await;
    assert_eq!(h.host.detach_count(), 1);
    assert_eq!(h.publisher.view_link(), None);
}

#[tokio::test]
async fn test_start_replaces_active_session() {
    let h = harness(LoopbackConfig::default());

    h.publisher
        .start(direct_target(), fast_options())
        .await
        .unwrap();
    let second = h
        .publisher
        .start(
            StreamTarget::Direct {
                push: "XYZ789".to_string(),
                room: None,
                password: None,
            },
            fast_options(),
        )
        .await
        .unwrap();

    assert_eq!(h.registry.len(), 1);
    assert_eq!(h.publisher.channel_id(), Some("XYZ789".to_string()));
    assert_eq!(second.channel_id, "XYZ789");
    assert_eq!(h.host.detach_count(), 1);

    h.publisher.stop().await;
}

#[tokio::test]
async fn test_ingest_target_generates_a_push_id() {
    let h = harness(LoopbackConfig::default());
    let started = h
        .publisher
        .start(
            StreamTarget::Preset {
                preset: IngestPreset::Twitch,
                token: "tw-token".to_string(),
            },
            fast_options(),
        )
        .await
        .unwrap();

    assert_eq!(started.channel_id.len(), 8);
    assert!(started
        .channel_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric()));
    assert!(started.view_link.contains(&format!("view={}", started.channel_id)));

    let frame = h.registry.get(&started.channel_id).unwrap().frame();
    assert!(frame.address().query().unwrap().contains("whippushtoken=tw-token"));

    h.publisher.stop().await;
}
