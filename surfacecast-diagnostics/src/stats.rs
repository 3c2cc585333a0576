//! Relay statistics collected from the event broadcast

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use surfacecast_core::RelayEvent;
use tokio::sync::broadcast;
use tracing::debug;

/// Aggregated counters over a session's relay events
#[derive(Debug, Clone, Default, Serialize)]
pub struct RelaySnapshot {
    /// Outbound sessions started
    pub streams_started: u64,
    /// Outbound sessions stopped
    pub streams_stopped: u64,
    /// One-time software fallbacks engaged
    pub fallbacks_engaged: u64,
    /// Frames posted into embedded frames
    pub frames_published: u64,
    /// Inbound frames drawn onto relay surfaces
    pub frames_drawn: u64,
    /// Frames dropped without delivery or drawing
    pub frames_dropped: u64,
    /// Inbound streams bound to input sources
    pub sources_bound: u64,
    /// Channels released
    pub channels_released: u64,
    /// Events missed because the collector lagged behind the broadcast
    pub missed_events: u64,
    /// When collection started
    pub collecting_since: Option<DateTime<Utc>>,
    /// When the last event was observed
    pub last_event_at: Option<DateTime<Utc>>,
}

/// Collects relay events into a [`RelaySnapshot`]
///
/// Purely passive: the collector subscribes to the event broadcast and
/// counts; it cannot influence the relays. Lag is tolerated and counted.
#[derive(Debug)]
pub struct StatsCollector {
    snapshot: Arc<RwLock<RelaySnapshot>>,
    task: tokio::task::JoinHandle<()>,
}

impl StatsCollector {
    /// Spawn a collector over an event subscription
    pub fn spawn(mut events: broadcast::Receiver<RelayEvent>) -> Self {
        let snapshot = Arc::new(RwLock::new(RelaySnapshot {
            collecting_since: Some(Utc::now()),
            ..RelaySnapshot::default()
        }));
        let shared = Arc::clone(&snapshot);
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let mut snapshot = shared.write();
                        snapshot.last_event_at = Some(Utc::now());
                        match event {
                            RelayEvent::StreamStarted { .. } => snapshot.streams_started += 1,
                            RelayEvent::StreamStopped { .. } => snapshot.streams_stopped += 1,
                            RelayEvent::FallbackEngaged { .. } => snapshot.fallbacks_engaged += 1,
                            RelayEvent::FramePublished { .. } => snapshot.frames_published += 1,
                            RelayEvent::FrameDrawn { .. } => snapshot.frames_drawn += 1,
                            RelayEvent::FrameDropped { .. } => snapshot.frames_dropped += 1,
                            RelayEvent::SourceBound { .. } => snapshot.sources_bound += 1,
                            RelayEvent::ChannelReleased { .. } => {
                                snapshot.channels_released += 1
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        shared.write().missed_events += missed;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("relay event broadcast closed, stats collection ended");
        });
        Self { snapshot, task }
    }

    /// Current counters
    pub fn snapshot(&self) -> RelaySnapshot {
        self.snapshot.read().clone()
    }
}

impl Drop for StatsCollector {
    fn drop(&mut self) {
        self.task.abort();
    }
}
