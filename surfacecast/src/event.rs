//! Relay event stream

use surfacecast_core::RelayEvent;
use tokio::sync::broadcast;

/// Subscription to the relay event broadcast
///
/// Lag is tolerated silently: missed events are skipped, never surfaced as
/// errors. The stream ends when the Surfacecast instance is dropped.
#[derive(Debug)]
pub struct EventStream {
    receiver: broadcast::Receiver<RelayEvent>,
}

impl EventStream {
    pub(crate) fn new(receiver: broadcast::Receiver<RelayEvent>) -> Self {
        Self { receiver }
    }

    /// Receive the next event, or `None` when the broadcast closed
    pub async fn next(&mut self) -> Option<RelayEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive an already-queued event without waiting
    pub fn try_next(&mut self) -> Option<RelayEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
