//! Frame payloads and the bounded zero-copy frame pool
//!
//! A [`VideoFrame`] is a single-owner handle backed by a capture slot from a
//! [`FramePool`]. The handle must be released exactly once; `release`
//! consumes the handle, so a double release is unrepresentable. A handle
//! that is dropped without an explicit release forfeits its slot for good:
//! the upstream capture pipeline stalls once all slots are forfeited, the
//! same failure mode the underlying runtime exhibits. The leak is counted
//! and logged.

use base64::Engine;
use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::warn;

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn unix_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Pixel payload of a zero-copy frame in its transferable form
///
/// Cloning is a reference-count bump on the underlying buffer, not a pixel
/// copy; this is the representation that crosses the boundary channel while
/// the owning [`VideoFrame`] handle stays behind to be released.
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Raw RGBA8 pixel bytes, row-major, tightly packed
    pub data: Bytes,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Capture timestamp in milliseconds since the Unix epoch
    pub timestamp_ms: u64,
}

/// Compressed raster encoding of a captured surface
///
/// Used by the software capture path; owned by the sender and copied into
/// the transport, so it carries no release obligation.
#[derive(Debug, Clone)]
pub struct RasterImage {
    media_type: String,
    bytes: Bytes,
}

impl RasterImage {
    /// Wrap an encoded image buffer
    pub fn new(media_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            media_type: media_type.into(),
            bytes,
        }
    }

    /// MIME type of the encoding, e.g. `image/png`
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Encoded bytes
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Data-URL form of the encoding, as shared with the embedded page
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.media_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// A frame payload crossing the boundary channel
#[derive(Debug, Clone)]
pub enum FramePayload {
    /// Transferred zero-copy frame contents
    Video(FrameData),
    /// Compressed raster encoding
    Raster(RasterImage),
}

#[derive(Debug, Default)]
struct PoolStats {
    produced: AtomicU64,
    released: AtomicU64,
    leaked: AtomicU64,
}

/// Bounded pool of capture slots backing zero-copy frames
///
/// The pool models the frame queue of the upstream capture primitive: a
/// frame occupies a slot from production until release, and production
/// suspends while every slot is held. Clones share the same slots and
/// accounting.
#[derive(Debug, Clone)]
pub struct FramePool {
    slots: Arc<Semaphore>,
    capacity: usize,
    stats: Arc<PoolStats>,
}

impl FramePool {
    /// Create a pool with the given number of in-flight frame slots
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
            stats: Arc::new(PoolStats::default()),
        }
    }

    /// Produce a frame, suspending until a capture slot is free
    pub async fn frame(&self, data: FrameData) -> VideoFrame {
        // The semaphore is never closed, so acquisition only fails if every
        // slot has been forfeited by leaked frames; suspend forever in that
        // case, exactly like the stalled upstream pipeline it models.
        let permit = match self.slots.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => std::future::pending::<OwnedSemaphorePermit>().await,
        };
        self.stats.produced.fetch_add(1, Ordering::Relaxed);
        VideoFrame {
            data,
            slot: Some(permit),
            stats: Arc::clone(&self.stats),
            released: false,
        }
    }

    /// Produce a frame if a capture slot is free right now
    pub fn try_frame(&self, data: FrameData) -> Option<VideoFrame> {
        let permit = self.slots.clone().try_acquire_owned().ok()?;
        self.stats.produced.fetch_add(1, Ordering::Relaxed);
        Some(VideoFrame {
            data,
            slot: Some(permit),
            stats: Arc::clone(&self.stats),
            released: false,
        })
    }

    /// Total number of capture slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Frames currently in flight (produced but not yet released or leaked)
    pub fn outstanding(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }

    /// Frames produced over the pool's lifetime
    pub fn produced(&self) -> u64 {
        self.stats.produced.load(Ordering::Relaxed)
    }

    /// Frames explicitly released
    pub fn released(&self) -> u64 {
        self.stats.released.load(Ordering::Relaxed)
    }

    /// Frames dropped without an explicit release
    pub fn leaked(&self) -> u64 {
        self.stats.leaked.load(Ordering::Relaxed)
    }
}

/// Single-owner zero-copy frame handle
///
/// Obtain the transferable payload with [`VideoFrame::payload`], then
/// release the handle with [`VideoFrame::release`] on every code path.
pub struct VideoFrame {
    data: FrameData,
    slot: Option<OwnedSemaphorePermit>,
    stats: Arc<PoolStats>,
    released: bool,
}

impl VideoFrame {
    /// Frame width in pixels
    pub fn width(&self) -> u32 {
        self.data.width
    }

    /// Frame height in pixels
    pub fn height(&self) -> u32 {
        self.data.height
    }

    /// Capture timestamp in milliseconds since the Unix epoch
    pub fn timestamp_ms(&self) -> u64 {
        self.data.timestamp_ms
    }

    /// Transferable form of the frame contents
    ///
    /// This bumps the buffer's reference count; no pixels are copied.
    pub fn payload(&self) -> FrameData {
        self.data.clone()
    }

    /// Release the frame, returning its capture slot to the pool
    ///
    /// Consumes the handle: a second release cannot be expressed.
    pub fn release(mut self) {
        self.released = true;
        self.stats.released.fetch_add(1, Ordering::Relaxed);
        drop(self.slot.take());
    }
}

impl Drop for VideoFrame {
    fn drop(&mut self) {
        if !self.released {
            self.stats.leaked.fetch_add(1, Ordering::Relaxed);
            warn!(
                width = self.data.width,
                height = self.data.height,
                "video frame dropped without release; capture slot forfeited"
            );
            if let Some(slot) = self.slot.take() {
                slot.forget();
            }
        }
    }
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.data.width)
            .field("height", &self.data.height)
            .field("timestamp_ms", &self.data.timestamp_ms)
            .field("released", &self.released)
            .finish()
    }
}
