//! Shared raster surfaces
//!
//! A [`Surface`] is a cheaply clonable handle to an RGBA8 pixel buffer. The
//! publisher composites the engine's output into an owned off-screen
//! surface before capture; the cross-origin consumer redraws an owned
//! surface on every received frame. Blits copy the intersecting region, so
//! mismatched dimensions degrade to a partial draw rather than an error.

use crate::frame::FrameData;
use bytes::Bytes;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

const BYTES_PER_PIXEL: usize = 4;

/// Backing pixel storage of a surface
#[derive(Debug)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Allocate a zeroed RGBA8 buffer
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * BYTES_PER_PIXEL],
        }
    }

    /// Buffer width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Buffer height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    fn blit(&mut self, src: &[u8], src_width: u32, src_height: u32) {
        let rows = self.height.min(src_height) as usize;
        let row_bytes = (self.width.min(src_width) as usize) * BYTES_PER_PIXEL;
        let dst_stride = self.width as usize * BYTES_PER_PIXEL;
        let src_stride = src_width as usize * BYTES_PER_PIXEL;
        for row in 0..rows {
            let dst_start = row * dst_stride;
            let src_start = row * src_stride;
            if src_start + row_bytes > src.len() {
                break;
            }
            self.data[dst_start..dst_start + row_bytes]
                .copy_from_slice(&src[src_start..src_start + row_bytes]);
        }
    }
}

struct SurfaceInner {
    id: Uuid,
    pixels: RwLock<PixelBuffer>,
    draws: AtomicU64,
}

/// Shared drawable raster surface
#[derive(Clone)]
pub struct Surface {
    inner: Arc<SurfaceInner>,
}

impl Surface {
    /// Create a surface with a zeroed RGBA8 buffer
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            inner: Arc::new(SurfaceInner {
                id: Uuid::new_v4(),
                pixels: RwLock::new(PixelBuffer::new(width, height)),
                draws: AtomicU64::new(0),
            }),
        }
    }

    /// Stable identity of this surface
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Current dimensions as `(width, height)`
    pub fn dimensions(&self) -> (u32, u32) {
        let pixels = self.inner.pixels.read();
        (pixels.width, pixels.height)
    }

    /// Fill the whole surface with one RGBA color
    pub fn fill(&self, rgba: [u8; 4]) {
        {
            let mut pixels = self.inner.pixels.write();
            for chunk in pixels.data.chunks_exact_mut(BYTES_PER_PIXEL) {
                chunk.copy_from_slice(&rgba);
            }
        }
        self.inner.draws.fetch_add(1, Ordering::Relaxed);
    }

    /// Draw another surface's current contents onto this one
    pub fn draw_surface(&self, src: &Surface) {
        if src.id() == self.id() {
            return;
        }
        let (src_data, src_width, src_height) = {
            let pixels = src.inner.pixels.read();
            (pixels.data.clone(), pixels.width, pixels.height)
        };
        self.inner
            .pixels
            .write()
            .blit(&src_data, src_width, src_height);
        self.inner.draws.fetch_add(1, Ordering::Relaxed);
    }

    /// Draw a received frame payload onto this surface
    pub fn draw_data(&self, frame: &FrameData) {
        self.inner
            .pixels
            .write()
            .blit(&frame.data, frame.width, frame.height);
        self.inner.draws.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current contents out as a frame payload
    ///
    /// The snapshot carries no timestamp; the caller stamps it.
    pub fn snapshot(&self) -> FrameData {
        let pixels = self.inner.pixels.read();
        FrameData {
            data: Bytes::from(pixels.data.clone()),
            width: pixels.width,
            height: pixels.height,
            timestamp_ms: 0,
        }
    }

    /// Number of draw operations performed on this surface
    pub fn draw_count(&self) -> u64 {
        self.inner.draws.load(Ordering::Relaxed)
    }
}

impl PartialEq for Surface {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Surface {}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (width, height) = self.dimensions();
        f.debug_struct("Surface")
            .field("id", &self.inner.id)
            .field("width", &width)
            .field("height", &height)
            .field("draws", &self.draw_count())
            .finish()
    }
}
