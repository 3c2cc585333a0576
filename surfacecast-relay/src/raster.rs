//! Raster encoding for the software capture path
//!
//! When the zero-copy frame processor is unavailable the publisher
//! serializes the composite surface to a compressed raster encoding and
//! posts that instead of a frame handle.

use bytes::Bytes;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use surfacecast_core::error::CastError;
use surfacecast_core::frame::{FrameData, RasterImage};

/// MIME type of the software path's raster encoding
pub const RASTER_MEDIA_TYPE: &str = "image/png";

/// Encode a frame payload to a compressed raster image
pub fn encode_raster(frame: &FrameData) -> Result<RasterImage, CastError> {
    let mut encoded = Vec::new();
    PngEncoder::new(&mut encoded)
        .write_image(
            &frame.data,
            frame.width,
            frame.height,
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| CastError::Encode {
            reason: e.to_string(),
        })?;
    Ok(RasterImage::new(RASTER_MEDIA_TYPE, Bytes::from(encoded)))
}
