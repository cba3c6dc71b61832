//! Frame encoding: scale to a bounded width, mirror, compress to JPEG.

use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::camera::{Frame, Resolution};

/// Output width of every encoded frame.
pub const MAX_WIDTH: u32 = 640;

/// Tallest accepted output. Frames narrower than 1:4 are rejected rather
/// than scaled into an oversized canvas.
pub const MAX_HEIGHT: u32 = 4 * MAX_WIDTH;

/// Scale basis used when a frame reports no dimensions.
pub const FALLBACK_BASIS: Resolution = Resolution::VGA;

/// JPEG quality (0.8 on a 0-1 scale).
pub const JPEG_QUALITY: u8 = 80;

/// Compressed image derived from exactly one captured frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionRequest {
    jpeg: Vec<u8>,
}

impl DetectionRequest {
    pub fn from_jpeg(jpeg: Vec<u8>) -> Self {
        Self { jpeg }
    }

    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    /// Standard base64 of the JPEG bytes, without a data-URI prefix.
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.jpeg)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("JPEG encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),

    #[error("Frame {width}x{height} is too narrow to encode")]
    Dimensions { width: u32, height: u32 },
}

/// Output dimensions for a frame of the given native size.
///
/// Width is always [`MAX_WIDTH`]; height keeps the aspect ratio and is at
/// least one pixel. A zero dimension falls back to [`FALLBACK_BASIS`].
pub fn output_size(width: u32, height: u32) -> (u32, u32) {
    let (basis_w, basis_h) = if width == 0 || height == 0 {
        (FALLBACK_BASIS.width, FALLBACK_BASIS.height)
    } else {
        (width, height)
    };
    let scale = MAX_WIDTH as f64 / basis_w as f64;
    let scaled = (basis_h as f64 * scale).round().max(1.0) as u32;
    (MAX_WIDTH, scaled)
}

/// Turns camera frames into detection payloads.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    quality: u8,
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self {
            quality: JPEG_QUALITY,
        }
    }
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scaled (and optionally mirrored) raster, before compression.
    ///
    /// A frame without usable pixels yields a black canvas of the fallback
    /// size. Frames whose scaled height would exceed [`MAX_HEIGHT`] are an
    /// error.
    pub fn render(&self, frame: &Frame, mirrored: bool) -> Result<RgbImage, EncodeError> {
        let (out_w, out_h) = output_size(frame.width, frame.height);
        if out_h > MAX_HEIGHT {
            return Err(EncodeError::Dimensions {
                width: frame.width,
                height: frame.height,
            });
        }

        let source = if frame.has_dimensions() {
            let len = frame.width as usize * frame.height as usize * Frame::BYTES_PER_PIXEL;
            RgbImage::from_raw(frame.width, frame.height, frame.data[..len].to_vec())
        } else {
            None
        };

        let Some(source) = source else {
            return Ok(RgbImage::new(out_w, out_h));
        };

        let mut scaled = imageops::resize(&source, out_w, out_h, FilterType::Triangle);
        if mirrored {
            imageops::flip_horizontal_in_place(&mut scaled);
        }
        Ok(scaled)
    }

    /// Render and compress a frame.
    pub fn encode(&self, frame: &Frame, mirrored: bool) -> Result<DetectionRequest, EncodeError> {
        let raster = self.render(frame, mirrored)?;
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality).encode_image(&raster)?;
        log::trace!(
            "Encoded {}x{} frame to {} JPEG bytes",
            raster.width(),
            raster.height(),
            jpeg.len()
        );
        Ok(DetectionRequest::from_jpeg(jpeg))
    }
}
