// THEORY:
// The capture pipeline turns the live frame into the final selfie payload. It is
// a pure, synchronous transform: no I/O, no camera access, no upload.
//
// Steps:
// 1.  **Gate**: refuse unless the stable status is `Acceptable`. The UI disables
//     the button too, but the pipeline does not rely on that.
// 2.  **Square crop**: the largest centered square, `side = min(w, h)` at offset
//     `((w - side) / 2, (h - side) / 2)`.
// 3.  **Mirror & scale**: flip horizontally so the result matches the mirrored
//     preview the subject was looking at, then scale to the fixed output canvas.
// 4.  **Stamp**: burn the capture-time marker into the bottom-right corner.
// 5.  **Encode**: lossy JPEG, wrapped as a `data:` URI for the host.

use crate::core_modules::frame::Frame;
use crate::core_modules::stamp::{StampConfig, apply_stamp, marker_text};
use crate::core_modules::status::StableStatus;
use crate::error::CaptureError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};
use tracing::debug;

pub const JPEG_MIME: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Side of the square output canvas in pixels.
    pub output_size: u32,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
    pub stamp: StampConfig,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_size: 600,
            jpeg_quality: 90,
            stamp: StampConfig::default(),
        }
    }
}

/// The centered square taken from the source frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub side: u32,
}

impl CropRegion {
    pub fn centered_square(width: u32, height: u32) -> Self {
        let side = width.min(height);
        Self {
            x: (width - side) / 2,
            y: (height - side) / 2,
            side,
        }
    }
}

/// The finished selfie handed to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    /// `data:image/jpeg;base64,...`
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
    /// The marker text stamped into the image.
    pub marker: String,
    pub captured_at: DateTime<Utc>,
}

impl CapturedImage {
    /// Decodes the JPEG bytes back out of the data URI.
    pub fn jpeg_bytes(&self) -> Option<Vec<u8>> {
        let (_, payload) = self.data_uri.split_once(";base64,")?;
        STANDARD.decode(payload).ok()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CapturePipeline {
    config: CaptureConfig,
}

impl CapturePipeline {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Gate, render, stamp and encode a frame.
    pub fn capture(
        &self,
        frame: &Frame,
        status: StableStatus,
        captured_at: DateTime<Utc>,
    ) -> Result<CapturedImage, CaptureError> {
        if !status.allows_capture() {
            return Err(CaptureError::NotAcceptable { status });
        }

        let mut canvas = self.render(frame)?;
        let marker = marker_text(captured_at);
        apply_stamp(&mut canvas, &self.config.stamp, &marker);

        let jpeg = self.encode_jpeg(&canvas)?;
        debug!(
            frame = frame.index,
            bytes = jpeg.len(),
            marker = %marker,
            "captured selfie"
        );

        Ok(CapturedImage {
            data_uri: format!("data:{JPEG_MIME};base64,{}", STANDARD.encode(&jpeg)),
            width: canvas.width(),
            height: canvas.height(),
            marker,
            captured_at,
        })
    }

    /// Crops, mirrors and scales the frame onto the output canvas, unstamped.
    pub fn render(&self, frame: &Frame) -> Result<RgbaImage, CaptureError> {
        if frame.is_empty() || self.config.output_size == 0 {
            return Err(CaptureError::EmptyFrame);
        }
        let crop = CropRegion::centered_square(frame.width(), frame.height());
        let square = imageops::crop_imm(frame.image(), crop.x, crop.y, crop.side, crop.side).to_image();

        let size = self.config.output_size;
        let scaled = if crop.side == size {
            square
        } else {
            imageops::resize(&square, size, size, FilterType::Triangle)
        };
        Ok(imageops::flip_horizontal(&scaled))
    }

    fn encode_jpeg(&self, canvas: &RgbaImage) -> Result<Vec<u8>, CaptureError> {
        // JPEG carries no alpha channel.
        let rgb = DynamicImage::ImageRgba8(canvas.clone()).to_rgb8();
        let mut bytes = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut bytes, self.config.jpeg_quality.clamp(1, 100));
        encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)?;
        Ok(bytes)
    }
}
