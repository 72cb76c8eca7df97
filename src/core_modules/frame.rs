// THEORY:
// A `Frame` is one snapshot pulled from the live camera stream. Like the `Pixel`
// it is a "dumb" container: it owns an RGBA buffer and knows how to summarize
// itself (average pixel, average luminance over the whole frame or over a
// rectangular region), but it never judges its own quality. Judgement lives in
// the analyzer.
//
// Region averaging is the same spatial pooling idea used for grid analysis:
// summing channels over a block cancels single-pixel sensor noise, and because
// luma is a linear combination of channels the luma of the average equals the
// average luma.

use crate::core_modules::pixel::pixel::{CHANNELS, Pixel};
use image::{DynamicImage, RgbaImage};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame buffer holds {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// A single RGBA video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbaImage,
    /// Position of this frame in the stream it was pulled from.
    pub index: u64,
}

impl Frame {
    pub fn new(image: RgbaImage, index: u64) -> Self {
        Self { image, index }
    }

    /// Wraps a raw, row-major RGBA buffer.
    pub fn from_rgba(width: u32, height: u32, buffer: Vec<u8>, index: u64) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * CHANNELS;
        let actual = buffer.len();
        let image = RgbaImage::from_raw(width, height, buffer).ok_or(FrameError::BufferSize {
            width,
            height,
            expected,
            actual,
        })?;
        Ok(Self { image, index })
    }

    pub fn from_dynamic(image: &DynamicImage, index: u64) -> Self {
        Self {
            image: image.to_rgba8(),
            index,
        }
    }

    /// A frame filled with a single color; handy for synthetic streams.
    pub fn solid(width: u32, height: u32, pixel: Pixel, index: u64) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, pixel.into()),
            index,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Pixel> {
        self.image.get_pixel_checked(x, y).map(|p| Pixel::from(*p))
    }

    /// Luma-weighted average brightness over every pixel, on the 0..255 scale.
    pub fn average_luminance(&self) -> f64 {
        let num_pixels = self.width() as u64 * self.height() as u64;
        if num_pixels == 0 {
            return 0.0;
        }
        let (sum_r, sum_g, sum_b, _) = self.channel_sums(0, 0, self.width(), self.height());
        let n = num_pixels as f64;
        // Averages kept in f64 so no precision is lost to integer division.
        Pixel::luminance_of(sum_r as f64 / n, sum_g as f64 / n, sum_b as f64 / n)
    }

    /// Average pixel of a rectangular block, clipped to the frame bounds.
    pub fn region_average(&self, x: u32, y: u32, width: u32, height: u32) -> Pixel {
        let x_end = x.saturating_add(width).min(self.width());
        let y_end = y.saturating_add(height).min(self.height());
        if x >= x_end || y >= y_end {
            return Pixel::default();
        }
        let num_pixels = (x_end - x) as u64 * (y_end - y) as u64;
        let (sum_r, sum_g, sum_b, sum_a) = self.channel_sums(x, y, x_end - x, y_end - y);

        Pixel {
            red: (sum_r / num_pixels) as u8,
            green: (sum_g / num_pixels) as u8,
            blue: (sum_b / num_pixels) as u8,
            alpha: (sum_a / num_pixels) as u8,
        }
    }

    fn channel_sums(&self, x: u32, y: u32, width: u32, height: u32) -> (u64, u64, u64, u64) {
        let mut sum_r = 0u64;
        let mut sum_g = 0u64;
        let mut sum_b = 0u64;
        let mut sum_a = 0u64;
        let stride = self.width() as usize * CHANNELS;
        let raw = self.image.as_raw();

        for row in y..y + height {
            let start = row as usize * stride + x as usize * CHANNELS;
            let end = start + width as usize * CHANNELS;
            for px in raw[start..end].chunks_exact(CHANNELS) {
                sum_r += px[0] as u64;
                sum_g += px[1] as u64;
                sum_b += px[2] as u64;
                sum_a += px[3] as u64;
            }
        }

        (sum_r, sum_g, sum_b, sum_a)
    }
}
