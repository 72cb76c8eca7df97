// THEORY:
// The stamp is a lightweight freshness marker burned into every captured selfie:
// a short monospaced line derived from the capture time, blended at low opacity
// into the bottom-right corner. It is not cryptographically strong. Its value is
// that it is always in the same normalized place, so a reviewer can tell a fresh
// capture from a re-uploaded older photo at a glance, and that it stays out of
// the central face region.
//
// Text is drawn from a tiny built-in 5x7 dot font covering exactly the
// characters a marker can contain.

use chrono::{DateTime, Utc};
use image::{Rgba, RgbaImage};

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const GLYPH_SPACING: u32 = 1;

/// Placement and look of the capture marker.
#[derive(Debug, Clone, PartialEq)]
pub struct StampConfig {
    /// Blend factor of the marker over the photo, in [0, 1].
    pub opacity: f32,
    /// Distance from the right and bottom edges as a fraction of the canvas side.
    pub margin: f64,
    /// Size of one font dot as a fraction of the canvas side.
    pub dot_size: f64,
    pub color: [u8; 3],
}

impl Default for StampConfig {
    fn default() -> Self {
        Self {
            opacity: 0.35,
            margin: 0.02,
            dot_size: 0.005,
            color: [255, 255, 255],
        }
    }
}

/// Pixel rectangle covered by a stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StampArea {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl StampArea {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// The marker text for a capture taken at `captured_at`.
pub fn marker_text(captured_at: DateTime<Utc>) -> String {
    format!("ID:{:X}", captured_at.timestamp_millis())
}

/// Where `text` lands on a `canvas_width` x `canvas_height` canvas.
pub fn stamp_area(config: &StampConfig, canvas_width: u32, canvas_height: u32, text: &str) -> StampArea {
    let side = canvas_width.min(canvas_height) as f64;
    let dot = ((side * config.dot_size).round() as u32).max(1);
    let margin = (side * config.margin).round() as u32;
    let chars = text.chars().count() as u32;

    let width = (chars * (GLYPH_WIDTH + GLYPH_SPACING)).saturating_sub(GLYPH_SPACING) * dot;
    let height = GLYPH_HEIGHT * dot;

    StampArea {
        x: canvas_width.saturating_sub(margin + width),
        y: canvas_height.saturating_sub(margin + height),
        width: width.min(canvas_width),
        height: height.min(canvas_height),
    }
}

/// Blends `text` into the bottom-right corner of `canvas` and returns the area touched.
pub fn apply_stamp(canvas: &mut RgbaImage, config: &StampConfig, text: &str) -> StampArea {
    let area = stamp_area(config, canvas.width(), canvas.height(), text);
    let dot = area.height / GLYPH_HEIGHT;
    if dot == 0 {
        return area;
    }
    let alpha = config.opacity.clamp(0.0, 1.0);

    for (index, ch) in text.chars().enumerate() {
        let rows = glyph(ch);
        let origin_x = area.x + index as u32 * (GLYPH_WIDTH + GLYPH_SPACING) * dot;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                let x0 = origin_x + col * dot;
                let y0 = area.y + row as u32 * dot;
                for y in y0..y0 + dot {
                    for x in x0..x0 + dot {
                        if x < canvas.width() && y < canvas.height() {
                            let blended = blend(*canvas.get_pixel(x, y), config.color, alpha);
                            canvas.put_pixel(x, y, blended);
                        }
                    }
                }
            }
        }
    }

    area
}

fn blend(under: Rgba<u8>, color: [u8; 3], alpha: f32) -> Rgba<u8> {
    let mix = |base: u8, top: u8| -> u8 { (base as f32 * (1.0 - alpha) + top as f32 * alpha).round() as u8 };
    Rgba([
        mix(under.0[0], color[0]),
        mix(under.0[1], color[1]),
        mix(under.0[2], color[2]),
        under.0[3],
    ])
}

fn glyph(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        _ => [0x00; 7],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn marker_is_derived_from_capture_time() {
        let at = Utc.timestamp_millis_opt(0x1_9A2B_3C4D).unwrap();
        assert_eq!(marker_text(at), "ID:19A2B3C4D");
    }

    #[test]
    fn area_is_anchored_bottom_right() {
        let config = StampConfig::default();
        // 600px canvas: dot 3px, margin 12px, 4 chars -> (4*6-1)*3 = 69px wide.
        let area = stamp_area(&config, 600, 600, "ID:1");
        assert_eq!(area, StampArea { x: 519, y: 567, width: 69, height: 21 });
    }

    #[test]
    fn same_normalized_position_across_canvas_sizes() {
        let config = StampConfig::default();
        let small = stamp_area(&config, 200, 200, "ID:ABC");
        let large = stamp_area(&config, 800, 800, "ID:ABC");
        let small_right = (small.x + small.width) as f64 / 200.0;
        let large_right = (large.x + large.width) as f64 / 800.0;
        assert!((small_right - large_right).abs() < 0.01);
    }

    #[test]
    fn stamping_only_touches_its_area() {
        let mut canvas = RgbaImage::from_pixel(600, 600, Rgba([10, 20, 30, 255]));
        let area = apply_stamp(&mut canvas, &StampConfig::default(), "ID:8F");

        let mut touched = 0;
        for (x, y, pixel) in canvas.enumerate_pixels() {
            if pixel.0 != [10, 20, 30, 255] {
                assert!(area.contains(x, y), "pixel ({x},{y}) outside stamp area");
                touched += 1;
            }
        }
        assert!(touched > 0);
        // Low opacity: a stamped pixel stays much closer to the photo than to white.
        let inside = canvas
            .enumerate_pixels()
            .find(|(x, y, p)| area.contains(*x, *y) && p.0 != [10, 20, 30, 255])
            .map(|(_, _, p)| *p)
            .unwrap();
        assert!(inside.0[0] < 128);
    }
}
