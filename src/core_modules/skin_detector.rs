// THEORY:
// The `SkinRegionDetector` is a model-free `FaceDetector` for when no neural
// detector is available (offline runs, demos, constrained devices). It is far
// less precise than a trained model but needs no weights and runs in a single
// pass over the frame.
//
// Algorithm:
// 1.  **Grid pooling**: the frame is sliced into fixed-size chunks and each chunk
//     is summarized by its average pixel, which cancels sensor noise.
// 2.  **Skin mask**: a chunk is marked as skin when its average pixel falls in the
//     classic Rec. 601 Cb/Cr skin cluster and is not too dark to judge. Chroma is
//     largely independent of illumination, so the same box works indoors and out.
// 3.  **Region growing**: adjacent skin chunks (4-connectivity) are grouped with
//     an iterative flood fill seeded from every unvisited skin chunk.
// 4.  **Aggregation**: every region with enough chunks becomes a `FaceBox` whose
//     bounds are the region's bounding box in pixels and whose confidence is the
//     fraction of that box actually covered by skin chunks.

use crate::core_modules::face::{DetectionError, FaceBox, FaceDetector};
use crate::core_modules::frame::Frame;

const CB_RANGE: (f64, f64) = (77.0, 127.0);
const CR_RANGE: (f64, f64) = (133.0, 173.0);
const MIN_SKIN_LUMINANCE: f64 = 35.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SkinRegionConfig {
    /// Side of a square grid chunk in pixels.
    pub chunk_size: u32,
    /// Regions smaller than this many chunks are ignored.
    pub min_region_chunks: usize,
    /// Regions whose box coverage is below this are ignored.
    pub min_fill_ratio: f64,
}

impl Default for SkinRegionConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16,
            min_region_chunks: 6,
            min_fill_ratio: 0.35,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SkinRegionDetector {
    config: SkinRegionConfig,
}

impl SkinRegionDetector {
    pub fn new(config: SkinRegionConfig) -> Self {
        Self { config }
    }

    fn skin_mask(&self, frame: &Frame, grid_width: u32, grid_height: u32) -> Vec<bool> {
        let size = self.config.chunk_size;
        let mut mask = Vec::with_capacity((grid_width * grid_height) as usize);
        for chunk_y in 0..grid_height {
            for chunk_x in 0..grid_width {
                let average = frame.region_average(chunk_x * size, chunk_y * size, size, size);
                let cb = average.chroma_blue();
                let cr = average.chroma_red();
                mask.push(
                    average.luminance() >= MIN_SKIN_LUMINANCE
                        && (CB_RANGE.0..=CB_RANGE.1).contains(&cb)
                        && (CR_RANGE.0..=CR_RANGE.1).contains(&cr),
                );
            }
        }
        mask
    }

    fn grow_region(
        seed: usize,
        mask: &[bool],
        visited: &mut [bool],
        grid_width: u32,
        grid_height: u32,
    ) -> Vec<(u32, u32)> {
        let mut region = Vec::new();
        let mut queue = vec![seed];
        visited[seed] = true;

        while let Some(index) = queue.pop() {
            let x = index as u32 % grid_width;
            let y = index as u32 / grid_width;
            region.push((x, y));

            // Check all 4 direct neighbors (not diagonals).
            for (dx, dy) in [(0i32, 1i32), (0, -1), (1, 0), (-1, 0)] {
                let nx = x as i32 + dx;
                let ny = y as i32 + dy;
                if nx < 0 || ny < 0 || nx >= grid_width as i32 || ny >= grid_height as i32 {
                    continue;
                }
                let neighbor = ny as usize * grid_width as usize + nx as usize;
                if mask[neighbor] && !visited[neighbor] {
                    visited[neighbor] = true;
                    queue.push(neighbor);
                }
            }
        }

        region
    }

    fn region_to_box(&self, region: &[(u32, u32)]) -> Option<FaceBox> {
        if region.len() < self.config.min_region_chunks {
            return None;
        }
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0, 0);
        for &(x, y) in region {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        let box_chunks = ((max_x - min_x + 1) * (max_y - min_y + 1)) as f64;
        let fill_ratio = region.len() as f64 / box_chunks;
        if fill_ratio < self.config.min_fill_ratio {
            return None;
        }

        let size = self.config.chunk_size as f64;
        Some(FaceBox {
            x: min_x as f64 * size,
            y: min_y as f64 * size,
            width: (max_x - min_x + 1) as f64 * size,
            height: (max_y - min_y + 1) as f64 * size,
            confidence: fill_ratio,
        })
    }
}

impl FaceDetector for SkinRegionDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<FaceBox>, DetectionError> {
        let size = self.config.chunk_size;
        if size == 0 {
            return Err(DetectionError::inference("chunk size must be non-zero"));
        }
        let grid_width = frame.width() / size;
        let grid_height = frame.height() / size;
        if grid_width == 0 || grid_height == 0 {
            return Ok(Vec::new());
        }

        let mask = self.skin_mask(frame, grid_width, grid_height);
        let mut visited = vec![false; mask.len()];
        let mut faces = Vec::new();

        for seed in 0..mask.len() {
            if !mask[seed] || visited[seed] {
                continue;
            }
            let region = Self::grow_region(seed, &mask, &mut visited, grid_width, grid_height);
            if let Some(face) = self.region_to_box(&region) {
                faces.push(face);
            }
        }

        Ok(faces)
    }
}
