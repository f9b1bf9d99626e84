use anyhow::{anyhow, Result};

use crate::embed::backend::EmbeddingModel;
use crate::embed::vector::{FeatureVector, VectorTracker};
use crate::frame::Frame;

const BINS: usize = 8;
const CHANNELS: usize = 3;
const QUADRANTS: usize = 4;

/// Output dimensionality: per-channel histograms plus per-quadrant channel means.
pub const HISTOGRAM_DIMS: usize = BINS * CHANNELS + QUADRANTS * CHANNELS;

/// Stub embedder built from a coarse colour histogram and quadrant means.
///
/// Frames with the same content always embed to the same vector. Every vector
/// is issued through a `VectorTracker` so callers can observe releases.
#[derive(Default)]
pub struct HistogramEmbedder {
    tracker: VectorTracker,
    fail_warm_up: bool,
}

impl HistogramEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_warm_up(mut self) -> Self {
        self.fail_warm_up = true;
        self
    }

    pub fn tracker(&self) -> VectorTracker {
        self.tracker.clone()
    }

    fn features(frame: &Frame) -> Vec<f32> {
        let width = frame.width as usize;
        let height = frame.height as usize;
        let mut histogram = [[0u32; BINS]; CHANNELS];
        let mut sums = [[0f64; CHANNELS]; QUADRANTS];
        let mut counts = [0u32; QUADRANTS];

        for (i, px) in frame.pixels().chunks_exact(CHANNELS).enumerate() {
            let (x, y) = (i % width, i / width);
            let quadrant = usize::from(x * 2 >= width) + 2 * usize::from(y * 2 >= height);
            counts[quadrant] += 1;
            for (c, &value) in px.iter().enumerate() {
                histogram[c][(value / 32) as usize] += 1;
                sums[quadrant][c] += value as f64;
            }
        }

        let total = (width * height).max(1) as f32;
        let mut values = Vec::with_capacity(HISTOGRAM_DIMS);
        for channel in &histogram {
            values.extend(channel.iter().map(|&n| n as f32 / total));
        }
        for (quadrant, sum) in sums.iter().enumerate() {
            let n = counts[quadrant].max(1) as f64;
            values.extend(sum.iter().map(|s| (s / n / 255.0) as f32));
        }
        values
    }
}

impl EmbeddingModel for HistogramEmbedder {
    fn name(&self) -> &str {
        "histogram"
    }

    fn embed(&mut self, frame: &Frame) -> Result<FeatureVector> {
        if frame.width == 0 || frame.height == 0 {
            return Err(anyhow!("cannot embed an empty frame"));
        }
        Ok(self.tracker.issue(Self::features(frame)))
    }

    fn warm_up(&mut self) -> Result<()> {
        if self.fail_warm_up {
            return Err(anyhow!("embedding weights unavailable"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{FrameSource, StillImage};

    #[test]
    fn embedding_is_deterministic_and_tracked() {
        let mut embedder = HistogramEmbedder::new();
        let tracker = embedder.tracker();
        let mut image = StillImage::synthetic(16, 16, 3);

        let a = embedder.embed(&image.capture().unwrap()).unwrap();
        let b = embedder.embed(&image.capture().unwrap()).unwrap();
        assert_eq!(a.len(), HISTOGRAM_DIMS);
        assert_eq!(a.values(), b.values());
        assert_eq!(tracker.live(), 2);

        drop(a);
        drop(b);
        assert_eq!(tracker.live(), 0);
    }

    #[test]
    fn different_scenes_embed_differently() {
        let mut embedder = HistogramEmbedder::new();
        let a = embedder
            .embed(&StillImage::synthetic(16, 16, 0).capture().unwrap())
            .unwrap();
        let b = embedder
            .embed(&StillImage::synthetic(16, 16, 5).capture().unwrap())
            .unwrap();
        assert!(a.cosine(&b) < 0.9999);
    }
}
