use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};

use crate::config::DetectionSettings;
use crate::detect::backend::DetectionModel;
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::Frame;

/// Stub detector for tests and the demo.
///
/// Finds the bright marker rectangle painted by the synthetic sources and
/// adds one hash-derived "clutter" box, so results depend only on frame
/// content. Can be scripted to fail every Nth call or at warm-up.
#[derive(Default)]
pub struct StubDetector {
    calls: u64,
    fail_every: Option<u64>,
    fail_warm_up: bool,
}

impl StubDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every `n`th `detect` call (1-based).
    pub fn failing_every(mut self, n: u64) -> Self {
        self.fail_every = (n > 0).then_some(n);
        self
    }

    pub fn failing_warm_up(mut self) -> Self {
        self.fail_warm_up = true;
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn marker_box(frame: &Frame) -> Option<BoundingBox> {
        let width = frame.width as usize;
        let mut min = (usize::MAX, usize::MAX);
        let mut max = (0usize, 0usize);
        for (i, px) in frame.pixels().chunks_exact(3).enumerate() {
            if px[0] >= 240 && px[2] <= 40 {
                let (x, y) = (i % width, i / width);
                min = (min.0.min(x), min.1.min(y));
                max = (max.0.max(x), max.1.max(y));
            }
        }
        (min.0 != usize::MAX).then(|| {
            BoundingBox::new(
                min.0 as f32,
                min.1 as f32,
                (max.0 - min.0 + 1) as f32,
                (max.1 - min.1 + 1) as f32,
            )
        })
    }

    fn clutter_box(frame: &Frame) -> Detection {
        let digest: [u8; 32] = Sha256::digest(frame.pixels()).into();
        let (w, h) = (frame.width as f32, frame.height as f32);
        let x = digest[0] as f32 / 255.0 * w * 0.75;
        let y = digest[1] as f32 / 255.0 * h * 0.75;
        let bbox = BoundingBox::new(x, y, w * 0.2, h * 0.2);
        Detection::new("clutter", digest[2] as f32 / 255.0, bbox)
    }
}

impl DetectionModel for StubDetector {
    fn name(&self) -> &str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame, settings: &DetectionSettings) -> Result<Vec<Detection>> {
        self.calls += 1;
        if let Some(n) = self.fail_every {
            if self.calls.is_multiple_of(n) {
                return Err(anyhow!("stub detector scripted failure on call {}", self.calls));
            }
        }

        let mut detections = Vec::with_capacity(2);
        if let Some(bbox) = Self::marker_box(frame) {
            detections.push(Detection::new("marker", 0.92, bbox));
        }
        detections.push(Self::clutter_box(frame));

        detections.retain(|d| d.confidence >= settings.min_confidence);
        detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        detections.truncate(settings.max_objects);
        Ok(detections)
    }

    fn warm_up(&mut self) -> Result<()> {
        if self.fail_warm_up {
            return Err(anyhow!("stub detector weights unavailable"));
        }
        Ok(())
    }
}
