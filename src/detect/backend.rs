use anyhow::Result;

use crate::config::DetectionSettings;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Object detection model seam.
///
/// The model itself is external: implementations wrap whatever runtime
/// produces boxes. Boxes are returned in the frame's natural pixel space.
///
/// A failed call only costs one cycle. The scheduler logs it and applies an
/// empty result, so implementations should return `Err` rather than panic.
pub trait DetectionModel: Send {
    /// Model identifier used in logs and `ModelUnavailable` errors.
    fn name(&self) -> &str;

    /// Run detection on one frame.
    ///
    /// `settings.max_objects` and `settings.min_confidence` bound the result;
    /// `settings.iou_threshold` is forwarded to the model's suppression step.
    fn detect(&mut self, frame: &Frame, settings: &DetectionSettings) -> Result<Vec<Detection>>;

    /// Load weights and run a first pass. Called once per session.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
