use serde::Serialize;

use crate::classifier::Prediction;
use crate::overlay::DisplayBox;

/// One detection ready to draw.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OverlayItem {
    pub label: String,
    pub confidence: f32,
    /// "label NN%"
    pub caption: String,
    pub display: DisplayBox,
}

/// Receives results after each applied cycle.
pub trait ResultsSink {
    fn detections(&mut self, items: &[OverlayItem]);

    fn prediction(&mut self, prediction: &Prediction);

    /// Completions per second, once per closed window.
    fn throughput(&mut self, _per_second: u32) {}
}

/// Writes results to the log. Used by the demo binary and handy in tests.
#[derive(Debug, Default)]
pub struct LogSink {
    pub detection_updates: usize,
    pub prediction_updates: usize,
    pub last_rate: Option<u32>,
}

impl ResultsSink for LogSink {
    fn detections(&mut self, items: &[OverlayItem]) {
        self.detection_updates += 1;
        if items.is_empty() {
            log::debug!("no detections");
            return;
        }
        for item in items {
            log::info!(
                "{} at ({:.0}, {:.0}) {:.0}x{:.0}",
                item.caption,
                item.display.left,
                item.display.top,
                item.display.width,
                item.display.height
            );
        }
    }

    fn prediction(&mut self, prediction: &Prediction) {
        self.prediction_updates += 1;
        match prediction.top() {
            Some(top) => log::info!(
                "prediction: {} ({:.0}%)",
                top.label,
                top.confidence * 100.0
            ),
            None => log::debug!("prediction: nothing taught yet"),
        }
    }

    fn throughput(&mut self, per_second: u32) {
        self.last_rate = Some(per_second);
        log::info!("inference rate: {}/s", per_second);
    }
}
