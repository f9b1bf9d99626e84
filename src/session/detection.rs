use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::inference_loop::{ExecMode, InferenceLoop, ModelStatus, TickReport};
use super::sink::{OverlayItem, ResultsSink};
use super::task::DetectTask;
use crate::config::{DetectionSettings, LensConfig};
use crate::detect::{Detection, DetectionModel};
use crate::error::LensError;
use crate::frame::Size;
use crate::ingest::InputSource;
use crate::overlay::CoordinateMapper;
use crate::schedule::FrameScheduler;

/// Object detection over the active source, mapped onto a display container.
pub struct DetectionSession<M: DetectionModel + 'static> {
    inference: InferenceLoop<DetectTask<M>>,
    settings: Arc<Mutex<DetectionSettings>>,
    mapper: CoordinateMapper,
    container: Size,
}

impl<M: DetectionModel + 'static> DetectionSession<M> {
    pub fn new(model: M, config: &LensConfig, mode: ExecMode) -> Result<Self, LensError> {
        config
            .detection
            .validate()
            .map_err(|e| LensError::InvalidSetting(e.to_string()))?;
        let settings = Arc::new(Mutex::new(config.detection));
        let task = DetectTask::new(model, Arc::clone(&settings));
        Ok(Self {
            inference: InferenceLoop::new(task, config.frame_cap_hz, mode)?,
            settings,
            mapper: CoordinateMapper::new(config.overlay),
            container: Size::default(),
        })
    }

    /// Warm the detector up. Must succeed before ticks do any work.
    pub fn start(&mut self) -> Result<(), LensError> {
        self.inference.start()
    }

    pub fn status(&self) -> &ModelStatus {
        self.inference.status()
    }

    pub fn scheduler(&self) -> &FrameScheduler<Vec<Detection>> {
        self.inference.scheduler()
    }

    pub fn attach(&mut self, source: InputSource) {
        self.inference.scheduler_mut().attach(source);
    }

    pub fn detach(&mut self) -> Option<InputSource> {
        self.inference.scheduler_mut().detach()
    }

    pub fn source_mut(&mut self) -> Option<&mut InputSource> {
        self.inference.scheduler_mut().source_mut()
    }

    pub fn pause(&mut self) {
        self.inference.scheduler_mut().pause();
    }

    pub fn resume(&mut self) {
        self.inference.scheduler_mut().resume();
    }

    /// Layout size of the element the overlay is drawn over.
    pub fn set_container(&mut self, container: Size) {
        self.container = container;
    }

    pub fn settings(&self) -> DetectionSettings {
        self.settings
            .lock()
            .map(|s| *s)
            .unwrap_or_default()
    }

    /// Takes effect from the next issued inference.
    pub fn update_settings(&mut self, settings: DetectionSettings) -> Result<(), LensError> {
        settings
            .validate()
            .map_err(|e| LensError::InvalidSetting(e.to_string()))?;
        let mut current = self
            .settings
            .lock()
            .map_err(|_| LensError::InvalidSetting("detection settings lock poisoned".into()))?;
        *current = settings;
        log::info!(
            "detection settings: min_confidence={} max_objects={} iou_threshold={}",
            settings.min_confidence,
            settings.max_objects,
            settings.iou_threshold
        );
        Ok(())
    }

    pub fn set_frame_cap(&mut self, frame_cap_hz: f32) -> Result<(), LensError> {
        self.inference.scheduler_mut().set_frame_cap(frame_cap_hz)
    }

    /// Detections from the latest applied cycle, in model space.
    pub fn detections(&self) -> &[Detection] {
        self.inference.scheduler().latest()
    }

    /// Latest detections mapped into the container, against the source size
    /// they were computed on. Boxes that cannot be placed right now are left
    /// out.
    pub fn overlay(&self) -> Vec<OverlayItem> {
        let Some(source) = self.inference.scheduler().latest_source_size() else {
            if !self.detections().is_empty() {
                log::debug!("source size unknown, overlay skipped");
            }
            return Vec::new();
        };
        self.detections()
            .iter()
            .filter_map(|detection| {
                match self.mapper.map_detection(detection, source, self.container) {
                    Ok(display) => Some(OverlayItem {
                        label: detection.label.clone(),
                        confidence: detection.confidence,
                        caption: detection.caption(),
                        display,
                    }),
                    Err(e) => {
                        log::debug!("skipping {}: {}", detection.label, e);
                        None
                    }
                }
            })
            .collect()
    }

    pub fn tick(&mut self, now: Duration, sink: &mut dyn ResultsSink) -> TickReport {
        let report = self.inference.tick(now);
        self.publish(&report, sink);
        report
    }

    /// Block briefly for a background result. Useful when the driver has
    /// nothing else to do.
    pub fn wait_for_outcome(
        &mut self,
        now: Duration,
        timeout: Duration,
        sink: &mut dyn ResultsSink,
    ) -> TickReport {
        let report = self.inference.wait_for_outcome(now, timeout);
        self.publish(&report, sink);
        report
    }

    /// Tear down: detach the source, stop the model, drop late results.
    pub fn shutdown(&mut self) {
        self.inference.shutdown();
        log::info!("detection session stopped");
    }

    fn publish(&self, report: &TickReport, sink: &mut dyn ResultsSink) {
        if report.applied {
            sink.detections(&self.overlay());
        }
        if let Some(rate) = report.observed_rate {
            sink.throughput(rate);
        }
    }
}
