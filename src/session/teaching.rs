use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use super::inference_loop::{ExecMode, InferenceLoop, ModelStatus, TickReport};
use super::sink::ResultsSink;
use super::task::PredictTask;
use crate::classifier::{ClassId, ClassSummary, OnlineClassifier, Prediction};
use crate::config::LensConfig;
use crate::embed::EmbeddingModel;
use crate::error::LensError;
use crate::ingest::InputSource;
use crate::schedule::FrameScheduler;

/// Teach classes from captured frames and predict on the live source.
///
/// The prediction loop and user actions share the embedder and the
/// classifier. Predictions only take a read lock on the classifier; teaching
/// and clearing take the write lock and then invalidate whatever prediction
/// is in flight, since it was scored against the old store.
pub struct TeachingSession<E: EmbeddingModel + 'static> {
    inference: InferenceLoop<PredictTask<E>>,
    embedder: Arc<Mutex<E>>,
    classifier: Arc<RwLock<OnlineClassifier>>,
}

impl<E: EmbeddingModel + 'static> TeachingSession<E> {
    pub fn new(embedder: E, config: &LensConfig, mode: ExecMode) -> Result<Self, LensError> {
        let embedder = Arc::new(Mutex::new(embedder));
        let classifier = Arc::new(RwLock::new(OnlineClassifier::new(config.classifier)));
        let task = PredictTask::new(Arc::clone(&embedder), Arc::clone(&classifier));
        Ok(Self {
            inference: InferenceLoop::new(task, config.frame_cap_hz, mode)?,
            embedder,
            classifier,
        })
    }

    pub fn start(&mut self) -> Result<(), LensError> {
        self.inference.start()
    }

    pub fn status(&self) -> &ModelStatus {
        self.inference.status()
    }

    pub fn scheduler(&self) -> &FrameScheduler<Prediction> {
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

    pub fn set_frame_cap(&mut self, frame_cap_hz: f32) -> Result<(), LensError> {
        self.inference.scheduler_mut().set_frame_cap(frame_cap_hz)
    }

    pub fn declare_class(&mut self, label: impl Into<String>) -> Result<ClassId, LensError> {
        let label = label.into();
        let id = self.write()?.declare_class(label.as_str());
        log::info!("declared class {} '{}'", id, label);
        Ok(id)
    }

    /// Capture the current frame of the active source and teach it as an
    /// example of `class_id`. Returns the class's new example count.
    pub fn capture_example(&mut self, class_id: ClassId) -> Result<usize, LensError> {
        self.ensure_ready()?;
        if !self.read()?.store().is_declared(class_id) {
            return Err(LensError::UnknownClass(class_id));
        }

        let frame = self.inference.scheduler_mut().capture_frame()?;
        let vector = self
            .embedder
            .lock()
            .map_err(|_| LensError::InferenceFailure("embedder lock poisoned".into()))?
            .embed(&frame)
            .map_err(LensError::inference)?;
        drop(frame);

        let count = self.write()?.add_example(class_id, vector)?;
        self.inference.scheduler_mut().invalidate(true);
        log::info!("captured example for class {} ({} total)", class_id, count);
        Ok(count)
    }

    /// Forget every example. Declared classes stay.
    pub fn clear_all(&mut self) -> Result<(), LensError> {
        self.write()?.clear_all();
        self.inference.scheduler_mut().invalidate(false);
        Ok(())
    }

    pub fn class_counts(&self) -> Result<Vec<ClassSummary>, LensError> {
        Ok(self.read()?.class_counts())
    }

    /// Latest applied prediction. `Prediction::Empty` until something is taught.
    pub fn prediction(&self) -> &Prediction {
        self.inference.scheduler().latest()
    }

    pub fn tick(&mut self, now: Duration, sink: &mut dyn ResultsSink) -> TickReport {
        let report = self.inference.tick(now);
        self.publish(&report, sink);
        report
    }

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

    pub fn shutdown(&mut self) {
        self.inference.shutdown();
        log::info!("teaching session stopped");
    }

    fn publish(&self, report: &TickReport, sink: &mut dyn ResultsSink) {
        if report.applied {
            sink.prediction(self.prediction());
        }
        if let Some(rate) = report.observed_rate {
            sink.throughput(rate);
        }
    }

    fn ensure_ready(&self) -> Result<(), LensError> {
        match self.inference.status() {
            ModelStatus::Ready => Ok(()),
            ModelStatus::Loading => Err(LensError::ModelUnavailable {
                model: self.inference.model_name().to_string(),
                reason: "not started".into(),
            }),
            ModelStatus::Failed(reason) => Err(LensError::ModelUnavailable {
                model: self.inference.model_name().to_string(),
                reason: reason.clone(),
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, OnlineClassifier>, LensError> {
        self.classifier
            .read()
            .map_err(|_| LensError::InferenceFailure("classifier lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, OnlineClassifier>, LensError> {
        self.classifier
            .write()
            .map_err(|_| LensError::InferenceFailure("classifier lock poisoned".into()))
    }
}
