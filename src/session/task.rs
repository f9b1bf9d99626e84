use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{anyhow, Result};

use crate::classifier::{OnlineClassifier, Prediction};
use crate::config::DetectionSettings;
use crate::detect::{Detection, DetectionModel};
use crate::embed::EmbeddingModel;
use crate::error::LensError;
use crate::frame::Frame;

/// One kind of per-frame inference the loop can schedule.
pub trait InferenceTask: Send + 'static {
    type Output: Default + Send + 'static;

    fn model_name(&self) -> String;

    /// Load the model. Failure makes the feature unavailable.
    fn warm_up(&mut self) -> Result<()>;

    fn run(&mut self, frame: &Frame) -> Result<Self::Output, LensError>;
}

/// Run one inference. A panic inside the model becomes a failed cycle so the
/// loop keeps going.
pub(crate) fn run_caught<T: InferenceTask>(
    task: &mut T,
    frame: &Frame,
) -> Result<T::Output, LensError> {
    panic::catch_unwind(AssertUnwindSafe(|| task.run(frame))).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        log::error!("model {} panicked: {}", task.model_name(), reason);
        Err(LensError::InferenceFailure(format!(
            "model panicked: {}",
            reason
        )))
    })
}

/// Object detection with runtime-adjustable settings.
pub struct DetectTask<M> {
    model: M,
    settings: Arc<Mutex<DetectionSettings>>,
}

impl<M: DetectionModel> DetectTask<M> {
    pub fn new(model: M, settings: Arc<Mutex<DetectionSettings>>) -> Self {
        Self { model, settings }
    }
}

impl<M: DetectionModel + 'static> InferenceTask for DetectTask<M> {
    type Output = Vec<Detection>;

    fn model_name(&self) -> String {
        self.model.name().to_string()
    }

    fn warm_up(&mut self) -> Result<()> {
        self.model.warm_up()
    }

    fn run(&mut self, frame: &Frame) -> Result<Vec<Detection>, LensError> {
        let settings = *self
            .settings
            .lock()
            .map_err(|_| LensError::InferenceFailure("detection settings lock poisoned".into()))?;
        self.model
            .detect(frame, &settings)
            .map_err(LensError::inference)
    }
}

/// Embed the frame, score it against the classifier, release the vector.
pub struct PredictTask<E> {
    embedder: Arc<Mutex<E>>,
    classifier: Arc<RwLock<OnlineClassifier>>,
}

impl<E: EmbeddingModel> PredictTask<E> {
    pub fn new(embedder: Arc<Mutex<E>>, classifier: Arc<RwLock<OnlineClassifier>>) -> Self {
        Self {
            embedder,
            classifier,
        }
    }
}

impl<E: EmbeddingModel + 'static> InferenceTask for PredictTask<E> {
    type Output = Prediction;

    fn model_name(&self) -> String {
        self.embedder
            .lock()
            .map(|e| e.name().to_string())
            .unwrap_or_else(|_| "embedder".to_string())
    }

    fn warm_up(&mut self) -> Result<()> {
        self.embedder
            .lock()
            .map_err(|_| anyhow!("embedder lock poisoned"))?
            .warm_up()
    }

    fn run(&mut self, frame: &Frame) -> Result<Prediction, LensError> {
        let classifier = self
            .classifier
            .read()
            .map_err(|_| LensError::InferenceFailure("classifier lock poisoned".into()))?;
        if classifier.store().is_empty() {
            return Ok(Prediction::Empty);
        }
        let vector = self
            .embedder
            .lock()
            .map_err(|_| LensError::InferenceFailure("embedder lock poisoned".into()))?
            .embed(frame)
            .map_err(LensError::inference)?;
        classifier.predict(&vector)
    }
}
