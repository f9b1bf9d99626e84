use serde::Serialize;

use super::store::{ClassId, ClassSummary, ExemplarStore};
use crate::config::ClassifierSettings;
use crate::embed::FeatureVector;
use crate::error::LensError;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassScore {
    pub class_id: ClassId,
    pub label: String,
    /// Share of the distribution, in `[0, 1]`.
    pub confidence: f32,
}

/// Result of one prediction.
///
/// `Empty` means "nothing taught yet", not a failure.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub enum Prediction {
    #[default]
    Empty,
    /// One score per class with at least one exemplar, summing to 1.
    Distribution(Vec<ClassScore>),
}

impl Prediction {
    pub fn is_empty(&self) -> bool {
        matches!(self, Prediction::Empty)
    }

    pub fn scores(&self) -> &[ClassScore] {
        match self {
            Prediction::Empty => &[],
            Prediction::Distribution(scores) => scores,
        }
    }

    pub fn top(&self) -> Option<&ClassScore> {
        self.scores()
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }

    pub fn confidence(&self, class_id: ClassId) -> Option<f32> {
        self.scores()
            .iter()
            .find(|s| s.class_id == class_id)
            .map(|s| s.confidence)
    }
}

/// Nearest-exemplar classifier.
///
/// Each populated class is scored by the cosine similarity between the query
/// and its closest exemplar. Scores are turned into a distribution with a
/// temperature softmax, so a query identical to one of a class's exemplars
/// always gives that class the highest confidence.
#[derive(Debug, Default)]
pub struct OnlineClassifier {
    store: ExemplarStore,
    settings: ClassifierSettings,
}

impl OnlineClassifier {
    pub fn new(settings: ClassifierSettings) -> Self {
        Self {
            store: ExemplarStore::new(),
            settings,
        }
    }

    pub fn store(&self) -> &ExemplarStore {
        &self.store
    }

    pub fn declare_class(&mut self, label: impl Into<String>) -> ClassId {
        self.store.declare_class(label)
    }

    /// Teach one example. The vector moves into the store; the caller can no
    /// longer use or release it.
    ///
    /// ```compile_fail
    /// use teachable_lens::classifier::OnlineClassifier;
    /// use teachable_lens::embed::FeatureVector;
    ///
    /// let mut classifier = OnlineClassifier::default();
    /// let mug = classifier.declare_class("mug");
    /// let vector = FeatureVector::new(vec![1.0, 0.0]);
    /// classifier.add_example(mug, vector).unwrap();
    /// drop(vector);
    /// ```
    pub fn add_example(&mut self, class_id: ClassId, vector: FeatureVector) -> Result<usize, LensError> {
        let count = self.store.add_example(class_id, vector)?;
        log::debug!("class {} now has {} examples", class_id, count);
        Ok(count)
    }

    pub fn clear_all(&mut self) {
        self.store.clear_all();
        log::info!("classifier cleared");
    }

    pub fn class_counts(&self) -> Vec<ClassSummary> {
        self.store.classes()
    }

    /// Score `vector` against the store. Borrows the query; the caller
    /// releases it afterwards.
    pub fn predict(&self, vector: &FeatureVector) -> Result<Prediction, LensError> {
        if self.store.is_empty() {
            return Ok(Prediction::Empty);
        }
        if let Some(expected) = self.store.dims() {
            if expected != vector.len() {
                return Err(LensError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }

        let nearest: Vec<(ClassId, &str, f32)> = self
            .store
            .populated()
            .map(|(id, label, examples)| {
                let best = examples
                    .iter()
                    .map(|ex| vector.cosine(&ex.vector))
                    .fold(f32::NEG_INFINITY, f32::max);
                (id, label, best)
            })
            .collect();

        let temperature = self.settings.temperature;
        let peak = nearest
            .iter()
            .map(|(_, _, s)| *s)
            .fold(f32::NEG_INFINITY, f32::max);
        let weights: Vec<f64> = nearest
            .iter()
            .map(|(_, _, s)| (((s - peak) / temperature) as f64).exp())
            .collect();
        let total: f64 = weights.iter().sum();

        let scores = nearest
            .iter()
            .zip(weights)
            .map(|((id, label, _), w)| ClassScore {
                class_id: *id,
                label: (*label).to_string(),
                confidence: (w / total) as f32,
            })
            .collect();
        Ok(Prediction::Distribution(scores))
    }
}
