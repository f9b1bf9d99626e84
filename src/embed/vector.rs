use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use zeroize::Zeroize;

/// Dense embedding for one captured frame.
///
/// There is no `Clone`: a vector has exactly one owner. Scoring borrows it,
/// `OnlineClassifier::add_example` takes it by value, and dropping it is the
/// release. Use-after-release and double-release cannot be expressed.
pub struct FeatureVector {
    values: Vec<f32>,
    lease: Option<Lease>,
}

impl FeatureVector {
    /// An untracked vector.
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            lease: None,
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Cosine similarity in `[-1, 1]`. Zero-norm vectors score `0`.
    ///
    /// Callers compare vectors of equal length; extra trailing values on
    /// either side are ignored.
    pub fn cosine(&self, other: &FeatureVector) -> f32 {
        let denom = self.norm() * other.norm();
        if denom <= f32::EPSILON || !denom.is_finite() {
            return 0.0;
        }
        let dot: f32 = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum();
        (dot / denom).clamp(-1.0, 1.0)
    }
}

impl fmt::Debug for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureVector")
            .field("len", &self.values.len())
            .field("tracked", &self.lease.is_some())
            .finish()
    }
}

impl Drop for FeatureVector {
    fn drop(&mut self) {
        self.values.zeroize();
    }
}

/// Counts vectors issued by an embedder that are still alive.
#[derive(Clone, Debug, Default)]
pub struct VectorTracker {
    live: Arc<AtomicUsize>,
}

impl VectorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap values in a vector whose release is counted by this tracker.
    pub fn issue(&self, values: Vec<f32>) -> FeatureVector {
        self.live.fetch_add(1, Ordering::SeqCst);
        FeatureVector {
            values,
            lease: Some(Lease {
                live: Arc::clone(&self.live),
            }),
        }
    }

    /// Number of issued vectors not yet released.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

struct Lease {
    live: Arc<AtomicUsize>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}
