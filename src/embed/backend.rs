use anyhow::Result;

use crate::embed::vector::FeatureVector;
use crate::frame::Frame;

/// Embedding model seam.
///
/// Deterministic per frame content and side-effect free. Every returned
/// vector is owned by the caller, who either scores and drops it or hands it
/// to the classifier store.
pub trait EmbeddingModel: Send {
    fn name(&self) -> &str;

    fn embed(&mut self, frame: &Frame) -> Result<FeatureVector>;

    /// Load weights. Called once per session.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
