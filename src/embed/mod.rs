//! Feature embeddings.
//!
//! - `EmbeddingModel`: external embedding service seam
//! - `FeatureVector`: owned dense embedding; dropping it releases it
//! - `VectorTracker`: live-vector accounting for embedders
//! - `HistogramEmbedder`: deterministic stub embedder

mod backend;
mod histogram;
mod vector;

pub use backend::EmbeddingModel;
pub use histogram::HistogramEmbedder;
pub use vector::{FeatureVector, VectorTracker};
