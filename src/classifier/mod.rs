//! Incremental few-shot classification over embedding vectors.
//!
//! - `ExemplarStore`: declared classes and their labelled feature vectors
//! - `OnlineClassifier`: nearest-exemplar cosine scoring over the store
//!
//! The store is mutated only by explicit user actions (`add_example`,
//! `clear_all`). The prediction loop only reads it.

mod online;
mod store;

pub use online::{ClassScore, OnlineClassifier, Prediction};
pub use store::{ClassExample, ClassId, ClassSummary, ExemplarStore};
