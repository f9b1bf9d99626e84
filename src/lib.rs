//! Teachable Lens
//!
//! Real-time object detection and few-shot "teachable" classification over a
//! live camera stream or an uploaded video/image.
//!
//! # Architecture
//!
//! A session is driven by an external tick (display refresh or timer). On
//! each tick the `FrameScheduler` decides whether to capture a frame and hand
//! it to a model. It enforces three rules:
//!
//! 1. **Pacing**: inferences are issued at most `frame_cap_hz` times a second.
//! 2. **Non-overlap**: at most one inference is outstanding per scheduler.
//! 3. **Epoch cancellation**: pausing, switching source or tearing down bumps
//!    an epoch; results issued under an older epoch are discarded on arrival.
//!
//! Detection results are mapped onto the display with `CoordinateMapper`
//! (cover fit, margin clamp, label placement). Teaching captures frames,
//! embeds them and stores the vectors in an `ExemplarStore`; the prediction
//! loop scores the live frame against it with `OnlineClassifier`.
//!
//! # Module Structure
//!
//! - `ingest`: input sources (live, uploaded video, uploaded image)
//! - `detect` / `embed`: model seams and deterministic stub models
//! - `schedule`: the frame scheduler and throughput meter
//! - `overlay`: model-space to display-space mapping
//! - `classifier`: exemplar store and nearest-exemplar classifier
//! - `session`: detection and teaching sessions, worker, tick drivers, sinks

pub mod classifier;
pub mod config;
pub mod detect;
pub mod embed;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod overlay;
pub mod schedule;
pub mod session;

pub use classifier::{ClassId, ClassScore, ExemplarStore, OnlineClassifier, Prediction};
pub use config::{DetectionSettings, LensConfig, OverlaySettings};
pub use detect::{BoundingBox, Detection, DetectionModel, StubDetector};
pub use embed::{EmbeddingModel, FeatureVector, HistogramEmbedder, VectorTracker};
pub use error::LensError;
pub use frame::{Frame, Size};
pub use ingest::{
    ClipConfig, ClipSource, FrameSource, InputSource, LiveConfig, LiveSource, Mode, ReadyState,
    SourceKind, StillImage, VideoPlayback,
};
pub use overlay::{CoordinateMapper, DisplayBox};
pub use schedule::{FrameScheduler, SchedulerState, Step, DEFAULT_FRAME_CAP_HZ};
pub use session::{
    DetectionSession, ExecMode, LogSink, ModelStatus, OverlayItem, ResultsSink, TeachingSession,
};
