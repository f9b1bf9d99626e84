//! Sessions tie a scheduler, a model and a results sink together.
//!
//! - `DetectionSession`: detect objects, map boxes onto the display
//! - `TeachingSession`: capture labelled examples, predict live
//!
//! Both run on an `InferenceLoop`, which executes model calls either inline
//! on the ticking thread or on a background `InferenceWorker`. In both modes
//! the scheduler keeps at most one request outstanding.

mod detection;
mod inference_loop;
mod sink;
mod task;
mod teaching;
mod tick;
mod worker;

pub use detection::DetectionSession;
pub use inference_loop::{ExecMode, InferenceLoop, ModelStatus, TickReport};
pub use sink::{LogSink, OverlayItem, ResultsSink};
pub use task::{DetectTask, InferenceTask, PredictTask};
pub use teaching::TeachingSession;
pub use tick::{IntervalTicker, ManualTicker, Ticker};
pub use worker::{Finished, InferenceWorker};
