mod backend;
mod backends;
mod result;

pub use backend::DetectionModel;
pub use backends::StubDetector;
pub use result::{BoundingBox, Detection};
