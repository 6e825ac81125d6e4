pub mod annotation;
pub mod config;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod reconstruction;
pub mod tiling;

pub use config::PipelineConfig;
pub use detection::{DetectParams, NullDetector, PatchDetector};
pub use error::{DetectorError, Result, TyreScanError};
pub use models::{AnnotatedPatch, BoxXyxy, Detection, Part, RowPatch};
pub use pipeline::Pipeline;

#[cfg(feature = "onnx")]
pub use detection::OnnxDetector;
