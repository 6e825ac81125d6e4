mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from tyrescan for tests
pub use tyrescan::{
    BoxXyxy, DetectParams, Detection, DetectorError, NullDetector, PatchDetector, Pipeline,
    PipelineConfig, TyreScanError,
};
