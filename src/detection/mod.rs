pub mod yolo;
#[cfg(feature = "onnx")]
pub mod onnx;

use image::RgbImage;
use std::path::Path;

use crate::error::{DetectorError, Result, TyreScanError};
use crate::models::Detection;

#[cfg(feature = "onnx")]
pub use onnx::OnnxDetector;

/// Per-call inference parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectParams {
    /// Patch side used by the pipeline; a backend may round it to a size its model accepts
    pub input_size: u32,
    pub confidence_threshold: f32,
    /// IoU above which overlapping boxes of one class are suppressed
    pub overlap_threshold: f32,
}

/// Object detector consumed by the pipeline.
///
/// Implementations receive one patch at a time and return boxes in that
/// patch's pixel coordinates. Calls are strictly sequential within a run and
/// must not depend on state left behind by earlier calls.
pub trait PatchDetector {
    fn detect(
        &self,
        patch: &RgbImage,
        params: &DetectParams,
    ) -> std::result::Result<Vec<Detection>, DetectorError>;

    /// Class names indexed by class id; empty when the model carries none
    fn class_names(&self) -> &[String] {
        &[]
    }

    /// Human-readable backend name (used in logs)
    fn name(&self) -> &str;
}

impl<D: PatchDetector + ?Sized> PatchDetector for &D {
    fn detect(
        &self,
        patch: &RgbImage,
        params: &DetectParams,
    ) -> std::result::Result<Vec<Detection>, DetectorError> {
        (**self).detect(patch, params)
    }

    fn class_names(&self) -> &[String] {
        (**self).class_names()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<D: PatchDetector + ?Sized> PatchDetector for Box<D> {
    fn detect(
        &self,
        patch: &RgbImage,
        params: &DetectParams,
    ) -> std::result::Result<Vec<Detection>, DetectorError> {
        (**self).detect(patch, params)
    }

    fn class_names(&self) -> &[String] {
        (**self).class_names()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Detector that never finds anything; runs the geometry alone
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDetector;

impl PatchDetector for NullDetector {
    fn detect(
        &self,
        _patch: &RgbImage,
        _params: &DetectParams,
    ) -> std::result::Result<Vec<Detection>, DetectorError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// Parse class names, one per line; blank lines keep their index
pub fn parse_class_names(text: &str) -> Vec<String> {
    text.lines().map(|line| line.trim().to_string()).collect()
}

pub fn load_class_names(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| TyreScanError::io(path, e))?;
    Ok(parse_class_names(&text))
}
