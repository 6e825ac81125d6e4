use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Result, TyreScanError};

pub const DEFAULT_PATCH_SIZE: u32 = 691;
/// Upper bound on the patch side; keeps tensor sizes addressable
pub const MAX_PATCH_SIZE: u32 = 16_384;
pub const DEFAULT_NUM_PARTS: u32 = 5;
pub const DEFAULT_CONFIDENCE: f32 = 0.6;
pub const DEFAULT_OVERLAP: f32 = 0.7;
pub const DEFAULT_SCRATCH_DIR: &str = "test_patches";
pub const DEFAULT_OUTPUT: &str = "reconstructed_result.jpg";

/// Immutable settings for one pipeline instance
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Side length of the square patch fed to the detector
    pub patch_size: u32,
    /// Number of vertical parts the image is split into
    pub num_parts: u32,
    pub confidence_threshold: f32,
    /// IoU threshold for non-maximum suppression
    pub overlap_threshold: f32,
    /// Where annotated patches are dumped for inspection; None disables it
    pub scratch_directory: Option<PathBuf>,
    pub output_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            patch_size: DEFAULT_PATCH_SIZE,
            num_parts: DEFAULT_NUM_PARTS,
            confidence_threshold: DEFAULT_CONFIDENCE,
            overlap_threshold: DEFAULT_OVERLAP,
            scratch_directory: Some(PathBuf::from(DEFAULT_SCRATCH_DIR)),
            output_path: PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(text)
            .map_err(|e| TyreScanError::invalid(format!("malformed configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| TyreScanError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    pub fn with_patch_size(mut self, patch_size: u32) -> Self {
        self.patch_size = patch_size;
        self
    }

    pub fn with_num_parts(mut self, num_parts: u32) -> Self {
        self.num_parts = num_parts;
        self
    }

    pub fn with_thresholds(mut self, confidence: f32, overlap: f32) -> Self {
        self.confidence_threshold = confidence;
        self.overlap_threshold = overlap;
        self
    }

    pub fn with_scratch_directory(mut self, dir: Option<PathBuf>) -> Self {
        self.scratch_directory = dir;
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.patch_size == 0 {
            return Err(TyreScanError::invalid("patch_size must be greater than zero"));
        }
        if self.patch_size > MAX_PATCH_SIZE {
            return Err(TyreScanError::invalid(format!(
                "patch_size must be at most {MAX_PATCH_SIZE}, got {}",
                self.patch_size
            )));
        }
        if self.num_parts == 0 {
            return Err(TyreScanError::invalid("num_parts must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(TyreScanError::invalid(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.overlap_threshold) {
            return Err(TyreScanError::invalid(format!(
                "overlap_threshold must be within [0, 1], got {}",
                self.overlap_threshold
            )));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(TyreScanError::invalid("output_path must not be empty"));
        }
        Ok(())
    }
}
