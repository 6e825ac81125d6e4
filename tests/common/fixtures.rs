#![allow(dead_code)]

use image::{Rgb, RgbImage};
use std::cell::{Cell, RefCell};
use std::path::Path;
use tyrescan::{BoxXyxy, DetectParams, Detection, DetectorError, PatchDetector, PipelineConfig};

/// Gradient image where almost every pixel differs from its neighbours
pub fn gradient_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 251) as u8, (y % 241) as u8, ((x + y) % 239) as u8 + 16])
    })
}

/// Saves `image` as PNG under `dir` and returns its path
pub fn write_png(dir: &Path, name: &str, image: &RgbImage) -> std::path::PathBuf {
    let path = dir.join(name);
    image
        .save_with_format(&path, image::ImageFormat::Png)
        .expect("Failed to save test image");
    path
}

/// Config for in-memory runs: no scratch output
pub fn test_config(patch_size: u32, num_parts: u32) -> PipelineConfig {
    PipelineConfig::default()
        .with_patch_size(patch_size)
        .with_num_parts(num_parts)
        .with_scratch_directory(None)
}

/// Records the size of every patch it sees and answers from a script.
///
/// `hits` maps a 0-based call number to the detections returned for it.
pub struct ScriptedDetector {
    pub calls: RefCell<Vec<(u32, u32)>>,
    pub hits: Vec<(usize, Vec<Detection>)>,
    pub names: Vec<String>,
}

impl ScriptedDetector {
    pub fn silent() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            hits: Vec::new(),
            names: Vec::new(),
        }
    }

    pub fn with_hit(call: usize, detections: Vec<Detection>, names: &[&str]) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            hits: vec![(call, detections)],
            names: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl PatchDetector for ScriptedDetector {
    fn detect(&self, patch: &RgbImage, _params: &DetectParams) -> Result<Vec<Detection>, DetectorError> {
        let call = self.call_count();
        self.calls.borrow_mut().push(patch.dimensions());
        Ok(self
            .hits
            .iter()
            .find(|(n, _)| *n == call)
            .map(|(_, d)| d.clone())
            .unwrap_or_default())
    }

    fn class_names(&self) -> &[String] {
        &self.names
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Fails on the given 0-based call
pub struct FailingDetector {
    pub fail_on: usize,
    pub calls: Cell<usize>,
}

impl FailingDetector {
    pub fn new(fail_on: usize) -> Self {
        Self {
            fail_on,
            calls: Cell::new(0),
        }
    }
}

impl PatchDetector for FailingDetector {
    fn detect(&self, _patch: &RgbImage, _params: &DetectParams) -> Result<Vec<Detection>, DetectorError> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        if call == self.fail_on {
            return Err("model exploded".into());
        }
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "failing"
    }
}

pub fn crack(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
    Detection {
        bbox: BoxXyxy::new(x1, y1, x2, y2),
        class_id: 0,
        score: 0.92,
    }
}
