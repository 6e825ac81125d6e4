use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Value;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::yolo;
use super::{DetectParams, PatchDetector};
use crate::error::{DetectorError, Result, TyreScanError};
use crate::models::Detection;

/// YOLOv8 detector running an exported ONNX model on the CPU
pub struct OnnxDetector {
    // Session::run needs exclusive access
    session: Mutex<Session>,
    // square side declared by the export, None for dynamic axes
    fixed_input: Option<u32>,
    class_names: Vec<String>,
}

impl OnnxDetector {
    pub fn new(model_path: impl AsRef<Path>) -> Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(TyreScanError::io(
                model_path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "model file not found"),
            ));
        }

        let model_error = |source: DetectorError| TyreScanError::ModelLoad {
            path: model_path.to_path_buf(),
            source,
        };

        info!("Loading detection model from {}", model_path.display());
        let session = build_session(model_path).map_err(model_error)?;
        let input = session
            .inputs
            .first()
            .ok_or_else(|| model_error("model has no inputs".into()))?;
        let dims: Vec<i64> = input
            .input_type
            .tensor_shape()
            .map(|shape| shape.iter().copied().collect())
            .ok_or_else(|| model_error("model input is not a tensor".into()))?;
        let fixed_input = yolo::fixed_input_size(&dims).map_err(model_error)?;
        debug!("Model input {}: {:?}", input.name, dims);

        let class_names = embedded_class_names(&session);
        info!(
            classes = class_names.len(),
            fixed_input = ?fixed_input,
            "Detection model ready"
        );

        Ok(Self {
            session: Mutex::new(session),
            fixed_input,
            class_names,
        })
    }

    /// Replace the class names read from the model metadata
    pub fn with_class_names(mut self, class_names: Vec<String>) -> Self {
        self.class_names = class_names;
        self
    }

    /// Side of the square tensor the model is run at for patches of `patch_size`
    pub fn input_size(&self, patch_size: u32) -> u32 {
        yolo::model_input_size(self.fixed_input, patch_size)
    }
}

fn build_session(model_path: &Path) -> std::result::Result<Session, DetectorError> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .commit_from_file(model_path)?;
    Ok(session)
}

/// Class names stored in the export's `names` metadata entry, if any
fn embedded_class_names(session: &Session) -> Vec<String> {
    let entry = session
        .metadata()
        .and_then(|metadata| metadata.custom("names"));
    match entry {
        Ok(Some(text)) => yolo::parse_model_names(&text).unwrap_or_else(|| {
            warn!("Ignoring unreadable class names in model metadata");
            Vec::new()
        }),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("Could not read model metadata: {e}");
            Vec::new()
        }
    }
}

impl PatchDetector for OnnxDetector {
    fn detect(
        &self,
        patch: &RgbImage,
        params: &DetectParams,
    ) -> std::result::Result<Vec<Detection>, DetectorError> {
        let input_size = self.input_size(params.input_size);
        let size = input_size as usize;
        let (input, geometry) = yolo::letterbox(patch, input_size);
        let tensor = Array4::from_shape_vec((1, 3, size, size), yolo::to_chw(&input))?;
        let input_value = Value::from_array(tensor)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| DetectorError::from("detector session lock poisoned"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        let output = outputs[0].try_extract_array::<f32>()?;

        let shape = output.shape().to_vec();
        let data: Vec<f32> = output.iter().copied().collect();
        let candidates = yolo::decode(&data, &shape, params.confidence_threshold, &geometry)?;
        let detections = yolo::non_max_suppression(candidates, params.overlap_threshold);

        debug!(detections = detections.len(), "Patch inference complete");
        Ok(detections)
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn name(&self) -> &str {
        "onnx-yolo"
    }
}
