//! Pre- and post-processing for YOLOv8-style single-head detectors.
//!
//! The model sees a letterboxed square of `input_size` pixels and emits one
//! row per anchor: `cx, cy, w, h` followed by one score per class. Rows may be
//! laid out as `[1, features, anchors]` or `[1, anchors, features]`.

use image::{Rgb, RgbImage};

use crate::error::DetectorError;
use crate::models::{BoxXyxy, Detection};

/// Padding value used around the resized patch
const LETTERBOX_FILL: u8 = 114;

/// Caps the number of candidates entering NMS
const MAX_CANDIDATES: usize = 3000;

/// Largest feature-map stride of the detection head; input sides must be a multiple of it
pub const MAX_STRIDE: u32 = 32;

/// Mapping between patch pixels and model input pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub width: u32,
    pub height: u32,
}

impl Letterbox {
    pub fn new(width: u32, height: u32, input_size: u32) -> Self {
        let scale = (input_size as f32 / width.max(1) as f32)
            .min(input_size as f32 / height.max(1) as f32);
        let new_w = ((width as f32 * scale).round() as u32).clamp(1, input_size);
        let new_h = ((height as f32 * scale).round() as u32).clamp(1, input_size);
        Self {
            scale,
            pad_x: ((input_size - new_w) / 2) as f32,
            pad_y: ((input_size - new_h) / 2) as f32,
            width,
            height,
        }
    }

    /// Map a box from model input space back to clamped patch coordinates
    pub fn unmap(&self, bbox: BoxXyxy) -> BoxXyxy {
        let max_x = self.width.saturating_sub(1) as f32;
        let max_y = self.height.saturating_sub(1) as f32;
        let fx = |v: f32| ((v - self.pad_x) / self.scale).clamp(0.0, max_x);
        let fy = |v: f32| ((v - self.pad_y) / self.scale).clamp(0.0, max_y);
        BoxXyxy::new(fx(bbox.x1), fy(bbox.y1), fx(bbox.x2), fy(bbox.y2))
    }
}

/// Resize `patch` into an `input_size` square, preserving aspect ratio
pub fn letterbox(patch: &RgbImage, input_size: u32) -> (RgbImage, Letterbox) {
    let geometry = Letterbox::new(patch.width(), patch.height(), input_size);
    if patch.width() == input_size && patch.height() == input_size {
        return (patch.clone(), geometry);
    }

    let new_w = ((patch.width() as f32 * geometry.scale).round() as u32).clamp(1, input_size);
    let new_h = ((patch.height() as f32 * geometry.scale).round() as u32).clamp(1, input_size);
    let resized = image::imageops::resize(
        patch,
        new_w,
        new_h,
        image::imageops::FilterType::Triangle,
    );

    let mut canvas = RgbImage::from_pixel(input_size, input_size, Rgb([LETTERBOX_FILL; 3]));
    image::imageops::replace(
        &mut canvas,
        &resized,
        geometry.pad_x as i64,
        geometry.pad_y as i64,
    );
    (canvas, geometry)
}

/// Planar `[3, H, W]` float tensor in `[0, 1]`
pub fn to_chw(image: &RgbImage) -> Vec<f32> {
    let (w, h) = image.dimensions();
    let plane = w as usize * h as usize;
    let mut data = vec![0.0f32; plane * 3];
    for (x, y, pixel) in image.enumerate_pixels() {
        let idx = y as usize * w as usize + x as usize;
        for c in 0..3 {
            data[c * plane + idx] = pixel[c] as f32 / 255.0;
        }
    }
    data
}

/// Fixed square input side declared by the model, `None` when it is dynamic.
///
/// `dims` is the `[batch, channels, height, width]` input shape as reported by
/// the runtime, with non-positive entries for symbolic axes.
pub fn fixed_input_size(dims: &[i64]) -> Result<Option<u32>, DetectorError> {
    if dims.len() != 4 {
        return Err(format!("expected 4D model input, got {}D", dims.len()).into());
    }
    let (height, width) = (dims[2], dims[3]);
    if height <= 0 || width <= 0 {
        return Ok(None);
    }
    if height != width {
        return Err(format!("model input must be square, got {width}x{height}").into());
    }
    let side = u32::try_from(height).map_err(|_| format!("model input side {height} is too large"))?;
    if side % MAX_STRIDE != 0 {
        return Err(format!("model input side {side} is not a multiple of {MAX_STRIDE}").into());
    }
    Ok(Some(side))
}

/// Side of the square tensor fed to the model for patches of `patch_size`.
///
/// A fixed-shape model always gets its own size; a dynamic one gets
/// `patch_size` rounded up to the head stride.
pub fn model_input_size(fixed: Option<u32>, patch_size: u32) -> u32 {
    fixed.unwrap_or_else(|| patch_size.max(1).div_ceil(MAX_STRIDE) * MAX_STRIDE)
}

/// Parse the `names` metadata entry written by YOLOv8 exports, e.g.
/// `{0: 'crack', 1: 'bulge'}`. Ids missing from the map keep an empty name.
pub fn parse_model_names(text: &str) -> Option<Vec<String>> {
    let body = text.trim().strip_prefix('{')?.strip_suffix('}')?;
    let mut entries: Vec<(usize, String)> = Vec::new();
    let mut rest = body.trim_start();

    while !rest.is_empty() {
        let colon = rest.find(':')?;
        let id: usize = rest[..colon].trim().parse().ok()?;
        rest = rest[colon + 1..].trim_start();

        let quote = rest.chars().next().filter(|c| *c == '\'' || *c == '"')?;
        let mut name = String::new();
        let mut chars = rest[1..].char_indices();
        let mut end = None;
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => name.push(chars.next()?.1),
                c if c == quote => {
                    end = Some(i + 2);
                    break;
                }
                c => name.push(c),
            }
        }
        entries.push((id, name));

        rest = rest[end?..].trim_start();
        if let Some(after) = rest.strip_prefix(',') {
            rest = after.trim_start();
        } else if !rest.is_empty() {
            return None;
        }
    }

    let len = entries.iter().map(|(id, _)| id + 1).max().unwrap_or(0);
    let mut names = vec![String::new(); len];
    for (id, name) in entries {
        names[id] = name;
    }
    Some(names)
}

/// Turn raw head output into detections in patch coordinates.
///
/// `shape` is the output tensor shape with the batch dimension included.
pub fn decode(
    output: &[f32],
    shape: &[usize],
    confidence_threshold: f32,
    geometry: &Letterbox,
) -> Result<Vec<Detection>, DetectorError> {
    if shape.len() != 3 || shape[0] != 1 {
        return Err(format!("expected output shape [1, F, N] or [1, N, F], got {shape:?}").into());
    }
    // anchors always outnumber features for this head
    let features_major = shape[1] < shape[2];
    let (features, anchors) = if features_major {
        (shape[1], shape[2])
    } else {
        (shape[2], shape[1])
    };
    if features < 5 {
        return Err(format!("output has {features} features, need at least 5").into());
    }
    if output.len() != features * anchors {
        return Err(format!(
            "output holds {} values, shape {shape:?} needs {}",
            output.len(),
            features * anchors
        )
        .into());
    }

    let at = |anchor: usize, feature: usize| -> f32 {
        if features_major {
            output[feature * anchors + anchor]
        } else {
            output[anchor * features + feature]
        }
    };

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let (class_id, score) = (4..features)
            .map(|f| (f - 4, at(anchor, f)))
            .fold((0usize, f32::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 { cur } else { best }
            });
        if !score.is_finite() || score < confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (at(anchor, 0), at(anchor, 1), at(anchor, 2), at(anchor, 3));
        if !(cx.is_finite() && cy.is_finite() && w.is_finite() && h.is_finite()) {
            continue;
        }
        if w <= 0.0 || h <= 0.0 {
            continue;
        }

        let model_box = BoxXyxy::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0);
        candidates.push(Detection {
            bbox: geometry.unmap(model_box),
            class_id,
            score,
        });
    }

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(MAX_CANDIDATES);
    Ok(candidates)
}

/// Greedy per-class non-maximum suppression; output sorted by score
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
