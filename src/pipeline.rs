use image::{ImageFormat, ImageReader, RgbImage};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::annotation::annotate;
use crate::config::PipelineConfig;
use crate::detection::{DetectParams, PatchDetector};
use crate::error::{Result, TyreScanError};
use crate::models::{AnnotatedPatch, Part};
use crate::reconstruction::{reconstruct_part, stitch};
use crate::tiling::{column_policy, extract_patch, split_vertically, tile_rows};

/// Runs the split → tile → detect → annotate → reconstruct → stitch sequence.
///
/// Patches are processed strictly in order (part by part, top to bottom) and
/// the detector is only ever borrowed.
pub struct Pipeline<D: PatchDetector> {
    config: PipelineConfig,
    detector: D,
}

impl<D: PatchDetector> Pipeline<D> {
    /// Create a pipeline; the configuration is validated here
    pub fn new(config: PipelineConfig, detector: D) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, detector })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    fn detect_params(&self) -> DetectParams {
        DetectParams {
            input_size: self.config.patch_size,
            confidence_threshold: self.config.confidence_threshold,
            overlap_threshold: self.config.overlap_threshold,
        }
    }

    /// Process the image at `image_path` and write the result to the configured output path
    pub fn run(&self, image_path: &Path) -> Result<PathBuf> {
        self.run_to(image_path, &self.config.output_path)
    }

    /// Process the image at `image_path` and write the result to `output_path`.
    ///
    /// Nothing is written to `output_path` unless the whole run succeeds.
    #[instrument(skip(self), fields(detector = self.detector.name()))]
    pub fn run_to(&self, image_path: &Path, output_path: &Path) -> Result<PathBuf> {
        let image = load_image(image_path)?;
        info!("Loaded image: {}x{}", image.width(), image.height());

        let reconstructed = self.run_image(&image)?;
        write_image_atomic(&reconstructed, output_path)?;

        info!("Saved reconstructed image to {}", output_path.display());
        Ok(output_path.to_path_buf())
    }

    /// Annotate an in-memory image; the result has the same dimensions
    pub fn run_image(&self, image: &RgbImage) -> Result<RgbImage> {
        let parts = split_vertically(image, self.config.num_parts)?;

        if let Some(dir) = &self.config.scratch_directory {
            std::fs::create_dir_all(dir).map_err(|e| TyreScanError::io(dir, e))?;
        }

        let mut rebuilt = Vec::with_capacity(parts.len());
        for part in &parts {
            debug!(
                part = part.index,
                x_start = part.x_start,
                x_end = part.x_end,
                "Processing part"
            );
            let canvas = self.process_part(image, part)?;
            rebuilt.push((*part, canvas));
        }

        stitch(image.width(), image.height(), rebuilt)
    }

    /// Tile, detect, annotate and reassemble a single part
    pub fn process_part(&self, image: &RgbImage, part: &Part) -> Result<RgbImage> {
        let patch_size = self.config.patch_size;
        let policy = column_policy(part.width(), patch_size);
        let Some((col_offset, crop_width)) = policy.columns(part.width(), patch_size) else {
            warn!(
                part = part.index,
                width = part.width(),
                patch_size,
                "Part narrower than patch size, leaving it unannotated"
            );
            return reconstruct_part(part, Vec::new());
        };

        let params = self.detect_params();
        let mut annotated = Vec::new();

        for row in tile_rows(part.height, patch_size) {
            let mut patch = extract_patch(image, part, &row, col_offset, crop_width);

            let detections = self
                .detector
                .detect(&patch, &params)
                .map_err(|source| TyreScanError::Detector {
                    part: part.index,
                    patch: row.index,
                    source,
                })?;
            debug!(
                part = part.index,
                patch = row.index,
                row_offset = row.row_offset,
                detections = detections.len(),
                "Patch processed"
            );

            annotate(&mut patch, &detections, self.detector.class_names());
            self.save_scratch(part.index, annotated.len(), &patch)?;

            annotated.push(AnnotatedPatch {
                row_offset: row.row_offset,
                col_offset,
                image: patch,
            });
        }

        reconstruct_part(part, annotated)
    }

    /// Dump an annotated patch as `part{P}_patch{K}.jpg` (both 1-based)
    fn save_scratch(&self, part_index: usize, patch_index: usize, patch: &RgbImage) -> Result<()> {
        let Some(dir) = &self.config.scratch_directory else {
            return Ok(());
        };

        let filename = format!("part{}_patch{}.jpg", part_index + 1, patch_index + 1);
        let path = dir.join(&filename);
        patch.save(&path).map_err(|e| TyreScanError::image(&path, e))?;
        debug!("Scratch: saved {}", path.display());
        Ok(())
    }
}

/// Decode an image file into an RGB buffer
pub fn load_image(path: &Path) -> Result<RgbImage> {
    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| TyreScanError::io(path, e))?;
    let image = reader.decode().map_err(|e| TyreScanError::image(path, e))?;
    Ok(image.to_rgb8())
}

/// Encode `image` next to `path` and rename it into place.
///
/// The format follows the extension of `path`.
pub fn write_image_atomic(image: &RgbImage, path: &Path) -> Result<()> {
    let format = ImageFormat::from_path(path).map_err(|e| TyreScanError::image(path, e))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut staging = tempfile::Builder::new()
        .prefix(".tyrescan-")
        .tempfile_in(dir)
        .map_err(|e| TyreScanError::io(dir, e))?;
    {
        let mut writer = BufWriter::new(staging.as_file_mut());
        image
            .write_to(&mut writer, format)
            .map_err(|e| TyreScanError::image(path, e))?;
        writer.flush().map_err(|e| TyreScanError::io(path, e))?;
    }
    staging
        .persist(path)
        .map_err(|e| TyreScanError::io(path, e.error))?;
    Ok(())
}
