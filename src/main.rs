use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use tyrescan::detection::{NullDetector, PatchDetector};
use tyrescan::{Pipeline, PipelineConfig};

#[derive(Parser)]
#[command(name = "tyrescan")]
#[command(about = "Detect defects in large tyre X-ray images, patch by patch")]
struct Cli {
    /// Path to input image file
    #[arg(value_name = "IMAGE")]
    image_path: PathBuf,

    /// ONNX detection model (YOLOv8 export)
    #[arg(short, long, value_name = "MODEL", required_unless_present = "no_model")]
    model: Option<PathBuf>,

    /// Run without a model: tiles and reassembles the image with no detections
    #[arg(long, conflicts_with = "model")]
    no_model: bool,

    /// Class names file, one name per line in class-id order (overrides names stored in the model)
    #[arg(long, value_name = "FILE")]
    classes: Option<PathBuf>,

    /// TOML configuration file; command-line flags take precedence
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output image path
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Patch side length in pixels
    #[arg(long)]
    patch_size: Option<u32>,

    /// Number of vertical parts
    #[arg(long)]
    parts: Option<u32>,

    /// Confidence threshold
    #[arg(long)]
    conf: Option<f32>,

    /// IoU threshold for non-maximum suppression
    #[arg(long)]
    iou: Option<f32>,

    /// Directory for per-patch annotated images
    #[arg(long, value_name = "DIR", conflicts_with = "no_scratch")]
    scratch_dir: Option<PathBuf>,

    /// Do not write per-patch images
    #[arg(long)]
    no_scratch: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(patch_size) = self.patch_size {
            config = config.with_patch_size(patch_size);
        }
        if let Some(parts) = self.parts {
            config = config.with_num_parts(parts);
        }
        let confidence = self.conf.unwrap_or(config.confidence_threshold);
        let overlap = self.iou.unwrap_or(config.overlap_threshold);
        config = config.with_thresholds(confidence, overlap);

        if self.no_scratch {
            config = config.with_scratch_directory(None);
        } else if let Some(dir) = &self.scratch_dir {
            config = config.with_scratch_directory(Some(dir.clone()));
        }
        if let Some(output) = &self.output {
            config = config.with_output_path(output);
        }

        config.validate()?;
        Ok(config)
    }

    fn class_names(&self) -> anyhow::Result<Option<Vec<String>>> {
        match &self.classes {
            Some(path) => Ok(Some(tyrescan::detection::load_class_names(path)?)),
            None => Ok(None),
        }
    }
}

#[cfg(feature = "onnx")]
fn load_detector(
    model: &std::path::Path,
    class_names: Option<Vec<String>>,
) -> anyhow::Result<Box<dyn PatchDetector>> {
    let mut detector = tyrescan::OnnxDetector::new(model)?;
    // names embedded in the model unless a classes file overrides them
    if let Some(class_names) = class_names {
        detector = detector.with_class_names(class_names);
    }
    Ok(Box::new(detector))
}

#[cfg(not(feature = "onnx"))]
fn load_detector(
    model: &std::path::Path,
    _class_names: Option<Vec<String>>,
) -> anyhow::Result<Box<dyn PatchDetector>> {
    anyhow::bail!(
        "cannot load {}: built without ONNX support (rebuild with --features onnx, or pass --no-model)",
        model.display()
    )
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.pipeline_config()?;

    let detector: Box<dyn PatchDetector> = match &args.model {
        Some(model) if !args.no_model => load_detector(model, args.class_names()?)?,
        _ => Box::new(NullDetector),
    };

    let pipeline = Pipeline::new(config, detector)?;
    let output = pipeline.run(&args.image_path)?;

    println!("Reconstructed image written to {}", output.display());
    Ok(())
}
