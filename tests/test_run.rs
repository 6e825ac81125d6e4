//! File-level runs: loading, atomic output, scratch patches and error propagation.

mod common;

use common::*;

fn scratch_files(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("scratch dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_run_writes_same_size_output() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let image = gradient_image(96, 70);
    let input = write_png(dir.path(), "tyre.png", &image);
    let output = dir.path().join("result.png");

    let config = test_config(32, 3).with_output_path(&output);
    let pipeline = Pipeline::new(config, NullDetector)?;
    let written = pipeline.run(&input)?;

    assert_eq!(written, output);
    let reloaded = image::open(&output)?.to_rgb8();
    assert_eq!(reloaded, image);
    Ok(())
}

#[test]
fn test_run_to_default_jpeg_keeps_dimensions() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let input = write_png(dir.path(), "tyre.png", &gradient_image(150, 90));
    let output = dir.path().join("reconstructed_result.jpg");

    let pipeline = Pipeline::new(test_config(50, 3), NullDetector)?;
    pipeline.run_to(&input, &output)?;

    let reloaded = image::open(&output)?;
    assert_eq!((reloaded.width(), reloaded.height()), (150, 90));
    Ok(())
}

#[test]
fn test_scratch_patches_are_named_by_part_and_patch() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let scratch = dir.path().join("patches");
    let input = write_png(dir.path(), "tyre.png", &gradient_image(64, 70));

    let config = test_config(32, 2)
        .with_scratch_directory(Some(scratch.clone()))
        .with_output_path(dir.path().join("out.png"));
    Pipeline::new(config, NullDetector)?.run(&input)?;

    assert_eq!(
        scratch_files(&scratch),
        vec![
            "part1_patch1.jpg",
            "part1_patch2.jpg",
            "part1_patch3.jpg",
            "part2_patch1.jpg",
            "part2_patch2.jpg",
            "part2_patch3.jpg",
        ]
    );
    let last = image::open(scratch.join("part2_patch3.jpg"))?;
    assert_eq!((last.width(), last.height()), (32, 6));
    Ok(())
}

#[test]
fn test_skipped_parts_leave_no_scratch_patches() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let scratch = dir.path().join("patches");
    // parts of 21, 21 and 22 columns with a 22px patch
    let input = write_png(dir.path(), "tyre.png", &gradient_image(64, 22));

    let config = test_config(22, 3)
        .with_scratch_directory(Some(scratch.clone()))
        .with_output_path(dir.path().join("out.png"));
    Pipeline::new(config, NullDetector)?.run(&input)?;

    assert_eq!(scratch_files(&scratch), vec!["part3_patch1.jpg"]);
    Ok(())
}

#[test]
fn test_missing_input_is_io_error() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let output = dir.path().join("out.png");
    let pipeline = Pipeline::new(test_config(32, 2), NullDetector)?;

    let err = pipeline.run_to(&dir.path().join("missing.png"), &output).unwrap_err();

    assert!(matches!(err, TyreScanError::Io { .. }), "got {err:?}");
    assert!(!output.exists());
    Ok(())
}

#[test]
fn test_undecodable_input_is_reported() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let input = dir.path().join("garbage.png");
    std::fs::write(&input, b"not an image")?;
    let pipeline = Pipeline::new(test_config(32, 2), NullDetector)?;

    let err = pipeline.run_to(&input, &dir.path().join("out.png")).unwrap_err();

    assert!(matches!(err, TyreScanError::Image { .. }), "got {err:?}");
    Ok(())
}

#[test]
fn test_detector_failure_aborts_without_output() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let input = write_png(dir.path(), "tyre.png", &gradient_image(64, 64));
    let output = dir.path().join("out.png");

    // 2 parts x 2 rows; call 2 is the first patch of the second part
    let detector = FailingDetector::new(2);
    let pipeline = Pipeline::new(test_config(32, 2), &detector)?;
    let err = pipeline.run_to(&input, &output).unwrap_err();

    match &err {
        TyreScanError::Detector { part, patch, source } => {
            assert_eq!((*part, *patch), (1, 0));
            assert_eq!(source.to_string(), "model exploded");
        }
        other => panic!("expected detector error, got {other:?}"),
    }
    assert_eq!(detector.calls.get(), 3, "no calls after the failure");
    assert!(!output.exists());
    Ok(())
}

#[test]
fn test_unwritable_destination_is_io_error() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let input = write_png(dir.path(), "tyre.png", &gradient_image(32, 32));
    let output = dir.path().join("no_such_dir").join("out.png");

    let pipeline = Pipeline::new(test_config(32, 1), NullDetector)?;
    let err = pipeline.run_to(&input, &output).unwrap_err();

    assert!(matches!(err, TyreScanError::Io { .. }), "got {err:?}");
    assert!(!output.exists());
    Ok(())
}

#[test]
fn test_unknown_output_format_leaves_nothing_behind() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let input = write_png(dir.path(), "tyre.png", &gradient_image(32, 32));
    let output = dir.path().join("out.unknown");

    let pipeline = Pipeline::new(test_config(32, 1), NullDetector)?;
    assert!(pipeline.run_to(&input, &output).is_err());

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())?
        .map(|e| e.map(|e| e.file_name()))
        .collect::<Result<_, _>>()?;
    assert_eq!(leftovers, vec![std::ffi::OsString::from("tyre.png")]);
    Ok(())
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let result = Pipeline::new(test_config(32, 0), NullDetector);
    assert!(matches!(result, Err(TyreScanError::InvalidInput(_))));

    let result = Pipeline::new(test_config(0, 2), NullDetector);
    assert!(matches!(result, Err(TyreScanError::InvalidInput(_))));
}

#[test]
fn test_configuration_file_drives_the_run() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config_path = dir.path().join("tyrescan.toml");
    let output = dir.path().join("from_config.png");
    std::fs::write(
        &config_path,
        format!(
            "patch_size = 20\nnum_parts = 2\nconfidence_threshold = 0.25\noutput_path = {:?}\n",
            output.to_string_lossy()
        ),
    )?;
    let input = write_png(dir.path(), "tyre.png", &gradient_image(40, 50));

    let config = PipelineConfig::from_file(&config_path)?.with_scratch_directory(None);
    assert_eq!(config.confidence_threshold, 0.25);

    let detector = ScriptedDetector::silent();
    let written = Pipeline::new(config, &detector)?.run(&input)?;

    assert_eq!(written, output);
    assert_eq!(detector.call_count(), 6);
    Ok(())
}
