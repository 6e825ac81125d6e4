//! Writing annotated patches back into parts, and parts back into the full image.

use image::RgbImage;

use crate::error::{Result, TyreScanError};
use crate::models::{AnnotatedPatch, Part};

/// Rebuild one part from its annotated patches.
///
/// The canvas starts zero-filled; anything no patch covers (skipped narrow
/// parts, the margins beside a centre crop) stays black.
pub fn reconstruct_part(
    part: &Part,
    patches: impl IntoIterator<Item = AnnotatedPatch>,
) -> Result<RgbImage> {
    let mut canvas = RgbImage::new(part.width(), part.height);

    for patch in patches {
        let (w, h) = patch.image.dimensions();
        let fits_x = patch.col_offset.checked_add(w).is_some_and(|end| end <= part.width());
        let fits_y = patch.row_offset.checked_add(h).is_some_and(|end| end <= part.height);
        if !fits_x || !fits_y {
            return Err(TyreScanError::invalid(format!(
                "patch {}x{} at ({}, {}) does not fit part {} ({}x{})",
                w,
                h,
                patch.col_offset,
                patch.row_offset,
                part.index,
                part.width(),
                part.height
            )));
        }
        image::imageops::replace(
            &mut canvas,
            &patch.image,
            patch.col_offset as i64,
            patch.row_offset as i64,
        );
    }

    Ok(canvas)
}

/// Place reconstructed parts side by side into a `width` x `height` image.
///
/// The parts must cover `[0, width)` left to right with no gap or overlap,
/// so every output column is written exactly once.
pub fn stitch(
    width: u32,
    height: u32,
    parts: impl IntoIterator<Item = (Part, RgbImage)>,
) -> Result<RgbImage> {
    let mut output = RgbImage::new(width, height);
    let mut next_column = 0u32;

    for (part, image) in parts {
        if part.x_start != next_column {
            return Err(TyreScanError::invalid(format!(
                "part {} starts at column {}, expected {}",
                part.index, part.x_start, next_column
            )));
        }
        if image.dimensions() != (part.width(), height) {
            return Err(TyreScanError::invalid(format!(
                "part {} is {}x{}, expected {}x{}",
                part.index,
                image.width(),
                image.height(),
                part.width(),
                height
            )));
        }
        if part.x_end > width {
            return Err(TyreScanError::invalid(format!(
                "part {} ends at column {} beyond image width {}",
                part.index, part.x_end, width
            )));
        }

        image::imageops::replace(&mut output, &image, part.x_start as i64, 0);
        next_column = part.x_end;
    }

    if next_column != width {
        return Err(TyreScanError::invalid(format!(
            "parts cover columns [0, {next_column}) of {width}"
        )));
    }

    Ok(output)
}
