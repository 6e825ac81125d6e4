//! Splitting an image into vertical parts and each part into row patches.
//!
//! Column and row remainders are handled differently on purpose: the last
//! part absorbs the leftover columns (so it may be wider than the others),
//! while the last row patch is simply shorter than `patch_size`.

use image::RgbImage;

use crate::error::{Result, TyreScanError};
use crate::models::{Part, RowPatch};

/// Column ranges for `num_parts` vertical parts of a `width` x `height` image.
///
/// Every part is `width / num_parts` columns wide except the last one, which
/// extends to `width`.
pub fn split_columns(width: u32, height: u32, num_parts: u32) -> Result<Vec<Part>> {
    if num_parts == 0 {
        return Err(TyreScanError::invalid("num_parts must be greater than zero"));
    }
    if width == 0 || height == 0 {
        return Err(TyreScanError::invalid(format!(
            "image must have non-zero size, got {width}x{height}"
        )));
    }

    let part_width = width / num_parts;
    let parts = (0..num_parts)
        .map(|i| {
            let x_start = i * part_width;
            let x_end = if i + 1 < num_parts {
                x_start + part_width
            } else {
                width
            };
            Part {
                index: i as usize,
                x_start,
                x_end,
                height,
            }
        })
        .collect();

    Ok(parts)
}

pub fn split_vertically(image: &RgbImage, num_parts: u32) -> Result<Vec<Part>> {
    split_columns(image.width(), image.height(), num_parts)
}

/// Lazy sequence of row patches covering a part of height `part_height`.
///
/// A clone is an independent cursor at the same position; call
/// [`tile_rows`] again to start from the top.
#[derive(Debug, Clone)]
pub struct RowTiles {
    part_height: u32,
    patch_size: u32,
    next_offset: u32,
    next_index: usize,
}

pub fn tile_rows(part_height: u32, patch_size: u32) -> RowTiles {
    RowTiles {
        part_height,
        patch_size,
        next_offset: 0,
        next_index: 0,
    }
}

impl RowTiles {
    pub fn patch_count(&self) -> usize {
        if self.patch_size == 0 {
            return 0;
        }
        self.part_height.div_ceil(self.patch_size) as usize
    }
}

impl Iterator for RowTiles {
    type Item = RowPatch;

    fn next(&mut self) -> Option<RowPatch> {
        // a zero patch size would never advance
        if self.patch_size == 0 || self.next_offset >= self.part_height {
            return None;
        }

        let row_offset = self.next_offset;
        let height = self.patch_size.min(self.part_height - row_offset);
        let patch = RowPatch {
            index: self.next_index,
            row_offset,
            height,
        };

        self.next_offset = row_offset.saturating_add(self.patch_size);
        self.next_index += 1;
        Some(patch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.patch_count().saturating_sub(self.next_index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RowTiles {}

/// How a row slice of a part is fitted to the detector's input width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnPolicy {
    /// Part is exactly `patch_size` wide; use the slice as-is
    Full,
    /// Part is wider; take the centred `patch_size` columns starting at `offset`
    CenterCrop { offset: u32 },
    /// Part is narrower; no inference and nothing written back
    Skip,
}

pub fn column_policy(part_width: u32, patch_size: u32) -> ColumnPolicy {
    if part_width > patch_size {
        ColumnPolicy::CenterCrop {
            offset: (part_width - patch_size) / 2,
        }
    } else if part_width < patch_size {
        ColumnPolicy::Skip
    } else {
        ColumnPolicy::Full
    }
}

impl ColumnPolicy {
    /// Horizontal offset and width of the cropped region, None for `Skip`
    pub fn columns(&self, part_width: u32, patch_size: u32) -> Option<(u32, u32)> {
        match *self {
            ColumnPolicy::Full => Some((0, part_width)),
            ColumnPolicy::CenterCrop { offset } => Some((offset, patch_size)),
            ColumnPolicy::Skip => None,
        }
    }
}

/// Cut the detector input for `row` of `part` straight out of the full image.
///
/// `col_offset` is relative to the part's left edge.
pub fn extract_patch(
    image: &RgbImage,
    part: &Part,
    row: &RowPatch,
    col_offset: u32,
    width: u32,
) -> RgbImage {
    image::imageops::crop_imm(image, part.x_start + col_offset, row.row_offset, width, row.height)
        .to_image()
}
