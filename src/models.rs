use image::RgbImage;

/// Axis-aligned box in patch-local pixel coordinates, corners inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxXyxy {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoxXyxy {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box
    pub fn iou(&self, other: &BoxXyxy) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }

    /// Round to integer pixel corners, clamped to a `width` x `height` raster.
    /// Returns None when the box falls entirely outside it.
    pub fn to_pixels(&self, width: u32, height: u32) -> Option<(i32, i32, i32, i32)> {
        if width == 0 || height == 0 {
            return None;
        }
        let max_x = (width - 1) as f32;
        let max_y = (height - 1) as f32;
        if self.x2 < 0.0 || self.y2 < 0.0 || self.x1 > max_x || self.y1 > max_y {
            return None;
        }
        Some((
            self.x1.clamp(0.0, max_x).round() as i32,
            self.y1.clamp(0.0, max_y).round() as i32,
            self.x2.clamp(0.0, max_x).round() as i32,
            self.y2.clamp(0.0, max_y).round() as i32,
        ))
    }
}

/// One predicted object in a single patch
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BoxXyxy,
    pub class_id: usize,
    pub score: f32,
}

/// A vertical slice of the source image: columns `[x_start, x_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Part {
    pub index: usize,
    pub x_start: u32,
    pub x_end: u32,
    pub height: u32,
}

impl Part {
    pub fn width(&self) -> u32 {
        self.x_end - self.x_start
    }
}

/// Placement of a row slice of a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPatch {
    /// 0-based position in the row sequence
    pub index: usize,
    pub row_offset: u32,
    pub height: u32,
}

/// An annotated patch and where it goes back into its part
#[derive(Debug, Clone)]
pub struct AnnotatedPatch {
    pub row_offset: u32,
    pub col_offset: u32,
    pub image: RgbImage,
}
