//! Burns detection boxes and class labels into a patch.
//!
//! Labels use a small built-in 5x7 bitmap font so rendering needs no font
//! files at runtime. Characters outside the font advance the cursor blank.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::models::Detection;

pub const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const STROKE_WIDTH: u32 = 2;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const GLYPH_SCALE: u32 = 2;
/// Vertical space between the label and the top edge of its box
const LABEL_GAP: u32 = 5;

/// Display name for a class, falling back to the numeric index
pub fn label_for(class_id: usize, class_names: &[String]) -> String {
    class_names
        .get(class_id)
        .filter(|name| !name.is_empty())
        .cloned()
        .unwrap_or_else(|| class_id.to_string())
}

/// Draw every detection onto `patch` in place.
///
/// Box coordinates are patch-local; anything outside the patch is clipped.
/// The patch dimensions never change.
pub fn annotate(patch: &mut RgbImage, detections: &[Detection], class_names: &[String]) {
    let (width, height) = patch.dimensions();

    for detection in detections {
        let Some((x1, y1, x2, y2)) = detection.bbox.to_pixels(width, height) else {
            continue;
        };
        draw_box(patch, x1, y1, x2, y2);

        let label = label_for(detection.class_id, class_names);
        let (label_x, label_y) = label_origin(x1, y1);
        draw_label(patch, label_x, label_y, &label, LABEL_COLOR);
    }
}

fn draw_box(patch: &mut RgbImage, x1: i32, y1: i32, x2: i32, y2: i32) {
    for inset in 0..STROKE_WIDTH as i32 {
        let w = x2 - x1 + 1 - 2 * inset;
        let h = y2 - y1 + 1 - 2 * inset;
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at(x1 + inset, y1 + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(patch, rect, BOX_COLOR);
    }
}

/// Top-left of the label: above the box when there is room, else just inside it
fn label_origin(x1: i32, y1: i32) -> (i32, i32) {
    let text_height = (GLYPH_HEIGHT * GLYPH_SCALE + LABEL_GAP) as i32;
    if y1 >= text_height {
        (x1, y1 - text_height)
    } else {
        let inside = (STROKE_WIDTH + 2) as i32;
        (x1 + inside, y1 + inside)
    }
}

fn draw_label(patch: &mut RgbImage, mut x: i32, y: i32, text: &str, color: Rgb<u8>) {
    let (width, height) = (patch.width() as i32, patch.height() as i32);
    let scale = GLYPH_SCALE as i32;

    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if (pattern >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                        continue;
                    }
                    for dy in 0..scale {
                        for dx in 0..scale {
                            let px = x + col as i32 * scale + dx;
                            let py = y + row as i32 * scale + dy;
                            if px >= 0 && px < width && py >= 0 && py < height {
                                patch.put_pixel(px as u32, py as u32, color);
                            }
                        }
                    }
                }
            }
        }
        x += ((GLYPH_WIDTH + 1) * GLYPH_SCALE) as i32;
        if x >= width {
            break;
        }
    }
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    let bits = match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '-' => [0, 0, 0, 0b11111, 0, 0, 0],
        '_' => [0, 0, 0, 0, 0, 0, 0b11111],
        '.' => [0, 0, 0, 0, 0, 0b01100, 0b01100],
        ':' => [0, 0b01100, 0b01100, 0, 0b01100, 0b01100, 0],
        '/' => [0b00001, 0b00010, 0b00010, 0b00100, 0b01000, 0b01000, 0b10000],
        _ => return None,
    };
    Some(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoxXyxy;

    fn gray_patch(size: u32) -> RgbImage {
        RgbImage::from_pixel(size, size, Rgb([40, 40, 40]))
    }

    fn detection(x1: f32, y1: f32, x2: f32, y2: f32, class_id: usize) -> Detection {
        Detection {
            bbox: BoxXyxy::new(x1, y1, x2, y2),
            class_id,
            score: 0.9,
        }
    }

    #[test]
    fn no_detections_leaves_patch_untouched() {
        let original = gray_patch(64);
        let mut patch = original.clone();
        annotate(&mut patch, &[], &[]);
        assert_eq!(patch, original);
    }

    #[test]
    fn box_stroke_is_two_pixels_wide() {
        let mut patch = gray_patch(200);
        annotate(&mut patch, &[detection(10.0, 10.0, 100.0, 100.0, 0)], &["crack".into()]);

        for (x, y) in [(10, 10), (11, 11), (100, 100), (99, 99), (10, 55), (55, 100), (100, 30)] {
            assert_eq!(*patch.get_pixel(x, y), BOX_COLOR, "stroke missing at ({x}, {y})");
        }
        assert_ne!(*patch.get_pixel(12, 60), BOX_COLOR);
        assert_ne!(*patch.get_pixel(101, 101), BOX_COLOR);
        assert_eq!(patch.dimensions(), (200, 200));
    }

    #[test]
    fn label_is_drawn_above_when_there_is_room() {
        let mut patch = gray_patch(200);
        annotate(&mut patch, &[detection(20.0, 60.0, 120.0, 150.0, 0)], &["crack".into()]);

        let label_rows = 60 - (GLYPH_HEIGHT * GLYPH_SCALE + LABEL_GAP)..60 - LABEL_GAP;
        let has_text = label_rows
            .flat_map(|y| (20..120).map(move |x| (x, y)))
            .any(|(x, y)| *patch.get_pixel(x, y) == LABEL_COLOR);
        assert!(has_text);
    }

    #[test]
    fn label_moves_inside_near_top_edge() {
        let mut patch = gray_patch(200);
        annotate(&mut patch, &[detection(10.0, 2.0, 150.0, 100.0, 0)], &["crack".into()]);

        // strokes are never painted over by the label
        assert_eq!(*patch.get_pixel(10, 2), BOX_COLOR);
        assert_eq!(*patch.get_pixel(11, 40), BOX_COLOR);
        let has_text = (6..30)
            .flat_map(|y| (14..150).map(move |x| (x, y)))
            .any(|(x, y)| *patch.get_pixel(x, y) == LABEL_COLOR);
        assert!(has_text);
    }

    #[test]
    fn out_of_range_boxes_are_clipped() {
        let mut patch = gray_patch(50);
        annotate(
            &mut patch,
            &[
                detection(-20.0, -20.0, 200.0, 200.0, 3),
                detection(80.0, 80.0, 120.0, 120.0, 1),
            ],
            &[],
        );
        assert_eq!(*patch.get_pixel(0, 0), BOX_COLOR);
        assert_eq!(*patch.get_pixel(49, 49), BOX_COLOR);
        assert_eq!(patch.dimensions(), (50, 50));
    }

    #[test]
    fn label_falls_back_to_class_index() {
        let names = vec!["crack".to_string(), String::new()];
        assert_eq!(label_for(0, &names), "crack");
        assert_eq!(label_for(1, &names), "1");
        assert_eq!(label_for(7, &names), "7");
    }

    #[test]
    fn unknown_characters_are_skipped() {
        let mut patch = gray_patch(40);
        draw_label(&mut patch, 0, 0, "?", LABEL_COLOR);
        assert!(patch.pixels().all(|p| *p != LABEL_COLOR));
    }
}
