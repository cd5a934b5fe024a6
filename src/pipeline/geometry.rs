//! Geometry mapping: normalised 0–1000 boxes → source pixels and slide EMUs.
//!
//! Both mappings scale by `coordinate / 1000`, never by the pixel count of
//! the image, so the same box lands on the same relative spot in the page
//! bitmap and on the slide. Truncation toward zero matches how the page
//! crops and the slide shapes line up with each other.

use crate::layout::NormalizedBox;

const NORMALIZED_SCALE: f64 = 1000.0;

/// A rectangle in source-image pixels, `right ≥ left` and `bottom ≥ top`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl PixelRect {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// Zero width or zero height.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// A rectangle on the slide, in EMU (English Metric Units).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasRect {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

impl CanvasRect {
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

fn scale_to(coord: i32, dimension: u32) -> u32 {
    let v = (f64::from(coord) / NORMALIZED_SCALE * f64::from(dimension)) as i64;
    v.clamp(0, i64::from(dimension)) as u32
}

/// Map a box into the pixel space of a `width × height` image.
///
/// Every edge is clamped into the image. If the result would be inverted
/// the far edges collapse onto the near ones, giving a zero-area rectangle.
pub fn to_source_pixels(b: &NormalizedBox, width: u32, height: u32) -> PixelRect {
    let left = scale_to(b.xmin, width);
    let top = scale_to(b.ymin, height);
    let right = scale_to(b.xmax, width).max(left);
    let bottom = scale_to(b.ymax, height).max(top);
    PixelRect {
        left,
        top,
        right,
        bottom,
    }
}

/// Map a box onto a `canvas_width × canvas_height` slide (both in EMU).
pub fn to_canvas_units(b: &NormalizedBox, canvas_width: i64, canvas_height: i64) -> CanvasRect {
    let b = b.clamped();
    let sx = canvas_width as f64 / NORMALIZED_SCALE;
    let sy = canvas_height as f64 / NORMALIZED_SCALE;
    CanvasRect {
        left: (f64::from(b.xmin) * sx) as i64,
        top: (f64::from(b.ymin) * sy) as i64,
        width: (f64::from(b.xmax - b.xmin) * sx) as i64,
        height: (f64::from(b.ymax - b.ymin) * sy) as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_by_the_normalised_range() {
        let r = to_source_pixels(&NormalizedBox::new(100, 100, 200, 400), 2000, 1000);
        assert_eq!(
            r,
            PixelRect {
                left: 200,
                top: 100,
                right: 800,
                bottom: 200
            }
        );
    }

    #[test]
    fn source_rect_stays_inside_the_image() {
        let dims = [(1, 1), (7, 3), (640, 480), (1191, 1684)];
        let coords = [-20, 0, 1, 333, 500, 999, 1000, 1500];
        for &(w, h) in &dims {
            for &y0 in &coords {
                for &x0 in &coords {
                    for &y1 in &coords {
                        for &x1 in &coords {
                            let r = to_source_pixels(&NormalizedBox::new(y0, x0, y1, x1), w, h);
                            assert!(r.left <= r.right && r.right <= w);
                            assert!(r.top <= r.bottom && r.bottom <= h);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn inverted_box_yields_zero_area() {
        let r = to_source_pixels(&NormalizedBox::new(600, 600, 100, 100), 100, 100);
        assert!(r.is_empty());
        assert_eq!(r.left, r.right);
        assert_eq!(r.top, r.bottom);
    }

    #[test]
    fn canvas_rect_uses_emu_scale() {
        // 720 × 540 pt slide
        let (w, h) = (720 * 12_700, 540 * 12_700);
        let r = to_canvas_units(&NormalizedBox::new(100, 100, 200, 400), w, h);
        assert_eq!(r.left, 914_400);
        assert_eq!(r.top, 685_800);
        assert_eq!(r.width, 2_743_200);
        assert_eq!(r.height, 685_800);
    }

    #[test]
    fn canvas_rect_is_never_negative() {
        let r = to_canvas_units(&NormalizedBox::new(900, 900, 100, 100), 1_000_000, 1_000_000);
        assert_eq!(r.width, 0);
        assert_eq!(r.height, 0);
        assert!(r.is_empty());
    }
}
