//! Background colour estimation for text masks.
//!
//! In text-focus mode the original page stays on the slide as a picture and
//! every recognised text block is covered by a flat rectangle before the
//! editable text is drawn on top. The rectangle has to match the paper (or
//! coloured panel) around the glyphs, otherwise a visible seam appears.
//!
//! Detection boxes are tight but glyphs rarely touch their edges, so the
//! box's own border is a good proxy for the local background: sample a
//! band two pixels deep along all four edges and take the most frequent
//! colour.

use super::geometry::to_source_pixels;
use crate::layout::NormalizedBox;
use image::{DynamicImage, GenericImageView, Rgb};
use std::collections::HashMap;
use tracing::debug;

/// Depth of the sampled border band, in pixels.
pub const BORDER_DEPTH: u32 = 2;

/// Returned when nothing could be sampled.
pub const FALLBACK_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Most frequent colour along the border of `region` within `image`.
///
/// Falls back to white when the region is empty after clamping.
pub fn estimate_background(image: &DynamicImage, region: &NormalizedBox) -> Rgb<u8> {
    let rect = to_source_pixels(region, image.width(), image.height());
    if rect.is_empty() {
        debug!("Degenerate sampling region {:?}; using white", region);
        return FALLBACK_BACKGROUND;
    }

    let crop = image.view(rect.left, rect.top, rect.width(), rect.height());
    let (w, h) = crop.dimensions();
    let sample = |x: u32, y: u32| {
        let [r, g, b, _] = crop.get_pixel(x, y).0;
        Rgb([r, g, b])
    };

    let mut samples = Vec::with_capacity((2 * BORDER_DEPTH * (w + h)) as usize);
    for y in 0..BORDER_DEPTH.min(h) {
        for x in 0..w {
            samples.push(sample(x, y));
            samples.push(sample(x, h - 1 - y));
        }
    }
    for x in 0..BORDER_DEPTH.min(w) {
        for y in 0..h {
            samples.push(sample(x, y));
            samples.push(sample(w - 1 - x, y));
        }
    }

    most_frequent(&samples).unwrap_or(FALLBACK_BACKGROUND)
}

/// Mode of `samples`; ties go to the colour seen first.
fn most_frequent(samples: &[Rgb<u8>]) -> Option<Rgb<u8>> {
    let mut counts: HashMap<[u8; 3], (usize, usize)> = HashMap::new();
    for (order, px) in samples.iter().enumerate() {
        counts.entry(px.0).or_insert((0, order)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, oa)), (_, (cb, ob))| ca.cmp(cb).then(ob.cmp(oa)))
        .map(|(rgb, _)| Rgb(rgb))
}
