//! Slide composition: page image + layout → shapes on a new slide.
//!
//! Paint order on every slide is fixed:
//!
//! 1. the whole page image as background (`text_focus` only)
//! 2. cropped figures (`standard` only)
//! 3. text, block by block in the order the model returned them
//!
//! In `text_focus` mode each text block becomes two shapes: a flat
//! rectangle in the sampled background colour, slightly larger than the
//! detection box so anti-aliased glyph edges are covered too, followed by a
//! tight, zero-inset text box at the exact box. Because the text box comes
//! right after its mask, later blocks always paint over earlier masks.
//!
//! Nothing in here fails. A block without a usable box, an empty crop or a
//! crop that cannot be encoded is skipped and logged; style fields that do
//! not parse fall back to the slide defaults.

use super::background::estimate_background;
use super::encode::encode_png;
use super::geometry::{to_canvas_units, to_source_pixels, CanvasRect};
use crate::config::ReconstructionMode;
use crate::deck::{MaskRect, Picture, PictureRole, Presentation, Shape, Slide, TextBox, TextStyle};
use crate::layout::{FontFamilyClass, ImageRegion, PageLayout, TextBlock};
use image::{DynamicImage, Rgb};
use tracing::{debug, warn};

/// Normalised units added on every side of a text box for its mask.
pub const MASK_INFLATION: i32 = 5;

/// Size used when the model reports no (or a non-positive) font size.
pub const DEFAULT_FONT_SIZE_PT: f64 = 12.0;

/// Typeface substituted for `serif` text in text-focus mode.
pub const SERIF_TYPEFACE: &str = "MS Mincho";

/// Typeface substituted for all other text in text-focus mode.
pub const SANS_TYPEFACE: &str = "Meiryo";

/// What one call to [`SlideComposer::compose`] put on the slide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComposeSummary {
    pub pictures: usize,
    pub masks: usize,
    pub text_boxes: usize,
    pub skipped: usize,
}

impl ComposeSummary {
    pub fn shapes(&self) -> usize {
        self.pictures + self.masks + self.text_boxes
    }
}

/// Turns one analysed page into one slide.
#[derive(Debug, Clone, Copy)]
pub struct SlideComposer {
    mode: ReconstructionMode,
    font_scale: f64,
}

impl SlideComposer {
    pub fn new(mode: ReconstructionMode, font_scale: f64) -> Self {
        Self { mode, font_scale }
    }

    pub fn mode(&self) -> ReconstructionMode {
        self.mode
    }

    /// Append a slide to `deck` reconstructing `image` from `layout`.
    pub fn compose(
        &self,
        deck: &mut Presentation,
        image: &DynamicImage,
        layout: &PageLayout,
    ) -> ComposeSummary {
        let canvas = (deck.width(), deck.height());
        let slide = deck.add_slide();
        let mut summary = ComposeSummary::default();

        match self.mode {
            ReconstructionMode::TextFocus => {
                place_background(slide, image, canvas, &mut summary);
            }
            ReconstructionMode::Standard => {
                for region in &layout.image_regions {
                    place_region(slide, image, region, canvas, &mut summary);
                }
            }
        }

        for block in &layout.text_blocks {
            self.place_text(slide, image, block, canvas, &mut summary);
        }

        debug!(
            "Composed slide: {} pictures, {} masks, {} text boxes, {} skipped",
            summary.pictures, summary.masks, summary.text_boxes, summary.skipped
        );
        summary
    }

    /// Font attributes for a block under this composer's mode and scale.
    pub fn text_style(&self, block: &TextBlock) -> TextStyle {
        let typeface = match self.mode {
            ReconstructionMode::TextFocus => Some(substitute_typeface(block.family_class())),
            ReconstructionMode::Standard => None,
        };
        TextStyle {
            size_pt: scaled_font_size(block.font_size_pt, self.font_scale),
            bold: block.is_bold.then_some(true),
            typeface,
            color: block.font_color_hex.as_deref().and_then(parse_hex_color),
        }
    }

    fn place_text(
        &self,
        slide: &mut Slide,
        image: &DynamicImage,
        block: &TextBlock,
        (cw, ch): (i64, i64),
        summary: &mut ComposeSummary,
    ) {
        let Some(bbox) = block.box_2d else {
            debug!("Text block {:?} has no box_2d; skipped", block.text);
            summary.skipped += 1;
            return;
        };
        if bbox.is_degenerate() {
            debug!("Text block {:?} has a degenerate box {:?}; skipped", block.text, bbox);
            summary.skipped += 1;
            return;
        }

        let rect = to_canvas_units(&bbox, cw, ch);
        let style = self.text_style(block);

        let zero_margins = match self.mode {
            ReconstructionMode::TextFocus => {
                let fill = estimate_background(image, &bbox);
                slide.push(Shape::Mask(MaskRect {
                    rect: to_canvas_units(&bbox.inflate(MASK_INFLATION), cw, ch),
                    fill,
                }));
                summary.masks += 1;
                true
            }
            ReconstructionMode::Standard => false,
        };

        slide.push(Shape::Text(TextBox {
            rect,
            text: block.text.clone(),
            style,
            zero_margins,
            word_wrap: true,
        }));
        summary.text_boxes += 1;
    }
}

fn place_background(
    slide: &mut Slide,
    image: &DynamicImage,
    (cw, ch): (i64, i64),
    summary: &mut ComposeSummary,
) {
    match encode_png(image) {
        Ok(png) => {
            slide.push(Shape::Picture(Picture {
                rect: CanvasRect {
                    left: 0,
                    top: 0,
                    width: cw,
                    height: ch,
                },
                png,
                role: PictureRole::Background,
                description: "Original page".to_string(),
            }));
            summary.pictures += 1;
        }
        Err(e) => {
            warn!("Failed to place page background: {e}");
            summary.skipped += 1;
        }
    }
}

fn place_region(
    slide: &mut Slide,
    image: &DynamicImage,
    region: &ImageRegion,
    (cw, ch): (i64, i64),
    summary: &mut ComposeSummary,
) {
    let Some(bbox) = region.box_2d else {
        debug!("Image region {:?} has no box_2d; skipped", region.description);
        summary.skipped += 1;
        return;
    };

    let px = to_source_pixels(&bbox, image.width(), image.height());
    if px.is_empty() {
        debug!("Image region {:?} crops to nothing ({:?}); skipped", region.description, bbox);
        summary.skipped += 1;
        return;
    }

    let crop = image.crop_imm(px.left, px.top, px.width(), px.height());
    match encode_png(&crop) {
        Ok(png) => {
            slide.push(Shape::Picture(Picture {
                rect: to_canvas_units(&bbox, cw, ch),
                png,
                role: PictureRole::Region,
                description: region.description.clone(),
            }));
            summary.pictures += 1;
        }
        Err(e) => {
            warn!("Failed to add image region {:?}: {e}", region.description);
            summary.skipped += 1;
        }
    }
}

/// `declared × scale`, with [`DEFAULT_FONT_SIZE_PT`] standing in for a
/// missing, zero, negative or non-finite size.
pub fn scaled_font_size(declared: Option<f64>, scale: f64) -> f64 {
    let base = match declared {
        Some(size) if size.is_finite() && size > 0.0 => size,
        _ => DEFAULT_FONT_SIZE_PT,
    };
    base * scale
}

/// Parse `#RRGGBB`. Anything else yields `None`.
pub fn parse_hex_color(hex: &str) -> Option<Rgb<u8>> {
    let digits = hex.trim().strip_prefix('#')?;
    if digits.len() != 6 || !digits.bytes().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

pub fn substitute_typeface(class: FontFamilyClass) -> &'static str {
    match class {
        FontFamilyClass::Serif => SERIF_TYPEFACE,
        FontFamilyClass::Sans => SANS_TYPEFACE,
    }
}
