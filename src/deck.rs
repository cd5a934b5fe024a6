//! In-memory slide deck: the canvas the composer draws on.
//!
//! A [`Presentation`] is built for exactly one output file. Its page size is
//! fixed from the first page of the source document and every slide shares
//! it. Shapes are stored in paint order: later shapes cover earlier ones,
//! so a text box sits on top of its mask rectangle.

use crate::pipeline::geometry::CanvasRect;
use image::Rgb;

/// EMU per typographic point (914 400 EMU per inch / 72).
pub const EMU_PER_POINT: f64 = 12_700.0;

/// An output deck with a fixed slide size.
#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    width_emu: i64,
    height_emu: i64,
    slides: Vec<Slide>,
}

impl Presentation {
    /// Create an empty deck whose slides measure `width_pt × height_pt`.
    pub fn from_page_size_pt(width_pt: f32, height_pt: f32) -> Self {
        Self {
            width_emu: (f64::from(width_pt) * EMU_PER_POINT) as i64,
            height_emu: (f64::from(height_pt) * EMU_PER_POINT) as i64,
            slides: Vec::new(),
        }
    }

    pub fn width(&self) -> i64 {
        self.width_emu
    }

    pub fn height(&self) -> i64 {
        self.height_emu
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    /// Append a blank slide and return it for drawing.
    pub fn add_slide(&mut self) -> &mut Slide {
        self.slides.push(Slide::default());
        let last = self.slides.len() - 1;
        &mut self.slides[last]
    }
}

/// One slide: an ordered list of shapes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slide {
    shapes: Vec<Shape>,
}

impl Slide {
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn push(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }

    pub fn pictures(&self) -> impl Iterator<Item = &Picture> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Picture(p) => Some(p),
            _ => None,
        })
    }

    pub fn masks(&self) -> impl Iterator<Item = &MaskRect> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Mask(m) => Some(m),
            _ => None,
        })
    }

    pub fn text_boxes(&self) -> impl Iterator<Item = &TextBox> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Text(t) => Some(t),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Picture(Picture),
    Mask(MaskRect),
    Text(TextBox),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureRole {
    /// The whole page image, stretched over the slide.
    Background,
    /// A cropped figure.
    Region,
}

/// A PNG image placed on the slide.
#[derive(Debug, Clone, PartialEq)]
pub struct Picture {
    pub rect: CanvasRect,
    pub png: Vec<u8>,
    pub role: PictureRole,
    pub description: String,
}

/// An opaque, borderless, shadowless rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskRect {
    pub rect: CanvasRect,
    pub fill: Rgb<u8>,
}

/// Character formatting shared by every paragraph of a text box.
///
/// `None` means "leave the slide's default".
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub size_pt: f64,
    pub bold: Option<bool>,
    pub typeface: Option<&'static str>,
    pub color: Option<Rgb<u8>>,
}

/// A borderless text box.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    pub rect: CanvasRect,
    pub text: String,
    pub style: TextStyle,
    /// Zero internal padding on all four sides instead of the default inset.
    pub zero_margins: bool,
    pub word_wrap: bool,
}

impl TextBox {
    /// The text split into paragraphs; each one carries the box's style.
    ///
    /// An empty text still yields one (empty) paragraph.
    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n').map(|p| p.strip_suffix('\r').unwrap_or(p))
    }
}
