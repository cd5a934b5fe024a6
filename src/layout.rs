//! Page layout returned by the inference service.
//!
//! The model describes a page as two arrays: `text_blocks` (text, bounding
//! box and font attributes) and `image_regions` (bounding box and a short
//! description). Boxes use a 0–1000 grid with a top-left origin and the
//! `[ymin, xmin, ymax, xmax]` order, independent of the image's pixel size.
//!
//! Nothing the model returns is trusted. [`PageLayout::parse`] never fails:
//! a response that is not JSON becomes an empty layout, a block that does
//! not match the schema is dropped on its own, and out-of-range coordinates
//! are clamped later by the geometry mapper.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Upper bound of the normalised coordinate grid.
pub const NORMALIZED_MAX: i32 = 1000;

/// A bounding box on the 0–1000 grid, `[ymin, xmin, ymax, xmax]`.
///
/// Values are stored as received; `ymin ≤ ymax` and `xmin ≤ xmax` are not
/// guaranteed by the producer. Use [`NormalizedBox::clamped`] before doing
/// arithmetic on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "[i32; 4]")]
pub struct NormalizedBox {
    pub ymin: i32,
    pub xmin: i32,
    pub ymax: i32,
    pub xmax: i32,
}

impl NormalizedBox {
    pub const fn new(ymin: i32, xmin: i32, ymax: i32, xmax: i32) -> Self {
        Self {
            ymin,
            xmin,
            ymax,
            xmax,
        }
    }

    /// Clamp every bound into `[0, 1000]` and collapse inverted extents.
    ///
    /// An inverted box (`max < min`) becomes zero-sized at its `min` edge.
    pub fn clamped(&self) -> Self {
        let ymin = self.ymin.clamp(0, NORMALIZED_MAX);
        let xmin = self.xmin.clamp(0, NORMALIZED_MAX);
        let ymax = self.ymax.clamp(0, NORMALIZED_MAX).max(ymin);
        let xmax = self.xmax.clamp(0, NORMALIZED_MAX).max(xmin);
        Self::new(ymin, xmin, ymax, xmax)
    }

    /// Grow the box by `units` on every side, clamping each bound to the grid.
    pub fn inflate(&self, units: i32) -> Self {
        let b = self.clamped();
        Self::new(
            (b.ymin - units).clamp(0, NORMALIZED_MAX),
            (b.xmin - units).clamp(0, NORMALIZED_MAX),
            (b.ymax + units).clamp(0, NORMALIZED_MAX),
            (b.xmax + units).clamp(0, NORMALIZED_MAX),
        )
    }

    /// `true` when the clamped box has zero width or zero height.
    pub fn is_degenerate(&self) -> bool {
        let b = self.clamped();
        b.xmax <= b.xmin || b.ymax <= b.ymin
    }
}

impl TryFrom<Vec<f64>> for NormalizedBox {
    type Error = String;

    fn try_from(v: Vec<f64>) -> Result<Self, Self::Error> {
        if v.len() != 4 {
            return Err(format!("box_2d needs 4 values, got {}", v.len()));
        }
        if v.iter().any(|c| !c.is_finite()) {
            return Err("box_2d contains a non-finite value".to_string());
        }
        // Models occasionally answer with fractional coordinates.
        let c = |i: usize| v[i].round() as i32;
        Ok(Self::new(c(0), c(1), c(2), c(3)))
    }
}

impl From<NormalizedBox> for [i32; 4] {
    fn from(b: NormalizedBox) -> Self {
        [b.ymin, b.xmin, b.ymax, b.xmax]
    }
}

/// Coarse typeface class reported by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontFamilyClass {
    #[default]
    Sans,
    Serif,
}

impl FontFamilyClass {
    /// Anything other than `serif` (case-insensitive) is treated as sans.
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("serif") {
            FontFamilyClass::Serif
        } else {
            FontFamilyClass::Sans
        }
    }
}

/// One run of text with a single style.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: String,
    #[serde(default)]
    pub box_2d: Option<NormalizedBox>,
    #[serde(default, deserialize_with = "lenient_size")]
    pub font_size_pt: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub font_color_hex: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub font_family: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_bold: bool,
    /// Accepted from the schema; rendering does not look at it.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_title: bool,
}

impl TextBlock {
    pub fn family_class(&self) -> FontFamilyClass {
        self.font_family
            .as_deref()
            .map(FontFamilyClass::from_label)
            .unwrap_or_default()
    }
}

/// A figure, photo or diagram that should be carried over as a picture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRegion {
    #[serde(default)]
    pub box_2d: Option<NormalizedBox>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
}

/// Everything the model found on one page.
///
/// `text_blocks` keeps the model's order. That order is used as emission
/// order on the slide; it is not necessarily reading order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    #[serde(default)]
    pub text_blocks: Vec<TextBlock>,
    #[serde(default)]
    pub image_regions: Vec<ImageRegion>,
}

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?\s*\n(.*?)\n?```\s*$").unwrap());

impl PageLayout {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.text_blocks.is_empty() && self.image_regions.is_empty()
    }

    /// Parse a model response, degrading to an empty layout on any failure.
    pub fn parse(raw: &str) -> Self {
        let body = strip_json_fences(raw);
        let value: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(e) => {
                warn!("Layout response is not JSON ({e}); using an empty layout");
                return Self::empty();
            }
        };

        let Value::Object(mut map) = value else {
            warn!("Layout response is not a JSON object; using an empty layout");
            return Self::empty();
        };

        Self {
            text_blocks: parse_items(map.remove("text_blocks"), "text block"),
            image_regions: parse_items(map.remove("image_regions"), "image region"),
        }
    }
}

fn strip_json_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    match RE_JSON_FENCE.captures(trimmed) {
        Some(caps) => caps.get(1).map_or(trimmed, |m| m.as_str()),
        None => trimmed,
    }
}

/// Deserialise each array element on its own so one bad entry does not
/// take the rest of the page with it.
fn parse_items<T: serde::de::DeserializeOwned>(value: Option<Value>, what: &str) -> Vec<T> {
    let items = match value {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => return Vec::new(),
        Some(other) => {
            warn!("Expected an array of {what}s, got {other}; ignoring");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Dropping malformed {what} #{i}: {e}");
                None
            }
        })
        .collect()
}

/// Accept strings, numbers and `null` for free-text fields.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

// Style fields never take their block down with them: a value of the wrong
// type falls back to the field's default.

/// A number or a numeric string; anything else is `None`.
fn lenient_size<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v: &f64| v.is_finite()))
}

/// A string, or `None` for any other type.
fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Only JSON `true` is true.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(matches!(Value::deserialize(deserializer)?, Value::Bool(true)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = r##"{
        "text_blocks": [{"text": "Hello", "box_2d": [100, 100, 200, 400],
            "font_size_pt": 18, "font_color_hex": "#FF0000",
            "font_family": "sans", "is_bold": true}],
        "image_regions": []
    }"##;

    #[test]
    fn parses_the_documented_schema() {
        let layout = PageLayout::parse(HELLO);
        assert_eq!(layout.text_blocks.len(), 1);
        let b = &layout.text_blocks[0];
        assert_eq!(b.text, "Hello");
        assert_eq!(b.box_2d, Some(NormalizedBox::new(100, 100, 200, 400)));
        assert_eq!(b.font_size_pt, Some(18.0));
        assert_eq!(b.font_color_hex.as_deref(), Some("#FF0000"));
        assert!(b.is_bold);
        assert!(!b.is_title);
        assert!(layout.image_regions.is_empty());
    }

    #[test]
    fn non_json_becomes_empty_layout() {
        assert!(PageLayout::parse("Sorry, I cannot help with that.").is_empty());
        assert!(PageLayout::parse("").is_empty());
        assert!(PageLayout::parse("[1, 2, 3]").is_empty());
    }

    #[test]
    fn fenced_response_is_unwrapped() {
        let fenced = format!("```json\n{HELLO}\n```");
        assert_eq!(PageLayout::parse(&fenced).text_blocks.len(), 1);
    }

    #[test]
    fn malformed_block_is_dropped_alone() {
        let raw = r#"{"text_blocks": [
            {"text": "bad", "box_2d": [1, 2, 3]},
            {"text": "good", "box_2d": [0, 0, 10, 10]}
        ], "image_regions": [{"box_2d": "nope"}, {"box_2d": [5, 5, 50, 50], "description": "logo"}]}"#;
        let layout = PageLayout::parse(raw);
        assert_eq!(layout.text_blocks.len(), 1);
        assert_eq!(layout.text_blocks[0].text, "good");
        assert_eq!(layout.image_regions.len(), 1);
        assert_eq!(layout.image_regions[0].description, "logo");
    }

    #[test]
    fn missing_fields_use_defaults() {
        let layout = PageLayout::parse(r#"{"text_blocks": [{}]}"#);
        let b = &layout.text_blocks[0];
        assert_eq!(b.text, "");
        assert!(b.box_2d.is_none());
        assert!(b.font_size_pt.is_none());
        assert_eq!(b.family_class(), FontFamilyClass::Sans);
    }

    #[test]
    fn badly_typed_style_fields_keep_the_text() {
        let cases = [
            r#""is_bold": null"#,
            r#""font_color_hex": 0"#,
            r#""font_size_pt": "18""#,
            r#""font_family": null, "is_title": "yes""#,
        ];
        for field in cases {
            let raw = format!(
                r#"{{"text_blocks": [{{"text": "Hello", "box_2d": [100, 100, 200, 400], {field}}}]}}"#
            );
            let layout = PageLayout::parse(&raw);
            assert_eq!(layout.text_blocks.len(), 1, "block lost for {field}");
            assert_eq!(layout.text_blocks[0].text, "Hello");
        }

        let b = &PageLayout::parse(
            r#"{"text_blocks": [{"text": "x", "box_2d": [0, 0, 10, 10],
                "font_size_pt": " 18 ", "font_color_hex": 0, "font_family": 3,
                "is_bold": "true", "is_title": 1}]}"#,
        )
        .text_blocks[0];
        assert_eq!(b.font_size_pt, Some(18.0));
        assert!(b.font_color_hex.is_none());
        assert_eq!(b.family_class(), FontFamilyClass::Sans);
        assert!(!b.is_bold);
        assert!(!b.is_title);

        let b = &PageLayout::parse(r#"{"text_blocks": [{"font_size_pt": "big"}]}"#).text_blocks[0];
        assert!(b.font_size_pt.is_none());
    }

    #[test]
    fn fractional_coordinates_are_rounded() {
        let layout = PageLayout::parse(r#"{"image_regions": [{"box_2d": [0.4, 10.6, 500, 999.5]}]}"#);
        assert_eq!(
            layout.image_regions[0].box_2d,
            Some(NormalizedBox::new(0, 11, 500, 1000))
        );
    }

    #[test]
    fn family_labels() {
        assert_eq!(FontFamilyClass::from_label("serif"), FontFamilyClass::Serif);
        assert_eq!(FontFamilyClass::from_label(" SERIF "), FontFamilyClass::Serif);
        assert_eq!(FontFamilyClass::from_label("monospace"), FontFamilyClass::Sans);
    }

    #[test]
    fn inflate_never_shrinks_the_clamped_box() {
        let samples = [
            NormalizedBox::new(0, 0, 0, 0),
            NormalizedBox::new(0, 0, 1000, 1000),
            NormalizedBox::new(2, 998, 4, 1000),
            NormalizedBox::new(-50, 300, 1200, 200),
            NormalizedBox::new(100, 100, 200, 400),
        ];
        for b in samples {
            let c = b.clamped();
            let i = b.inflate(5);
            assert!(i.ymin <= c.ymin && i.xmin <= c.xmin, "{b:?}");
            assert!(i.ymax >= c.ymax && i.xmax >= c.xmax, "{b:?}");
            assert!(i.ymin >= 0 && i.xmax <= NORMALIZED_MAX, "{b:?}");
        }
    }

    #[test]
    fn inverted_box_is_degenerate() {
        assert!(NormalizedBox::new(500, 500, 100, 900).is_degenerate());
        assert!(NormalizedBox::new(0, 0, 0, 0).is_degenerate());
        assert!(!NormalizedBox::new(0, 0, 1, 1).is_degenerate());
    }
}
