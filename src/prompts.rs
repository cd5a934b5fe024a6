//! Prompts and the structured-output schema for layout analysis.
//!
//! All prompt text lives here so it can change without touching retry or
//! transport code. Callers can override the prompt through
//! [`crate::config::ConversionConfig::system_prompt`]; the schema is fixed
//! because [`crate::layout::PageLayout::parse`] depends on its field names.

use serde_json::{json, Value};

/// Default instruction sent with every page image.
pub const LAYOUT_PROMPT: &str = r#"Analyze this document page image. The page will be rebuilt as an editable presentation slide.

Report two kinds of elements:

1. "text_blocks": every piece of visible text.
   - Group related lines (a paragraph, a list, a caption) into one block.
   - The bounding box must be TIGHT around the text. Do not pad it with empty space.
   For each block give:
   - "text": the text content, with line breaks where the page has them
   - "box_2d": [ymin, xmin, ymax, xmax] normalized to a 1000x1000 grid
   - "font_size_pt": estimated font size in points
   - "font_color_hex": estimated colour as #RRGGBB
   - "font_family": "sans" (Arial, Gothic, ...) or "serif" (Times, Mincho, ...)
   - "is_bold": true when the text is bold
   - "is_title": true when the block is a title or heading

2. "image_regions": figures, diagrams, photos, icons and complex shapes that
   should stay pictures rather than become editable text. Skip plain
   background colours and simple separator lines.
   For each region give:
   - "box_2d": [ymin, xmin, ymax, xmax] normalized to a 1000x1000 grid
   - "description": a short description of the content

Output strictly JSON."#;

/// JSON schema for the layout response (Gemini `responseSchema` dialect).
pub fn response_schema() -> Value {
    let box_2d = json!({ "type": "ARRAY", "items": { "type": "INTEGER" } });
    json!({
        "type": "OBJECT",
        "properties": {
            "text_blocks": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "text": { "type": "STRING" },
                        "box_2d": box_2d,
                        "font_size_pt": { "type": "NUMBER" },
                        "font_color_hex": { "type": "STRING" },
                        "font_family": { "type": "STRING" },
                        "is_bold": { "type": "BOOLEAN" },
                        "is_title": { "type": "BOOLEAN" }
                    }
                }
            },
            "image_regions": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "box_2d": box_2d,
                        "description": { "type": "STRING" }
                    }
                }
            }
        }
    })
}
