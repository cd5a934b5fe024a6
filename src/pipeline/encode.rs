//! Image encoding: `DynamicImage` → PNG bytes (and base64 for HTTP bodies).
//!
//! PNG everywhere: the page sent to the model must stay lossless so small
//! print survives, and the pictures embedded in the deck should look exactly
//! like the source.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} image → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Base64 for inline image parts of a JSON request.
pub fn to_base64(png: &[u8]) -> String {
    STANDARD.encode(png)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let png = encode_png(&img).expect("encode should succeed");
        assert_eq!(&png[..4], b"\x89PNG");

        let decoded = STANDARD.decode(to_base64(&png)).expect("valid base64");
        assert_eq!(decoded, png);
    }
}
