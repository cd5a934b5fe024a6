//! Input resolution: validate a user-supplied path and detect its kind.
//!
//! The kind is decided by content, not extension: `%PDF` magic bytes mean a
//! PDF, otherwise the `image` crate's format sniffing decides between PNG,
//! JPEG and BMP. Anything else is rejected before rendering starts so the
//! caller gets a meaningful error rather than a pdfium failure.

use crate::error::Pdf2PptxError;
use image::ImageFormat;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Number of leading bytes inspected for format detection.
const SNIFF_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// A PDF document; one slide per page.
    Pdf,
    /// A single raster image; exactly one slide.
    Image(ImageFormat),
}

/// A readable input file of a supported kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInput {
    pub path: PathBuf,
    pub kind: InputKind,
}

/// Validate `path` and detect its kind.
pub fn resolve_input(path: &Path) -> Result<ResolvedInput, Pdf2PptxError> {
    let path = path.to_path_buf();

    if !path.is_file() {
        return Err(Pdf2PptxError::FileNotFound { path });
    }

    let mut head = Vec::with_capacity(SNIFF_LEN);
    match std::fs::File::open(&path) {
        Ok(f) => {
            f.take(SNIFF_LEN as u64)
                .read_to_end(&mut head)
                .map_err(|_| Pdf2PptxError::UnsupportedInput { path: path.clone() })?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2PptxError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Pdf2PptxError::FileNotFound { path });
        }
    }

    let kind = detect_kind(&head).ok_or_else(|| Pdf2PptxError::UnsupportedInput {
        path: path.clone(),
    })?;
    debug!("Resolved {:?} input: {}", kind, path.display());
    Ok(ResolvedInput { path, kind })
}

/// Classify leading file bytes.
pub fn detect_kind(head: &[u8]) -> Option<InputKind> {
    if head.starts_with(b"%PDF") {
        return Some(InputKind::Pdf);
    }
    match image::guess_format(head) {
        Ok(fmt @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Bmp)) => {
            Some(InputKind::Image(fmt))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_magic_bytes() {
        assert_eq!(detect_kind(b"%PDF-1.7\n"), Some(InputKind::Pdf));
        assert_eq!(
            detect_kind(b"\x89PNG\r\n\x1a\n\0\0\0\x0dIHDR"),
            Some(InputKind::Image(ImageFormat::Png))
        );
        assert_eq!(
            detect_kind(b"\xff\xd8\xff\xe0\0\x10JFIF"),
            Some(InputKind::Image(ImageFormat::Jpeg))
        );
        assert_eq!(detect_kind(b"BM\0\0\0\0"), Some(InputKind::Image(ImageFormat::Bmp)));
        assert_eq!(detect_kind(b"GIF89a"), None);
        assert_eq!(detect_kind(b"hello"), None);
        assert_eq!(detect_kind(b""), None);
    }

    #[test]
    fn missing_file() {
        let err = resolve_input(Path::new("/no/such/file.pdf")).unwrap_err();
        assert!(matches!(err, Pdf2PptxError::FileNotFound { .. }));
    }

    #[test]
    fn extension_is_not_trusted() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("slides.pdf");
        std::fs::write(&fake, b"plain text").unwrap();
        assert!(matches!(
            resolve_input(&fake).unwrap_err(),
            Pdf2PptxError::UnsupportedInput { .. }
        ));

        let real = dir.path().join("scan.bin");
        std::fs::write(&real, b"%PDF-1.4 rest").unwrap();
        assert_eq!(resolve_input(&real).unwrap().kind, InputKind::Pdf);
    }

    #[test]
    fn directory_is_not_an_input() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            resolve_input(dir.path()).unwrap_err(),
            Pdf2PptxError::FileNotFound { .. }
        ));
    }
}
