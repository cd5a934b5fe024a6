//! Page rasterisation: turn an input file into a stream of page images.
//!
//! PDF pages are rendered one at a time on a blocking thread and handed over
//! through a bounded channel, so at most one page beyond the one being
//! analysed is held in memory. pdfium keeps thread-local state and is not
//! safe to drive from async code, hence `spawn_blocking`.
//!
//! Raster inputs become a single page whose size in points equals its size
//! in pixels.

use super::input::{InputKind, ResolvedInput};
use crate::config::RENDER_ZOOM;
use crate::error::Pdf2PptxError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Environment variable naming an explicit pdfium library file.
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

/// Largest slide edge PowerPoint accepts, in points (56 inches).
pub const MAX_SLIDE_EDGE_PT: f32 = 4032.0;

/// One rasterised page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 0-based page index.
    pub index: usize,
    pub image: DynamicImage,
    /// Page size in points (1/72 inch), before zoom.
    pub width_pt: f32,
    pub height_pt: f32,
}

/// Pages of one input, produced lazily in order.
pub struct PageStream {
    total_pages: usize,
    rx: mpsc::Receiver<Result<PageImage, Pdf2PptxError>>,
}

impl PageStream {
    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// The next page, or `None` after the last one.
    ///
    /// Dropping the stream stops the renderer after its current page.
    pub async fn next(&mut self) -> Option<Result<PageImage, Pdf2PptxError>> {
        self.rx.recv().await
    }
}

/// Open `input` and start producing its pages.
///
/// Fails before any page is produced if the document cannot be opened.
pub async fn open_pages(
    input: &ResolvedInput,
    password: Option<&str>,
) -> Result<PageStream, Pdf2PptxError> {
    match input.kind {
        InputKind::Pdf => open_pdf(&input.path, password).await,
        InputKind::Image(_) => open_image(&input.path).await,
    }
}

async fn open_image(path: &Path) -> Result<PageStream, Pdf2PptxError> {
    let owned = path.to_path_buf();
    let image = tokio::task::spawn_blocking(move || image::open(&owned))
        .await
        .map_err(|e| Pdf2PptxError::Internal(format!("Image decode task panicked: {}", e)))?
        .map_err(|e| Pdf2PptxError::RasterisationFailed {
            page: 1,
            detail: e.to_string(),
        })?;

    let (width_pt, height_pt) = raster_page_size(image.width(), image.height());
    let page = PageImage {
        index: 0,
        width_pt,
        height_pt,
        image,
    };
    debug!(
        "Loaded image {} → {}x{} px",
        path.display(),
        page.image.width(),
        page.image.height()
    );

    let (tx, rx) = mpsc::channel(1);
    // Capacity 1 and a fresh channel: this cannot fail.
    let _ = tx.try_send(Ok(page));
    Ok(PageStream { total_pages: 1, rx })
}

async fn open_pdf(path: &Path, password: Option<&str>) -> Result<PageStream, Pdf2PptxError> {
    let path = path.to_path_buf();
    let password = password.map(str::to_string);
    let (count_tx, count_rx) = oneshot::channel();
    let (page_tx, page_rx) = mpsc::channel(1);

    tokio::task::spawn_blocking(move || {
        render_pdf_blocking(&path, password.as_deref(), count_tx, page_tx)
    });

    let total_pages = count_rx
        .await
        .map_err(|_| Pdf2PptxError::Internal("Render task ended before opening the PDF".into()))??;

    Ok(PageStream {
        total_pages,
        rx: page_rx,
    })
}

/// Page size for a raster input: one point per pixel, scaled down
/// proportionally when an edge would exceed [`MAX_SLIDE_EDGE_PT`].
pub fn raster_page_size(width_px: u32, height_px: u32) -> (f32, f32) {
    let (w, h) = (width_px as f32, height_px as f32);
    let longest = w.max(h);
    if longest <= MAX_SLIDE_EDGE_PT {
        (w, h)
    } else {
        let scale = MAX_SLIDE_EDGE_PT / longest;
        (w * scale, h * scale)
    }
}

/// Bind to pdfium: `PDFIUM_LIB_PATH`, then the working directory, then the
/// system library path.
pub fn bind_pdfium() -> Result<Pdfium, Pdf2PptxError> {
    let bindings = match std::env::var_os(PDFIUM_LIB_ENV) {
        Some(explicit) => Pdfium::bind_to_library(PathBuf::from(explicit)),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| Pdf2PptxError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

fn render_pdf_blocking(
    pdf_path: &Path,
    password: Option<&str>,
    count_tx: oneshot::Sender<Result<usize, Pdf2PptxError>>,
    page_tx: mpsc::Sender<Result<PageImage, Pdf2PptxError>>,
) {
    let pdfium = match bind_pdfium() {
        Ok(p) => p,
        Err(e) => {
            let _ = count_tx.send(Err(e));
            return;
        }
    };

    let document = match pdfium.load_pdf_from_file(pdf_path, password) {
        Ok(doc) => doc,
        Err(e) => {
            let _ = count_tx.send(Err(map_load_error(pdf_path, password, e)));
            return;
        }
    };

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);
    if count_tx.send(Ok(total_pages)).is_err() {
        return;
    }

    let render_config = PdfRenderConfig::new().scale_page_by_factor(RENDER_ZOOM);

    for idx in 0..total_pages {
        let rendered = pages
            .get(idx as u16)
            .map_err(|e| Pdf2PptxError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })
            .and_then(|page| {
                let bitmap = page.render_with_config(&render_config).map_err(|e| {
                    Pdf2PptxError::RasterisationFailed {
                        page: idx + 1,
                        detail: format!("{:?}", e),
                    }
                })?;
                let image = bitmap.as_image();
                debug!(
                    "Rendered page {} → {}x{} px",
                    idx + 1,
                    image.width(),
                    image.height()
                );
                Ok(PageImage {
                    index: idx,
                    image,
                    width_pt: page.width().value,
                    height_pt: page.height().value,
                })
            });

        let failed = rendered.is_err();
        if page_tx.blocking_send(rendered).is_err() {
            debug!("Page consumer gone; stopping render after page {}", idx + 1);
            return;
        }
        if failed {
            return;
        }
    }
}

fn map_load_error(pdf_path: &Path, password: Option<&str>, e: PdfiumError) -> Pdf2PptxError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            Pdf2PptxError::WrongPassword {
                path: pdf_path.to_path_buf(),
            }
        } else {
            Pdf2PptxError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        }
    } else {
        Pdf2PptxError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: err_str,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[tokio::test]
    async fn raster_input_is_one_page_sized_in_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        RgbImage::from_pixel(64, 48, Rgb([9, 9, 9])).save(&path).unwrap();

        let input = super::super::input::resolve_input(&path).unwrap();
        let mut stream = open_pages(&input, None).await.unwrap();
        assert_eq!(stream.total_pages(), 1);

        let page = stream.next().await.unwrap().unwrap();
        assert_eq!(page.index, 0);
        assert_eq!((page.width_pt, page.height_pt), (64.0, 48.0));
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn oversized_raster_keeps_aspect() {
        assert_eq!(raster_page_size(800, 600), (800.0, 600.0));
        let (w, h) = raster_page_size(8064, 4032);
        assert_eq!(w, MAX_SLIDE_EDGE_PT);
        assert_eq!(h, 2016.0);
    }

    #[tokio::test]
    async fn truncated_image_fails_to_rasterise() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\n\0\0\0\x0dIHDR\0\0").unwrap();

        let input = super::super::input::resolve_input(&path).unwrap();
        let err = open_pages(&input, None).await.err().unwrap();
        assert!(matches!(err, Pdf2PptxError::RasterisationFailed { page: 1, .. }));
    }
}
