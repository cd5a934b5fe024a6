//! Per-file conversion: one input document in, one presentation out.
//!
//! Pages are handled strictly in order. The deck's slide size is taken from
//! the first page and kept for the whole document; every later page is
//! composed onto that same canvas. The deck is owned by this function until
//! it is returned or written, and nothing else holds a reference to it.
//!
//! Cancellation is checked before each page and once more before the
//! result is handed back, so a cancelled file is never written.

use crate::config::ConversionConfig;
use crate::deck::Presentation;
use crate::error::Pdf2PptxError;
use crate::pipeline::analyze::{resolve_analyzer, LayoutAnalyzer};
use crate::pipeline::compose::SlideComposer;
use crate::pipeline::{encode, input, pptx, render};
use crate::progress::{batch_percent, CancelFlag, EventSink, WorkerEvent};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Extension of every output file.
pub const OUTPUT_EXTENSION: &str = "pptx";

/// Counters for one converted document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub slides: usize,
    pub pictures: usize,
    pub masks: usize,
    pub text_boxes: usize,
    /// Shapes dropped for missing or degenerate geometry.
    pub skipped_shapes: usize,
    pub analysis_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// A converted document that has not been written yet.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    pub presentation: Presentation,
    pub stats: ConversionStats,
}

/// Where one file sits in a batch, plus the channels it reports through.
#[derive(Debug, Clone, Copy)]
pub struct FileContext<'a> {
    pub events: &'a EventSink,
    pub cancel: &'a CancelFlag,
    /// 0-based position of this file in the batch.
    pub file_index: usize,
    pub total_files: usize,
}

/// Result of converting and saving one file inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Saved { path: PathBuf, stats: ConversionStats },
    Cancelled,
}

/// Output path for `input`: `<output_dir>/<stem>.pptx`, or the input path
/// with its extension replaced when no directory is configured.
pub fn output_path_for(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "presentation".to_string());
    let file_name = format!("{stem}.{OUTPUT_EXTENSION}");
    match output_dir {
        Some(dir) => dir.join(file_name),
        None => input
            .parent()
            .map(|p| p.join(&file_name))
            .unwrap_or_else(|| PathBuf::from(&file_name)),
    }
}

/// Convert a PDF or image into an in-memory presentation.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2pptx::{convert, ConversionConfig, ReconstructionMode};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConversionConfig::builder()
///     .mode(ReconstructionMode::TextFocus)
///     .build()?;
/// let output = convert("slides.pdf", &config).await?;
/// println!("{} slides", output.stats.slides);
/// # Ok(())
/// # }
/// ```
pub async fn convert(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2PptxError> {
    let analyzer = resolve_analyzer(config)?;
    let events = EventSink::noop();
    let cancel = CancelFlag::new();
    let ctx = FileContext {
        events: &events,
        cancel: &cancel,
        file_index: 0,
        total_files: 1,
    };
    build_presentation(input.as_ref(), analyzer.as_ref(), config, ctx)
        .await?
        .ok_or_else(|| Pdf2PptxError::Internal("conversion cancelled".into()))
}

/// Convert and write the presentation to `output_path`.
pub async fn convert_to_file(
    input: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Pdf2PptxError> {
    let output = convert(input, config).await?;
    save(output.presentation, output_path.as_ref()).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2PptxError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2PptxError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, config))
}

/// Convert `input` and save it next to the source or into
/// `config.output_dir`. Used by the batch worker.
pub async fn convert_and_save(
    input: &Path,
    analyzer: &dyn LayoutAnalyzer,
    config: &ConversionConfig,
    ctx: FileContext<'_>,
) -> Result<FileOutcome, Pdf2PptxError> {
    let out_path = output_path_for(input, config.output_dir.as_deref());
    let Some(output) = build_presentation(input, analyzer, config, ctx).await? else {
        return Ok(FileOutcome::Cancelled);
    };
    save(output.presentation, &out_path).await?;
    Ok(FileOutcome::Saved {
        path: out_path,
        stats: output.stats,
    })
}

/// Render, analyse and compose every page of `input`.
///
/// Returns `Ok(None)` when cancellation was observed.
pub async fn build_presentation(
    input: &Path,
    analyzer: &dyn LayoutAnalyzer,
    config: &ConversionConfig,
    ctx: FileContext<'_>,
) -> Result<Option<ConversionOutput>, Pdf2PptxError> {
    let total_start = Instant::now();
    info!("Starting conversion: {}", input.display());

    let resolved = input::resolve_input(input)?;
    let mut pages = render::open_pages(&resolved, config.password.as_deref()).await?;
    let total_pages = pages.total_pages();
    if total_pages == 0 {
        return Err(Pdf2PptxError::EmptyDocument {
            path: input.to_path_buf(),
        });
    }

    let composer = SlideComposer::new(config.mode, config.font_scale);
    let mut deck: Option<Presentation> = None;
    let mut stats = ConversionStats {
        total_pages,
        ..Default::default()
    };
    let mut analysis_ms = 0u64;

    while let Some(page) = pages.next().await {
        if ctx.cancel.is_cancelled() {
            info!("Cancelled before page {} of {}", stats.slides + 1, input.display());
            return Ok(None);
        }
        let page = page?;
        let page_num = page.index + 1;

        ctx.events.send(WorkerEvent::PageStarted {
            page: page_num,
            total: total_pages,
        });
        ctx.events.log(format!("  - Page {}/{}...", page_num, total_pages));

        let deck = deck.get_or_insert_with(|| {
            debug!(
                "Slide size from first page: {:.1} x {:.1} pt",
                page.width_pt, page.height_pt
            );
            Presentation::from_page_size_pt(page.width_pt, page.height_pt)
        });

        let png = encode::encode_png(&page.image).map_err(|e| Pdf2PptxError::RasterisationFailed {
            page: page_num,
            detail: format!("Image encoding failed: {}", e),
        })?;

        let analysis_start = Instant::now();
        let layout = analyzer.analyze(&png).await?;
        analysis_ms += analysis_start.elapsed().as_millis() as u64;
        debug!(
            "Page {}: {} text blocks, {} image regions",
            page_num,
            layout.text_blocks.len(),
            layout.image_regions.len()
        );

        let summary = composer.compose(deck, &page.image, &layout);
        stats.slides += 1;
        stats.pictures += summary.pictures;
        stats.masks += summary.masks;
        stats.text_boxes += summary.text_boxes;
        stats.skipped_shapes += summary.skipped;

        ctx.events.progress(batch_percent(
            ctx.file_index,
            ctx.total_files,
            page_num,
            total_pages,
        ));
    }

    if ctx.cancel.is_cancelled() {
        info!("Cancelled before saving {}", input.display());
        return Ok(None);
    }

    let presentation = deck.ok_or_else(|| Pdf2PptxError::EmptyDocument {
        path: input.to_path_buf(),
    })?;

    stats.analysis_duration_ms = analysis_ms;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Conversion complete: {} slides, {} text boxes, {}ms total",
        stats.slides, stats.text_boxes, stats.total_duration_ms
    );

    Ok(Some(ConversionOutput {
        presentation,
        stats,
    }))
}

/// Write `deck` to `path` on a blocking thread, creating the parent directory.
/// The deck is consumed and moved to the writer thread.
async fn save(deck: Presentation, path: &Path) -> Result<(), Pdf2PptxError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Pdf2PptxError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || pptx::write_pptx(&deck, &owned))
        .await
        .map_err(|e| Pdf2PptxError::Internal(format!("Write task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconstructionMode;
    use crate::layout::PageLayout;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use image::{Rgb, RgbImage};
    use std::sync::Arc;

    struct OneBlock;

    impl LayoutAnalyzer for OneBlock {
        fn name(&self) -> &str {
            "one-block"
        }

        fn analyze<'a>(&'a self, _png: &'a [u8]) -> BoxFuture<'a, Result<PageLayout, Pdf2PptxError>> {
            async {
                Ok(PageLayout::parse(
                    r##"{"text_blocks":[{"text":"Hello","box_2d":[100,100,200,400],"font_size_pt":18,"font_color_hex":"#FF0000","font_family":"sans","is_bold":true}],"image_regions":[]}"##,
                ))
            }
            .boxed()
        }
    }

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(w, h, Rgb([250, 250, 250])).save(&path).unwrap();
        path
    }

    #[test]
    fn output_path_rules() {
        assert_eq!(
            output_path_for(Path::new("/data/in/report.v2.pdf"), Some(Path::new("/out"))),
            PathBuf::from("/out/report.v2.pptx")
        );
        assert_eq!(
            output_path_for(Path::new("/data/in/scan.PNG"), None),
            PathBuf::from("/data/in/scan.pptx")
        );
        assert_eq!(
            output_path_for(Path::new("deck.pdf"), None),
            PathBuf::from("deck.pptx")
        );
    }

    #[tokio::test]
    async fn image_input_becomes_one_slide_of_matching_size() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_png(dir.path(), "page.png", 400, 300);
        let config = ConversionConfig::builder()
            .mode(ReconstructionMode::TextFocus)
            .analyzer(Arc::new(OneBlock))
            .build()
            .unwrap();

        let out = convert(&src, &config).await.unwrap();
        assert_eq!(out.presentation.slides().len(), 1);
        assert_eq!(out.presentation.width(), 400 * 12_700);
        assert_eq!(out.presentation.height(), 300 * 12_700);
        assert_eq!(out.stats.pictures, 1);
        assert_eq!(out.stats.masks, 1);
        assert_eq!(out.stats.text_boxes, 1);
    }

    #[tokio::test]
    async fn convert_to_file_creates_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_png(dir.path(), "page.png", 40, 30);
        let out = dir.path().join("nested").join("page.pptx");
        let config = ConversionConfig::builder()
            .analyzer(Arc::new(OneBlock))
            .build()
            .unwrap();

        let stats = convert_to_file(&src, &out, &config).await.unwrap();
        assert_eq!(stats.slides, 1);
        assert!(out.is_file());
    }

    #[tokio::test]
    async fn save_consumes_the_deck_and_writes_it() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a").join("b").join("deck.pptx");
        let mut deck = Presentation::from_page_size_pt(100.0, 50.0);
        deck.add_slide();
        deck.add_slide();

        save(deck, &out).await.unwrap();

        let file = std::fs::File::open(&out).unwrap();
        let archive = zip::ZipArchive::new(file).unwrap();
        let slides = archive
            .file_names()
            .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
            .count();
        assert_eq!(slides, 2);
    }

    #[tokio::test]
    async fn cancelled_before_first_page_builds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_png(dir.path(), "page.png", 40, 30);
        let config = ConversionConfig::default();
        let events = EventSink::noop();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let ctx = FileContext {
            events: &events,
            cancel: &cancel,
            file_index: 0,
            total_files: 1,
        };

        let outcome = convert_and_save(&src, &OneBlock, &config, ctx).await.unwrap();
        assert_eq!(outcome, FileOutcome::Cancelled);
        assert!(!dir.path().join("page.pptx").exists());
    }

    #[tokio::test]
    async fn page_events_and_progress_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_png(dir.path(), "page.png", 40, 30);
        let config = ConversionConfig::default();
        let (events, mut rx) = EventSink::channel();
        let cancel = CancelFlag::new();
        let ctx = FileContext {
            events: &events,
            cancel: &cancel,
            file_index: 1,
            total_files: 2,
        };

        build_presentation(&src, &OneBlock, &config, ctx)
            .await
            .unwrap()
            .unwrap();
        drop(events);

        let mut seen = Vec::new();
        while let Some(ev) = rx.recv().await {
            seen.push(ev);
        }
        assert!(seen.contains(&WorkerEvent::PageStarted { page: 1, total: 1 }));
        assert_eq!(seen.last(), Some(&WorkerEvent::Progress(100.0)));
    }
}
