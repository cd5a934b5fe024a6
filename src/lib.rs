//! # edgequake-pdf2pptx
//!
//! Rebuild PDF pages and scanned images as editable PowerPoint slides using a
//! vision layout model.
//!
//! ## Why this crate?
//!
//! A slide deck exported to PDF, or a photographed handout, is frozen: the
//! text cannot be fixed and the figures cannot be moved. This crate rasterises
//! every page, asks a vision model where the text blocks and pictures are, and
//! writes one slide per page with real text boxes where the text was. The
//! figures are either cropped out as pictures or kept in a full-page
//! background with the old text masked out, depending on the
//! [`ReconstructionMode`].
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / PNG / JPEG / BMP
//!  │
//!  ├─ 1. Input    sniff the file type from its magic bytes
//!  ├─ 2. Render   rasterise pages via pdfium (spawn_blocking, one page ahead)
//!  ├─ 3. Analyse  layout model returns text blocks + image regions (0‥1000 boxes)
//!  ├─ 4. Compose  background or crops, masks, text boxes in EMU
//!  └─ 5. Write    .pptx package next to the input, atomically
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2pptx::{convert_to_file, ConversionConfig, ReconstructionMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key from GOOGLE_API_KEY / GEMINI_API_KEY or the saved settings file
//!     let config = ConversionConfig::builder()
//!         .mode(ReconstructionMode::Standard)
//!         .font_scale(1.1)
//!         .build()?;
//!     let stats = convert_to_file("lecture.pdf", "lecture.pptx", &config).await?;
//!     eprintln!("{} slides, {} text boxes", stats.slides, stats.text_boxes);
//!     Ok(())
//! }
//! ```
//!
//! For several files with progress reporting and cancellation, see
//! [`spawn_batch`] and [`run_batch`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2pptx` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2pptx = { version = "0.1", default-features = false }
//! ```
//!
//! ## Reconstruction Modes
//!
//! | Mode | Background | Figures | Masks | Typeface |
//! |------|-----------|---------|-------|----------|
//! | `standard`   | none | cropped pictures | no | theme default |
//! | `text-focus` | page render | kept in the background | yes | serif / sans substitute |
//!
//! Both modes apply the detected size (times the font scale), bold flag and
//! colour to every text box.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod convert;
pub mod deck;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod settings;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{run_batch, spawn_batch, BatchHandle};
pub use config::{ConversionConfig, ConversionConfigBuilder, ReconstructionMode};
pub use convert::{convert, convert_sync, convert_to_file, output_path_for, ConversionOutput, ConversionStats};
pub use deck::Presentation;
pub use error::Pdf2PptxError;
pub use layout::{ImageRegion, NormalizedBox, PageLayout, TextBlock};
pub use pipeline::analyze::LayoutAnalyzer;
pub use progress::{BatchStatus, CancelFlag, EventSink, WorkerEvent};
