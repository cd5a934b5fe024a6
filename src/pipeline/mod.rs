//! Pipeline stages for page-to-slide reconstruction.
//!
//! Each submodule implements one transformation step and is tested on its
//! own. Only [`analyze`] touches the network; only [`render`] touches pdfium.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ analyze ──▶ compose ──▶ pptx
//! (sniff)   (pdfium)   (PNG)      (vision)    (shapes)    (zip)
//!                                               │
//!                                   geometry ◀──┤
//!                                 background ◀──┘
//! ```
//!
//! 1. [`input`]    classify the file by its magic bytes (PDF or raster)
//! 2. [`render`]   rasterise pages on a blocking thread, one page in flight
//! 3. [`encode`]   PNG-encode the page image for the request body
//! 4. [`analyze`]  ask the layout model for text blocks and image regions,
//!    with retry and backoff
//! 5. [`compose`]  turn one page image plus its layout into slide shapes,
//!    using [`geometry`] for coordinate mapping and [`background`] for
//!    mask colours
//! 6. [`pptx`]     serialise the finished deck as an Office Open XML package

pub mod analyze;
pub mod background;
pub mod compose;
pub mod encode;
pub mod geometry;
pub mod input;
pub mod pptx;
pub mod render;
