//! Error types for the edgequake-pdf2pptx library.
//!
//! Only conditions that stop a whole file (or the whole batch) are errors.
//! Malformed model responses, degenerate bounding boxes and unparseable
//! colours are recovered locally by a fallback in the module that meets
//! them, and only logged.
//!
//! Within the errors that do propagate, one condition is special:
//! [`Pdf2PptxError::InvalidCredential`]. The inference service rejected the
//! API key, so every further file would fail the same way. The batch driver
//! checks [`Pdf2PptxError::is_credential_error`] and aborts immediately
//! instead of moving on to the next file.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2pptx library.
#[derive(Debug, Error)]
pub enum Pdf2PptxError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file is neither a PDF nor a supported raster image.
    #[error("Unsupported input '{path}': expected a PDF, PNG, JPEG or BMP file")]
    UnsupportedInput { path: PathBuf },

    // ── Rasterisation errors ──────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// A page (or a raster input) could not be turned into a bitmap.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Place libpdfium next to the executable, install it system-wide, or\n\
set PDFIUM_LIB_PATH=/path/to/libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Inference errors ──────────────────────────────────────────────────
    /// No layout analyzer could be built (missing API key, unknown provider).
    #[error("Layout provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The inference service rejected the credential. Fatal to the batch.
    #[error("Invalid API key for provider '{provider}': {detail}")]
    InvalidCredential { provider: String, detail: String },

    /// The inference service failed after all retries.
    #[error("Layout analysis failed after {retries} retries: {message}")]
    LlmApiError { retries: u32, message: String },

    /// A single inference call exceeded the configured timeout.
    #[error("Layout analysis timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output presentation.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input produced no pages, so there is nothing to save.
    #[error("'{path}' contains no pages")]
    EmptyDocument { path: PathBuf },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2PptxError {
    /// `true` when the inference service rejected the API key.
    pub fn is_credential_error(&self) -> bool {
        matches!(self, Pdf2PptxError::InvalidCredential { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_credential_display() {
        let e = Pdf2PptxError::InvalidCredential {
            provider: "gemini".into(),
            detail: "API key not valid".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("gemini"), "got: {msg}");
        assert!(msg.contains("API key not valid"), "got: {msg}");
        assert!(e.is_credential_error());
    }

    #[test]
    fn llm_api_error_is_not_credential() {
        let e = Pdf2PptxError::LlmApiError {
            retries: 3,
            message: "HTTP 503".into(),
        };
        assert!(!e.is_credential_error());
        assert!(e.to_string().contains("3 retries"));
    }

    #[test]
    fn unsupported_input_names_the_file() {
        let e = Pdf2PptxError::UnsupportedInput {
            path: PathBuf::from("notes.txt"),
        };
        assert!(e.to_string().contains("notes.txt"));
    }

    #[test]
    fn api_timeout_display() {
        let e = Pdf2PptxError::ApiTimeout { secs: 120 };
        assert!(e.to_string().contains("120s"));
    }
}
