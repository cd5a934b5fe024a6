//! Configuration types for PDF/image-to-slides conversion.
//!
//! Every knob lives in [`ConversionConfig`], built through
//! [`ConversionConfigBuilder`]. One run uses one config: the reconstruction
//! mode and font scale are fixed for all files of a batch.

use crate::error::Pdf2PptxError;
use crate::pipeline::analyze::LayoutAnalyzer;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Zoom applied when rasterising PDF pages (2× the document's native 72 dpi).
pub const RENDER_ZOOM: f32 = 2.0;

/// Default multiplier on every detected font size.
pub const DEFAULT_FONT_SCALE: f64 = 1.1;

/// Default model for the built-in Gemini client.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// How a page is rebuilt on its slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconstructionMode {
    /// Figures become cropped pictures, text becomes text boxes, no background.
    #[default]
    Standard,
    /// The original page is the background; text areas are masked and redrawn.
    TextFocus,
}

impl ReconstructionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconstructionMode::Standard => "standard",
            ReconstructionMode::TextFocus => "text_focus",
        }
    }
}

impl fmt::Display for ReconstructionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReconstructionMode {
    type Err = Pdf2PptxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "standard" => Ok(ReconstructionMode::Standard),
            "text_focus" => Ok(ReconstructionMode::TextFocus),
            other => Err(Pdf2PptxError::InvalidConfig(format!(
                "unknown mode '{other}' (expected standard or text_focus)"
            ))),
        }
    }
}

/// Configuration for a conversion run.
///
/// # Example
/// ```rust
/// use edgequake_pdf2pptx::{ConversionConfig, ReconstructionMode};
///
/// let config = ConversionConfig::builder()
///     .mode(ReconstructionMode::TextFocus)
///     .font_scale(1.0)
///     .output_dir("out")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Which shapes the composer emits. Default: [`ReconstructionMode::Standard`].
    pub mode: ReconstructionMode,

    /// Multiplier applied to every detected font size. Default: 1.1.
    ///
    /// Detected sizes tend to come out slightly small next to the rendered
    /// original; 1.0 disables the correction.
    pub font_scale: f64,

    /// API key for the built-in Gemini client.
    ///
    /// If `None`, resolved from `GOOGLE_API_KEY`, `GEMINI_API_KEY` and finally
    /// the persisted settings file (see [`crate::settings`]).
    pub api_key: Option<String>,

    /// Directory for output decks. If `None`, each deck is written next to
    /// its source file.
    pub output_dir: Option<PathBuf>,

    /// Model identifier. If `None`, uses [`DEFAULT_GEMINI_MODEL`] (or the
    /// provider default when `provider_name` is set).
    pub model: Option<String>,

    /// `edgequake-llm` provider name (e.g. "openai", "anthropic"). When set,
    /// layout analysis goes through that provider instead of the Gemini client.
    pub provider_name: Option<String>,

    /// Pre-constructed `edgequake-llm` provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed layout analyzer. Takes precedence over everything else.
    pub analyzer: Option<Arc<dyn LayoutAnalyzer>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens per layout response. Default: 8192.
    ///
    /// Dense pages produce long JSON; a truncated response parses as an
    /// empty layout, so this errs on the generous side.
    pub max_tokens: usize,

    /// Retries on transient inference failures. Default: 3.
    ///
    /// Credential errors are never retried.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call inference timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom layout prompt. If None, uses [`crate::prompts::LAYOUT_PROMPT`].
    pub system_prompt: Option<String>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            mode: ReconstructionMode::default(),
            font_scale: DEFAULT_FONT_SCALE,
            api_key: None,
            output_dir: None,
            model: None,
            provider_name: None,
            provider: None,
            analyzer: None,
            temperature: 0.1,
            max_tokens: 8192,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            password: None,
            system_prompt: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("mode", &self.mode)
            .field("font_scale", &self.font_scale)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("output_dir", &self.output_dir)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("analyzer", &self.analyzer.as_ref().map(|a| a.name().to_string()))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn mode(mut self, mode: ReconstructionMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn font_scale(mut self, scale: f64) -> Self {
        self.config.font_scale = scale;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn analyzer(mut self, analyzer: Arc<dyn LayoutAnalyzer>) -> Self {
        self.config.analyzer = Some(analyzer);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2PptxError> {
        let c = &self.config;
        if !c.font_scale.is_finite() || c.font_scale <= 0.0 {
            return Err(Pdf2PptxError::InvalidConfig(format!(
                "font scale must be a positive number, got {}",
                c.font_scale
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(Pdf2PptxError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if let Some(key) = &c.api_key {
            if key.trim().is_empty() {
                return Err(Pdf2PptxError::InvalidConfig("API key is empty".into()));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.mode, ReconstructionMode::Standard);
        assert!((c.font_scale - 1.1).abs() < f64::EPSILON);
        assert!(c.output_dir.is_none());
        assert_eq!(c.max_retries, 3);
    }

    #[test]
    fn builder_rejects_bad_font_scale() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(ConversionConfig::builder().font_scale(bad).build().is_err());
        }
        assert!(ConversionConfig::builder().font_scale(1.0).build().is_ok());
    }

    #[test]
    fn builder_rejects_blank_api_key() {
        assert!(ConversionConfig::builder().api_key("   ").build().is_err());
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("standard".parse::<ReconstructionMode>().unwrap(), ReconstructionMode::Standard);
        assert_eq!("text_focus".parse::<ReconstructionMode>().unwrap(), ReconstructionMode::TextFocus);
        assert_eq!("Text-Focus".parse::<ReconstructionMode>().unwrap(), ReconstructionMode::TextFocus);
        assert!("fancy".parse::<ReconstructionMode>().is_err());
        assert_eq!(ReconstructionMode::TextFocus.to_string(), "text_focus");
    }

    #[test]
    fn mode_serde_names() {
        let json = serde_json::to_string(&ReconstructionMode::TextFocus).unwrap();
        assert_eq!(json, "\"text_focus\"");
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ConversionConfig::builder().api_key("secret-key").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-key"));
    }
}
