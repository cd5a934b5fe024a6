//! Layout analysis: send a page image to a vision model and get back a
//! [`PageLayout`].
//!
//! Two backends sit behind the [`LayoutAnalyzer`] trait:
//!
//! - [`GeminiAnalyzer`] talks to the Gemini `generateContent` endpoint
//!   directly and asks for JSON constrained by [`response_schema`].
//! - [`ProviderAnalyzer`] goes through any `edgequake-llm` provider
//!   (OpenAI, Anthropic, Ollama, ...). Those cannot enforce the schema, so it
//!   relies on the prompt and on the lenient parser.
//!
//! ## Retry Strategy
//!
//! Rate limits and 5xx responses are transient; they are retried with
//! exponential backoff (`retry_backoff_ms * 2^attempt`). Each attempt is
//! bounded by `api_timeout_secs`. A rejected API key is never retried: it
//! surfaces at once as [`Pdf2PptxError::InvalidCredential`], which stops the
//! whole batch.

use super::encode::to_base64;
use crate::config::{ConversionConfig, DEFAULT_GEMINI_MODEL};
use crate::error::Pdf2PptxError;
use crate::layout::PageLayout;
use crate::prompts::{response_schema, LAYOUT_PROMPT};
use crate::settings::{resolve_api_key, Settings};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Model used with `--provider` when no `--model` is given.
pub const DEFAULT_PROVIDER_MODEL: &str = "gpt-4.1-nano";

/// Error-message fragments that identify a rejected credential.
const CREDENTIAL_MARKERS: &[&str] = &[
    "api key not valid",
    "api_key_invalid",
    "invalid api key",
    "incorrect api key",
    "invalid x-api-key",
    "unauthorized",
    "authentication",
    "permission_denied",
];

/// Turns a PNG page image into a layout description.
pub trait LayoutAnalyzer: Send + Sync {
    /// Short label for logs and error messages.
    fn name(&self) -> &str;

    /// Analyse one page. Malformed model output is not an error: it yields
    /// an empty or partial layout.
    fn analyze<'a>(&'a self, page_png: &'a [u8]) -> BoxFuture<'a, Result<PageLayout, Pdf2PptxError>>;
}

/// Outcome of one failed attempt, as seen by the retry loop.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptError {
    /// The credential was rejected. Never retried.
    Credential(String),
    /// Worth another try (rate limit, server error, connection reset).
    Retryable(String),
    /// The attempt exceeded the per-call timeout.
    Timeout,
    /// Retrying will not help (bad request, unknown model).
    Permanent(String),
}

/// Retry and timeout knobs shared by both backends.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
            attempt_timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }
}

/// Run `call` until it succeeds, fails permanently, or retries run out.
pub async fn with_retries<F, Fut>(
    provider: &str,
    policy: RetryPolicy,
    mut call: F,
) -> Result<String, Pdf2PptxError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, AttemptError>>,
{
    let mut last_err = AttemptError::Retryable("no attempt made".into());

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let backoff = policy
                .backoff
                .saturating_mul(2u32.saturating_pow(attempt - 1));
            warn!(
                "{}: retry {}/{} after {}ms",
                provider,
                attempt,
                policy.max_retries,
                backoff.as_millis()
            );
            sleep(backoff).await;
        }

        let outcome = match timeout(policy.attempt_timeout, call()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AttemptError::Timeout),
        };

        match outcome {
            Ok(text) => return Ok(text),
            Err(AttemptError::Credential(detail)) => {
                return Err(Pdf2PptxError::InvalidCredential {
                    provider: provider.to_string(),
                    detail,
                })
            }
            Err(AttemptError::Permanent(message)) => {
                return Err(Pdf2PptxError::LlmApiError {
                    retries: attempt,
                    message,
                })
            }
            Err(e) => {
                warn!("{}: attempt {} failed: {:?}", provider, attempt + 1, e);
                last_err = e;
            }
        }
    }

    Err(match last_err {
        AttemptError::Timeout => Pdf2PptxError::ApiTimeout {
            secs: policy.attempt_timeout.as_secs(),
        },
        AttemptError::Retryable(message)
        | AttemptError::Permanent(message)
        | AttemptError::Credential(message) => Pdf2PptxError::LlmApiError {
            retries: policy.max_retries,
            message,
        },
    })
}

/// True if an error message describes a rejected credential.
pub fn is_credential_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    CREDENTIAL_MARKERS.iter().any(|m| lower.contains(m))
}

/// Map a failed HTTP response to an [`AttemptError`].
pub fn classify_status(status: StatusCode, message: &str) -> AttemptError {
    let detail = format!("HTTP {}: {}", status.as_u16(), message);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AttemptError::Credential(detail),
        StatusCode::BAD_REQUEST if is_credential_message(message) => {
            AttemptError::Credential(detail)
        }
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            AttemptError::Retryable(detail)
        }
        s if s.is_server_error() => AttemptError::Retryable(detail),
        _ => AttemptError::Permanent(detail),
    }
}

// ── Gemini ───────────────────────────────────────────────────────────────────

/// Direct client for the Gemini `generateContent` endpoint.
pub struct GeminiAnalyzer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    prompt: String,
    temperature: f32,
    max_tokens: usize,
    policy: RetryPolicy,
    base_url: String,
}

impl GeminiAnalyzer {
    pub fn new(api_key: impl Into<String>, config: &ConversionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: config
                .model
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| LAYOUT_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            policy: RetryPolicy::from_config(config),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    /// Point the client at another endpoint root (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, page_png: &[u8]) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": self.prompt },
                    { "inline_data": { "mime_type": "image/png", "data": to_base64(page_png) } }
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema(),
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens
            }
        })
    }

    async fn call_once(&self, body: &Value) -> Result<String, AttemptError> {
        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let message = extract_gemini_error(&text).unwrap_or(text);
            return Err(classify_status(status, &message));
        }

        match extract_candidate_text(&text) {
            Some(content) => Ok(content),
            None => {
                warn!("Gemini returned no candidate text; treating page as empty");
                debug!("Raw Gemini response: {}", text);
                Ok(String::new())
            }
        }
    }
}

impl LayoutAnalyzer for GeminiAnalyzer {
    fn name(&self) -> &str {
        "gemini"
    }

    fn analyze<'a>(&'a self, page_png: &'a [u8]) -> BoxFuture<'a, Result<PageLayout, Pdf2PptxError>> {
        async move {
            let start = Instant::now();
            let body = self.request_body(page_png);
            let raw = with_retries(self.name(), self.policy, || self.call_once(&body)).await?;
            debug!("Gemini layout: {} bytes in {:?}", raw.len(), start.elapsed());
            Ok(PageLayout::parse(&raw))
        }
        .boxed()
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

/// Concatenated text parts of the first candidate.
pub fn extract_candidate_text(body: &str) -> Option<String> {
    let payload: GeminiResponse = serde_json::from_str(body).ok()?;
    let content = payload.candidates.into_iter().next()?.content?;
    let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
    (!text.is_empty()).then_some(text)
}

fn extract_gemini_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<GeminiError>,
    }

    #[derive(Deserialize)]
    struct GeminiError {
        message: Option<String>,
        status: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    match (error.message, error.status) {
        (Some(m), Some(s)) => Some(format!("{m} ({s})")),
        (Some(m), None) => Some(m),
        (None, Some(s)) => Some(s),
        (None, None) => None,
    }
}

// ── edgequake-llm providers ──────────────────────────────────────────────────

/// Layout analysis through an `edgequake-llm` vision provider.
pub struct ProviderAnalyzer {
    provider: Arc<dyn LLMProvider>,
    label: String,
    prompt: String,
    options: CompletionOptions,
    policy: RetryPolicy,
}

impl ProviderAnalyzer {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, config: &ConversionConfig) -> Self {
        Self {
            provider,
            label: label.into(),
            prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| LAYOUT_PROMPT.to_string()),
            options: build_options(config),
            policy: RetryPolicy::from_config(config),
        }
    }

    async fn call_once(&self, messages: &[ChatMessage]) -> Result<String, AttemptError> {
        match self.provider.chat(messages, Some(&self.options)).await {
            Ok(response) => {
                debug!(
                    "{}: {} input tokens, {} output tokens",
                    self.label, response.prompt_tokens, response.completion_tokens
                );
                Ok(response.content)
            }
            Err(e) => {
                let message = e.to_string();
                if is_credential_message(&message) {
                    Err(AttemptError::Credential(message))
                } else {
                    Err(AttemptError::Retryable(message))
                }
            }
        }
    }
}

impl LayoutAnalyzer for ProviderAnalyzer {
    fn name(&self) -> &str {
        &self.label
    }

    fn analyze<'a>(&'a self, page_png: &'a [u8]) -> BoxFuture<'a, Result<PageLayout, Pdf2PptxError>> {
        async move {
            let image = ImageData::new(to_base64(page_png), "image/png").with_detail("high");
            let messages = vec![
                ChatMessage::system(self.prompt.as_str()),
                ChatMessage::user_with_images("", vec![image]),
            ];
            let raw = with_retries(&self.label, self.policy, || self.call_once(&messages)).await?;
            Ok(PageLayout::parse(&raw))
        }
        .boxed()
    }
}

fn build_options(config: &ConversionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

// ── Resolution ───────────────────────────────────────────────────────────────

/// Pick the analyzer for a run.
///
/// Resolution order:
/// 1. `config.analyzer`
/// 2. `config.provider`, wrapped in a [`ProviderAnalyzer`]
/// 3. `config.provider_name` through `ProviderFactory`
/// 4. [`GeminiAnalyzer`] with the key from [`resolve_api_key`]
/// 5. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` from the environment
pub fn resolve_analyzer(config: &ConversionConfig) -> Result<Arc<dyn LayoutAnalyzer>, Pdf2PptxError> {
    if let Some(ref analyzer) = config.analyzer {
        return Ok(Arc::clone(analyzer));
    }

    if let Some(ref provider) = config.provider {
        return Ok(Arc::new(ProviderAnalyzer::new(
            Arc::clone(provider),
            "custom",
            config,
        )));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_PROVIDER_MODEL);
        return create_provider_analyzer(name, model, config);
    }

    let settings = Settings::load_default();
    if let Some(key) = resolve_api_key(config.api_key.as_deref(), &settings) {
        let analyzer = GeminiAnalyzer::new(key, config);
        debug!("Using Gemini model {}", analyzer.model());
        return Ok(Arc::new(analyzer));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider_analyzer(&prov, &model, config);
        }
    }

    Err(Pdf2PptxError::ProviderNotConfigured {
        provider: "gemini".to_string(),
        hint: "No API key found. Pass --api-key, set GOOGLE_API_KEY or GEMINI_API_KEY,\n\
               save one with --save-api-key, or choose another provider with --provider."
            .to_string(),
    })
}

fn create_provider_analyzer(
    name: &str,
    model: &str,
    config: &ConversionConfig,
) -> Result<Arc<dyn LayoutAnalyzer>, Pdf2PptxError> {
    let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        Pdf2PptxError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(Arc::new(ProviderAnalyzer::new(provider, name, config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff: Duration::from_millis(1),
            attempt_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, "x"),
            AttemptError::Credential(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "API key not valid. Please pass a valid API key."),
            AttemptError::Credential(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "Invalid JSON payload"),
            AttemptError::Permanent(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "quota"),
            AttemptError::Retryable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, "overloaded"),
            AttemptError::Retryable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, "model not found"),
            AttemptError::Permanent(_)
        ));
    }

    #[test]
    fn credential_markers_are_case_insensitive() {
        assert!(is_credential_message("Incorrect API key provided: sk-..."));
        assert!(is_credential_message("HTTP 401 Unauthorized"));
        assert!(!is_credential_message("rate limit exceeded"));
    }

    #[test]
    fn candidate_text_is_joined() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"{\"text_"},{"text":"blocks\":[]}"}]}}]}"#;
        assert_eq!(extract_candidate_text(body).as_deref(), Some(r#"{"text_blocks":[]}"#));
        assert_eq!(extract_candidate_text(r#"{"candidates":[]}"#), None);
        assert_eq!(extract_candidate_text("not json"), None);
    }

    #[test]
    fn error_body_is_summarised() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(
            extract_gemini_error(body).as_deref(),
            Some("API key not valid. (INVALID_ARGUMENT)")
        );
    }

    #[test]
    fn gemini_body_carries_schema_and_image() {
        let config = ConversionConfig::default();
        let analyzer = GeminiAnalyzer::new("k", &config);
        let body = analyzer.request_body(b"png");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["contents"][0]["parts"][1]["inline_data"]["data"], to_base64(b"png"));
        assert_eq!(analyzer.model(), DEFAULT_GEMINI_MODEL);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let out = with_retries("test", fast_policy(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AttemptError::Retryable("503".into()))
                } else {
                    Ok("{}".to_string())
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(out, "{}");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn credential_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let err = with_retries("test", fast_policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AttemptError::Credential("bad key".into())) }
        })
        .await
        .unwrap_err();
        assert!(err.is_credential_error());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_report_last_error() {
        let calls = AtomicU32::new(0);
        let err = with_retries("test", fast_policy(2), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AttemptError::Retryable("overloaded".into())) }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(err, Pdf2PptxError::LlmApiError { retries: 2, .. }));
    }

    #[tokio::test]
    async fn slow_attempt_times_out() {
        let policy = RetryPolicy {
            max_retries: 0,
            backoff: Duration::from_millis(1),
            attempt_timeout: Duration::from_millis(20),
        };
        let err = with_retries("test", policy, || async {
            sleep(Duration::from_secs(5)).await;
            Ok(String::new())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Pdf2PptxError::ApiTimeout { .. }));
    }

    struct Fixed;

    impl LayoutAnalyzer for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn analyze<'a>(&'a self, _png: &'a [u8]) -> BoxFuture<'a, Result<PageLayout, Pdf2PptxError>> {
            async { Ok(PageLayout::empty()) }.boxed()
        }
    }

    #[test]
    fn explicit_analyzer_wins() {
        let config = ConversionConfig::builder()
            .analyzer(Arc::new(Fixed))
            .api_key("ignored")
            .build()
            .unwrap();
        assert_eq!(resolve_analyzer(&config).unwrap().name(), "fixed");
    }

    #[test]
    fn explicit_key_selects_gemini() {
        let config = ConversionConfig::builder().api_key("k").build().unwrap();
        assert_eq!(resolve_analyzer(&config).unwrap().name(), "gemini");
    }
}
