//! Configuration types for document extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. One `Clone` struct holds every knob so a
//! job's settings can be logged, shared across pipelines and diffed between
//! runs.

use crate::error::DocExtractError;
use crate::pipeline::layout::LayoutBackend;
use crate::pipeline::llm::VisionModel;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Lower bound of the adaptive concurrency window.
pub const MIN_CONCURRENCY: usize = 2;
/// Upper bound of the adaptive concurrency window.
pub const MAX_CONCURRENCY: usize = 10;
/// Starting concurrency for a new job.
pub const DEFAULT_CONCURRENCY: usize = 5;
/// Retries after the first attempt of a block extraction.
pub const MAX_RETRIES: u32 = 3;
/// Base delay of the exponential back-off: 1 s → 2 s → 4 s.
pub const BASE_BACKOFF_MS: u64 = 1000;

/// Configuration for one extraction job.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docextract::{ExtractionConfig, LayoutMethod};
///
/// let config = ExtractionConfig::builder()
///     .layout_method(LayoutMethod::HighAccuracy)
///     .accurate_endpoint("http://localhost:8080/layout")
///     .initial_concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Render scale applied to PDF pages. Range: 0.5–4.0. Default: 2.0.
    ///
    /// 2× keeps small print legible for both the OCR back-end and the vision
    /// model while keeping page images well under upload limits.
    pub render_scale: f32,

    /// Cap on the longest rendered edge in pixels. Default: 4000.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Which OCR back-end produces the layout blocks. Default: fast-generic.
    pub layout_method: LayoutMethod,

    /// Endpoint of the fast generic detector (one page image per request).
    pub fast_endpoint: Option<String>,

    /// Endpoint of the high-accuracy layout model (whole document per request).
    pub accurate_endpoint: Option<String>,

    /// Bearer token sent to the OCR back-ends.
    pub layout_api_key: Option<String>,

    /// Per-request timeout for OCR back-end calls in seconds. Default: 240.
    pub ocr_timeout_secs: u64,

    /// Adaptive concurrency window for block re-extraction.
    pub concurrency: ConcurrencyLimits,

    /// Retries after the first failed attempt of a model call. Default: 3.
    pub max_retries: u32,

    /// Base of the exponential back-off in milliseconds. Default: 1000.
    pub retry_backoff_ms: u64,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Transcription wants the model to report what it sees, not to improvise.
    pub temperature: f32,

    /// Maximum tokens generated per call. Default: 4096.
    pub max_tokens: usize,

    /// Per-model-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Pages transcribed at once by the full-text pipeline. Default: 4.
    pub full_text_concurrency: usize,

    /// LLM model identifier, e.g. "gpt-4.1-mini". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "gemini").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed vision model. Takes precedence over every provider setting.
    pub vision_model: Option<Arc<dyn VisionModel>>,

    /// Pre-constructed layout back-end. Takes precedence over the endpoints.
    pub layout_backend: Option<Arc<dyn LayoutBackend>>,

    /// Receives per-block progress events.
    pub progress_callback: Option<ProgressCallback>,

    /// Timeout for downloading a document from a URL, in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            render_scale: 2.0,
            max_rendered_pixels: 4000,
            password: None,
            layout_method: LayoutMethod::default(),
            fast_endpoint: None,
            accurate_endpoint: None,
            layout_api_key: None,
            ocr_timeout_secs: 240,
            concurrency: ConcurrencyLimits::default(),
            max_retries: MAX_RETRIES,
            retry_backoff_ms: BASE_BACKOFF_MS,
            temperature: 0.1,
            max_tokens: 4096,
            api_timeout_secs: 120,
            full_text_concurrency: 4,
            model: None,
            provider_name: None,
            provider: None,
            vision_model: None,
            layout_backend: None,
            progress_callback: None,
            download_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("render_scale", &self.render_scale)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("layout_method", &self.layout_method)
            .field("fast_endpoint", &self.fast_endpoint)
            .field("accurate_endpoint", &self.accurate_endpoint)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("full_text_concurrency", &self.full_text_concurrency)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("vision_model", &self.vision_model.as_ref().map(|_| "<dyn VisionModel>"))
            .field("layout_backend", &self.layout_backend.as_ref().map(|_| "<dyn LayoutBackend>"))
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Retry policy shared by the block and full-text pipelines.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_backoff_ms: self.retry_backoff_ms,
            call_timeout: Duration::from_secs(self.api_timeout_secs),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.5, 4.0);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn layout_method(mut self, method: LayoutMethod) -> Self {
        self.config.layout_method = method;
        self
    }

    pub fn fast_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.fast_endpoint = Some(url.into());
        self
    }

    pub fn accurate_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.accurate_endpoint = Some(url.into());
        self
    }

    pub fn layout_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.layout_api_key = Some(key.into());
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, limits: ConcurrencyLimits) -> Self {
        self.config.concurrency = limits;
        self
    }

    /// Starting point of the adaptive window; clamped into `[min, max]` at build time.
    pub fn initial_concurrency(mut self, n: usize) -> Self {
        self.config.concurrency.initial = n;
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

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn full_text_concurrency(mut self, n: usize) -> Self {
        self.config.full_text_concurrency = n.max(1);
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

    pub fn vision_model(mut self, model: Arc<dyn VisionModel>) -> Self {
        self.config.vision_model = Some(model);
        self
    }

    pub fn layout_backend(mut self, backend: Arc<dyn LayoutBackend>) -> Self {
        self.config.layout_backend = Some(backend);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ExtractionConfig, DocExtractError> {
        let limits = &mut self.config.concurrency;
        if limits.min == 0 {
            return Err(DocExtractError::InvalidConfig(
                "Minimum concurrency must be ≥ 1".into(),
            ));
        }
        if limits.min > limits.max {
            return Err(DocExtractError::InvalidConfig(format!(
                "Concurrency bounds are inverted: min {} > max {}",
                limits.min, limits.max
            )));
        }
        if !(limits.backoff_factor > 0.0 && limits.backoff_factor < 1.0) {
            return Err(DocExtractError::InvalidConfig(format!(
                "Back-off factor must be in (0, 1), got {}",
                limits.backoff_factor
            )));
        }
        if limits.ramp_up_after == 0 {
            return Err(DocExtractError::InvalidConfig(
                "Ramp-up threshold must be ≥ 1".into(),
            ));
        }
        limits.initial = limits.initial.clamp(limits.min, limits.max);
        if self.config.ocr_timeout_secs == 0 || self.config.api_timeout_secs == 0 {
            return Err(DocExtractError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Bounds and tuning of the adaptive concurrency window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConcurrencyLimits {
    /// Window size when a job starts.
    pub initial: usize,
    /// The window never shrinks below this.
    pub min: usize,
    /// The window never grows above this.
    pub max: usize,
    /// Consecutive successes needed to widen the window by one.
    pub ramp_up_after: u32,
    /// Multiplier applied to the window on a rate-limit signal.
    pub backoff_factor: f64,
}

impl Default for ConcurrencyLimits {
    fn default() -> Self {
        Self {
            initial: DEFAULT_CONCURRENCY,
            min: MIN_CONCURRENCY,
            max: MAX_CONCURRENCY,
            ramp_up_after: 5,
            backoff_factor: 0.6,
        }
    }
}

/// Retry behaviour for a single model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles after each further failure.
    pub base_backoff_ms: u64,
    /// Upper bound on one model call.
    pub call_timeout: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        Duration::from_millis(self.base_backoff_ms.saturating_mul(1u64 << exp))
    }
}

/// OCR back-end used to detect layout blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutMethod {
    /// Fast generic detector, called once per page image.
    #[default]
    FastGeneric,
    /// High-accuracy layout model, called once for the whole document.
    HighAccuracy,
}

impl LayoutMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutMethod::FastGeneric => "fast-generic",
            LayoutMethod::HighAccuracy => "high-accuracy",
        }
    }
}

impl fmt::Display for LayoutMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ExtractionConfig::default();
        assert_eq!(c.render_scale, 2.0);
        assert_eq!(c.ocr_timeout_secs, 240);
        assert_eq!(c.concurrency.initial, 5);
        assert_eq!(c.concurrency.min, 2);
        assert_eq!(c.concurrency.max, 10);
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.retry_backoff_ms, 1000);
        assert_eq!(c.temperature, 0.1);
    }

    #[test]
    fn initial_concurrency_is_clamped_into_bounds() {
        let c = ExtractionConfig::builder()
            .initial_concurrency(50)
            .build()
            .unwrap();
        assert_eq!(c.concurrency.initial, MAX_CONCURRENCY);

        let c = ExtractionConfig::builder()
            .initial_concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.concurrency.initial, MIN_CONCURRENCY);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let limits = ConcurrencyLimits {
            min: 8,
            max: 4,
            ..Default::default()
        };
        let err = ExtractionConfig::builder()
            .concurrency(limits)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("inverted"));
    }

    #[test]
    fn backoff_doubles_per_retry() {
        let policy = ExtractionConfig::default().retry_policy();
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff(3), Duration::from_millis(4000));
    }

    #[test]
    fn layout_method_serialises_kebab_case() {
        let json = serde_json::to_string(&LayoutMethod::HighAccuracy).unwrap();
        assert_eq!(json, "\"high-accuracy\"");
        assert_eq!(LayoutMethod::FastGeneric.to_string(), "fast-generic");
    }
}
