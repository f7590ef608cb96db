//! Vision-model interaction: the [`VisionModel`] seam, its adapter over
//! `edgequake_llm`, and the retry loop shared by both pipelines.
//!
//! ## Retry Strategy
//!
//! [`complete_with_retry`] is an explicit bounded loop: attempt 0 runs at
//! once, and retry *n* waits `base * 2^(n-1)` first (1 s → 2 s → 4 s with the
//! default base). Every attempt's outcome is reported to an observer so the
//! block pipeline can drive its concurrency controller from it.

use crate::config::{ExtractionConfig, RetryPolicy};
use crate::error::{CallError, DocExtractError};
use crate::pipeline::encode;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// One vision request: instructions, a prompt and the page image.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// `data:` URL of the page image.
    pub image_data_url: Arc<str>,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// A model that answers a text prompt about an image.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn complete(&self, request: &VisionRequest) -> Result<String, CallError>;
}

/// [`VisionModel`] backed by an `edgequake_llm` provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl VisionModel for ProviderModel {
    async fn complete(&self, request: &VisionRequest) -> Result<String, CallError> {
        let image = encode::image_data_from_url(&request.image_data_url)
            .ok_or_else(|| CallError::new(None, "page image is not a base64 data URL"))?;

        let messages = vec![
            ChatMessage::system(request.system_prompt.as_str()),
            ChatMessage::user_with_images(request.user_prompt.as_str(), vec![image]),
        ];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| CallError::from_message(e.to_string()))?;
        debug!(
            "{} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// What happened on one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RateLimited,
    Failed,
}

/// Text returned by the model and the number of attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub attempts: u32,
}

/// Every attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetriesExhausted {
    pub last_error: CallError,
    pub attempts: u32,
}

/// Call the model with timeout, retry and exponential back-off.
///
/// `observe` runs exactly once per attempt, after the attempt settles and
/// before any back-off sleep.
pub async fn complete_with_retry<F>(
    model: &dyn VisionModel,
    request: &VisionRequest,
    policy: &RetryPolicy,
    label: &str,
    mut observe: F,
) -> Result<Completion, RetriesExhausted>
where
    F: FnMut(AttemptOutcome),
{
    let mut last_error = CallError::new(None, "no attempt made");

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let backoff = policy.backoff(attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                label,
                attempt,
                policy.max_retries,
                backoff.as_millis()
            );
            sleep(backoff).await;
        }

        let result = match timeout(policy.call_timeout, model.complete(request)).await {
            Ok(r) => r,
            Err(_) => Err(CallError::timeout(policy.call_timeout.as_secs())),
        };

        match result {
            Ok(text) => {
                observe(AttemptOutcome::Success);
                return Ok(Completion {
                    text,
                    attempts: attempt + 1,
                });
            }
            Err(e) => {
                let outcome = if e.is_rate_limit() {
                    AttemptOutcome::RateLimited
                } else {
                    AttemptOutcome::Failed
                };
                warn!("{}: attempt {} failed ({:?}): {}", label, attempt + 1, outcome, e);
                observe(outcome);
                last_error = e;
            }
        }
    }

    Err(RetriesExhausted {
        last_error,
        attempts: policy.max_retries + 1,
    })
}

/// Resolve the vision model, from most-specific to least-specific:
///
/// 1. injected [`VisionModel`] (`config.vision_model`)
/// 2. pre-built provider (`config.provider`)
/// 3. provider name + model (`config.provider_name`)
/// 4. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`
/// 5. `OPENAI_API_KEY`
/// 6. `ProviderFactory::from_env`
pub fn resolve_vision_model(config: &ExtractionConfig) -> Result<Arc<dyn VisionModel>, DocExtractError> {
    if let Some(ref model) = config.vision_model {
        return Ok(Arc::clone(model));
    }
    Ok(Arc::new(ProviderModel::new(resolve_provider(config)?)))
}

fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, DocExtractError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocExtractError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, GEMINI_API_KEY or ANTHROPIC_API_KEY.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

const DEFAULT_MODEL: &str = "gpt-4.1-mini";

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, DocExtractError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocExtractError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
