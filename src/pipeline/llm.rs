//! Extraction invoker: one model call per document.
//!
//! [`process_document`] acquires a rate-limit slot, composes the request
//! (instructions + schema contract + page images in page order), calls the
//! endpoint once and parses the reply into a JSON object. There is no retry
//! at this layer; a failure is reported to the caller as a [`DocumentError`].
//!
//! The endpoint sits behind the [`ExtractionEndpoint`] trait so the batch
//! orchestrator can be driven by a scripted endpoint in tests.
//! [`LlmEndpoint`] is the production implementation over an
//! `edgequake_llm` provider.

use crate::error::DocumentError;
use crate::model::{JsonObject, PageImage};
use crate::pipeline::postprocess::parse_json_object;
use crate::pipeline::rate_limit::RateLimiter;
use crate::prompts::compose_system_message;
use crate::schema::JsonSchema;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, LlmError};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// User-turn text accompanying the page images.
pub const USER_INSTRUCTION: &str = "Return the extracted data as a single JSON object.";

/// A fully composed extraction request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    /// Prompt instructions followed by the schema restatement.
    pub system_message: String,
    /// Page images in page order.
    pub images: Vec<PageImage>,
    /// Ask the endpoint for strict JSON-object output.
    pub json_object: bool,
}

/// The model behind extraction. Returns the raw reply text.
#[async_trait]
pub trait ExtractionEndpoint: Send + Sync {
    async fn complete(&self, request: &ExtractionRequest) -> Result<String, DocumentError>;
}

/// Inputs for one document's extraction.
#[derive(Debug, Clone)]
pub struct ExtractionJob<'a> {
    pub images: &'a [PageImage],
    pub system_prompt: &'a str,
    pub schema: &'a JsonSchema,
    /// Applied to the shared limiter before waiting.
    pub requests_per_minute: u32,
}

/// Extract one document.
///
/// Steps, in order: rate-limit slot, request composition, single endpoint
/// call, JSON parse. Schema conformance is not checked here.
pub async fn process_document(
    endpoint: &dyn ExtractionEndpoint,
    limiter: &RateLimiter,
    job: ExtractionJob<'_>,
) -> Result<JsonObject, DocumentError> {
    limiter.set_requests_per_minute(job.requests_per_minute);
    limiter.wait_for_slot().await;

    let request = ExtractionRequest {
        system_message: compose_system_message(job.system_prompt, job.schema),
        images: job.images.to_vec(),
        json_object: true,
    };
    debug!(
        "Extraction request: {} image(s), {} chars of instructions",
        request.images.len(),
        request.system_message.len()
    );

    let reply = endpoint.complete(&request).await?;
    parse_json_object(&reply)
}

// ── edgequake-llm endpoint ───────────────────────────────────────────────────

/// [`ExtractionEndpoint`] over an `edgequake_llm` provider.
pub struct LlmEndpoint {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    api_timeout: Duration,
}

impl LlmEndpoint {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize, api_timeout_secs: u64) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
            api_timeout: Duration::from_secs(api_timeout_secs),
        }
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    fn build_options(&self, request: &ExtractionRequest) -> CompletionOptions {
        let base = if request.json_object {
            CompletionOptions::json_mode()
        } else {
            CompletionOptions::default()
        };
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..base
        }
    }
}

/// Message layout: one system message, then one user message carrying every
/// page image as a high-detail attachment.
pub fn build_messages(request: &ExtractionRequest) -> Vec<ChatMessage> {
    let images: Vec<ImageData> = request
        .images
        .iter()
        .map(|img| ImageData::new(img.data.clone(), img.mime_type.clone()).with_detail("high"))
        .collect();
    let user_text = if request.json_object { USER_INSTRUCTION } else { "" };
    vec![
        ChatMessage::system(request.system_message.as_str()),
        ChatMessage::user_with_images(user_text, images),
    ]
}

#[async_trait]
impl ExtractionEndpoint for LlmEndpoint {
    async fn complete(&self, request: &ExtractionRequest) -> Result<String, DocumentError> {
        let start = Instant::now();
        let messages = build_messages(request);
        let options = self.build_options(request);

        let response = match timeout(self.api_timeout, self.provider.chat(&messages, Some(&options))).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let err = classify_llm_error(&e);
                warn!("Extraction call failed: {} ({})", err, e);
                return Err(err);
            }
            Err(_) => {
                warn!("Extraction call timed out after {:?}", self.api_timeout);
                return Err(DocumentError::ProcessingFailed {
                    detail: format!("timed out after {}s", self.api_timeout.as_secs()),
                });
            }
        };

        debug!(
            "{} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

/// Map a provider error onto the per-document taxonomy.
///
/// Typed variants map directly. Only generic API and provider errors carry
/// the HTTP status as text, so those fall back to [`classify_endpoint_error`].
pub fn classify_llm_error(err: &LlmError) -> DocumentError {
    match err {
        LlmError::AuthError(msg) => DocumentError::Unauthorized { detail: msg.clone() },
        LlmError::RateLimited(msg) => DocumentError::RateLimited { detail: msg.clone() },
        LlmError::InvalidRequest(msg) => DocumentError::BadRequest { detail: msg.clone() },
        LlmError::TokenLimitExceeded { .. } => DocumentError::BadRequest {
            detail: err.to_string(),
        },
        LlmError::ApiError(msg) | LlmError::ProviderError(msg) => classify_endpoint_error(msg),
        other => DocumentError::ProcessingFailed {
            detail: other.to_string(),
        },
    }
}

/// Recover the error class from a provider message that carries an HTTP
/// status or a well-known phrase.
pub fn classify_endpoint_error(message: &str) -> DocumentError {
    let lower = message.to_lowercase();
    let detail = message.to_string();
    let any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if any(&["401", "403", "unauthorized", "invalid api key", "incorrect api key", "authentication"]) {
        DocumentError::Unauthorized { detail }
    } else if any(&["429", "rate limit", "rate_limit", "too many requests"]) {
        DocumentError::RateLimited { detail }
    } else if any(&["400", "bad request", "invalid request", "invalid_request"]) {
        DocumentError::BadRequest { detail }
    } else {
        DocumentError::ProcessingFailed { detail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Scripted {
        reply: Result<String, DocumentError>,
        seen: Mutex<Vec<ExtractionRequest>>,
    }

    #[async_trait]
    impl ExtractionEndpoint for Scripted {
        async fn complete(&self, request: &ExtractionRequest) -> Result<String, DocumentError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply.clone()
        }
    }

    fn pages() -> Vec<PageImage> {
        (1..=2)
            .map(|i| PageImage {
                mime_type: "image/png".into(),
                data: format!("page{i}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn composes_request_in_page_order() {
        let endpoint = Scripted {
            reply: Ok(r#"{"field1": "x"}"#.into()),
            seen: Mutex::new(Vec::new()),
        };
        let limiter = RateLimiter::new(10);
        let images = pages();
        let schema = crate::schema::default_schema();

        let out = process_document(
            &endpoint,
            &limiter,
            ExtractionJob {
                images: &images,
                system_prompt: "Read it.",
                schema: &schema,
                requests_per_minute: 7,
            },
        )
        .await
        .unwrap();

        assert_eq!(out["field1"], "x");
        assert_eq!(limiter.requests_per_minute(), 7);
        assert_eq!(limiter.queue_length(), 1);

        let seen = endpoint.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].system_message.starts_with("Read it.\n\nYou must respond"));
        assert_eq!(seen[0].images[0].data, "page1");
        assert_eq!(seen[0].images[1].data, "page2");
        assert!(seen[0].json_object);
    }

    #[tokio::test]
    async fn endpoint_failure_is_not_retried() {
        let endpoint = Scripted {
            reply: Err(DocumentError::RateLimited { detail: "429".into() }),
            seen: Mutex::new(Vec::new()),
        };
        let limiter = RateLimiter::new(10);
        let schema = crate::schema::default_schema();
        let err = process_document(
            &endpoint,
            &limiter,
            ExtractionJob {
                images: &[],
                system_prompt: "",
                schema: &schema,
                requests_per_minute: 10,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Rate limit exceeded");
        assert_eq!(endpoint.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unparsable_reply_fails_document() {
        let endpoint = Scripted {
            reply: Ok("no json here".into()),
            seen: Mutex::new(Vec::new()),
        };
        let limiter = RateLimiter::new(10);
        let schema = crate::schema::default_schema();
        let err = process_document(
            &endpoint,
            &limiter,
            ExtractionJob {
                images: &[],
                system_prompt: "",
                schema: &schema,
                requests_per_minute: 10,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DocumentError::InvalidResponse { .. }));
    }

    #[test]
    fn classifies_provider_errors() {
        assert!(matches!(
            classify_endpoint_error("API error: 401 Unauthorized"),
            DocumentError::Unauthorized { .. }
        ));
        assert!(matches!(
            classify_endpoint_error("Rate limit exceeded for model"),
            DocumentError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_endpoint_error("status 400: image too large"),
            DocumentError::BadRequest { .. }
        ));
        let err = classify_endpoint_error("connection reset by peer");
        assert_eq!(err.to_string(), "Failed to process document: connection reset by peer");
    }

    #[test]
    fn json_object_request_sets_response_format() {
        let endpoint = LlmEndpoint::new(Arc::new(edgequake_llm::MockProvider::new()), 0.1, 4096, 60);
        let mut request = ExtractionRequest {
            system_message: "sys".into(),
            images: pages(),
            json_object: true,
        };
        let options = endpoint.build_options(&request);
        assert_eq!(options.response_format.as_deref(), Some("json_object"));
        assert_eq!(options.temperature, Some(0.1));
        assert_eq!(options.max_tokens, Some(4096));

        request.json_object = false;
        assert!(endpoint.build_options(&request).response_format.is_none());
    }

    #[test]
    fn typed_errors_map_by_variant() {
        assert!(matches!(
            classify_llm_error(&LlmError::AuthError("bad key".into())),
            DocumentError::Unauthorized { .. }
        ));
        assert!(matches!(
            classify_llm_error(&LlmError::RateLimited("slow down".into())),
            DocumentError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_llm_error(&LlmError::InvalidRequest("image too large".into())),
            DocumentError::BadRequest { .. }
        ));
        // Status-like digits in a network message do not change its class.
        assert!(matches!(
            classify_llm_error(&LlmError::NetworkError("read 401 bytes then reset".into())),
            DocumentError::ProcessingFailed { .. }
        ));
        assert!(matches!(
            classify_llm_error(&LlmError::Timeout),
            DocumentError::ProcessingFailed { .. }
        ));
        assert!(matches!(
            classify_llm_error(&LlmError::ApiError("401 Unauthorized".into())),
            DocumentError::Unauthorized { .. }
        ));
    }

    #[test]
    fn messages_carry_system_then_images() {
        let request = ExtractionRequest {
            system_message: "sys".into(),
            images: pages(),
            json_object: true,
        };
        let messages = build_messages(&request);
        assert_eq!(messages.len(), 2);
    }
}
