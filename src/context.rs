//! The extraction context: endpoint client plus the one shared rate limiter.
//!
//! Built once by the application's composition root with
//! [`ExtractionContext::init`] and passed to whatever needs to extract. There
//! is no module-level client or limiter; two contexts never share state.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::pipeline::llm::{ExtractionEndpoint, LlmEndpoint};
use crate::pipeline::rate_limit::RateLimiter;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::info;

/// Handle to an initialised extraction session.
#[derive(Clone)]
pub struct ExtractionContext {
    endpoint: Arc<dyn ExtractionEndpoint>,
    limiter: Arc<RateLimiter>,
    config: ExtractionConfig,
}

impl std::fmt::Debug for ExtractionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionContext")
            .field("requests_per_minute", &self.limiter.requests_per_minute())
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionContext {
    /// Resolve the provider from `config` and create the rate limiter.
    ///
    /// Fails with [`ExtractError::ProviderNotConfigured`] when no credential
    /// can be found; nothing is started in that case.
    pub fn init(config: ExtractionConfig) -> Result<Self, ExtractError> {
        let provider = resolve_provider(&config)?;
        info!(
            "Extraction provider ready: {} / {}",
            config.provider_name.as_deref().unwrap_or("auto"),
            config.model
        );
        let endpoint = LlmEndpoint::new(
            provider,
            config.temperature,
            config.max_tokens,
            config.api_timeout_secs,
        );
        Ok(Self::with_endpoint(config, Arc::new(endpoint)))
    }

    /// Build a context around an already constructed endpoint.
    pub fn with_endpoint(config: ExtractionConfig, endpoint: Arc<dyn ExtractionEndpoint>) -> Self {
        Self {
            endpoint,
            limiter: Arc::new(RateLimiter::new(config.requests_per_minute)),
            config,
        }
    }

    pub fn endpoint(&self) -> &dyn ExtractionEndpoint {
        self.endpoint.as_ref()
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Change the admission limit without losing window history.
    pub fn set_requests_per_minute(&mut self, rpm: u32) {
        self.config.requests_per_minute = rpm.max(1);
        self.limiter.set_requests_per_minute(rpm);
    }

    /// Forget the rate limiter's history.
    pub fn reset(&self) {
        self.limiter.reset();
    }
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ExtractError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model`.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`,
///    when both are set.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Auto-detection** via `ProviderFactory::from_env`.
fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, &config.model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", &config.model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExtractError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocumentError;
    use crate::pipeline::llm::ExtractionRequest;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl ExtractionEndpoint for Echo {
        async fn complete(&self, _request: &ExtractionRequest) -> Result<String, DocumentError> {
            Ok("{}".into())
        }
    }

    #[tokio::test]
    async fn contexts_do_not_share_limiters() {
        let config = ExtractionConfig::builder().requests_per_minute(3).build().unwrap();
        let a = ExtractionContext::with_endpoint(config.clone(), Arc::new(Echo));
        let b = ExtractionContext::with_endpoint(config, Arc::new(Echo));
        a.limiter().wait_for_slot().await;
        assert_eq!(a.limiter().queue_length(), 1);
        assert_eq!(b.limiter().queue_length(), 0);
        assert_eq!(a.limiter().requests_per_minute(), 3);
    }

    #[tokio::test]
    async fn reset_clears_history_and_keeps_limit() {
        let mut ctx = ExtractionContext::with_endpoint(ExtractionConfig::default(), Arc::new(Echo));
        ctx.limiter().wait_for_slot().await;
        ctx.set_requests_per_minute(4);
        ctx.reset();
        assert_eq!(ctx.limiter().queue_length(), 0);
        assert_eq!(ctx.limiter().requests_per_minute(), 4);
        assert_eq!(ctx.config().requests_per_minute, 4);
    }
}
