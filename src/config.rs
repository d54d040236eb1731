//! Configuration for document extraction.
//!
//! Every knob of the pipeline lives in [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. The config is handed to
//! [`crate::context::ExtractionContext::init`], which resolves the provider
//! and creates the shared rate limiter from it.
//!
//! # Design choice: builder over constructor
//! Callers set only what they care about and rely on the documented defaults
//! for the rest. Setters clamp out-of-range values; `build()` rejects the
//! combinations that cannot be clamped.

use crate::error::ExtractError;
use crate::progress::BatchProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Default extraction model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default admission limit of the shared rate limiter.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 10;

/// Configuration for an extraction session.
///
/// # Example
/// ```rust
/// use edgequake_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("gpt-4o-mini")
///     .requests_per_minute(20)
///     .build()
///     .unwrap();
/// assert_eq!(config.requests_per_minute, 20);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Model identifier. Default: `gpt-4o`.
    pub model: String,

    /// Provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the environment decides.
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Extraction wants the model to copy what it sees; low temperature keeps
    /// field values stable between runs.
    pub temperature: f32,

    /// Maximum tokens the model may generate per document. Default: 4096.
    pub max_tokens: usize,

    /// Extraction calls admitted per trailing minute. Default: 10. Minimum: 1.
    pub requests_per_minute: u32,

    /// Maximum rendered page dimension (width or height) in pixels. Default: 2000.
    ///
    /// Caps the payload size of each page image; the other dimension scales
    /// proportionally.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Only the first `max_pages` pages of a PDF are sent. Default: all.
    pub max_pages: Option<usize>,

    /// Per-call timeout for the extraction endpoint in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL imports in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Largest accepted import in megabytes. Default: 50.
    pub max_file_size_mb: u64,

    /// Receives batch events. Default: none.
    pub progress_callback: Option<Arc<dyn BatchProgressCallback>>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            max_rendered_pixels: 2000,
            password: None,
            max_pages: None,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            max_file_size_mb: 50,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("max_pages", &self.max_pages)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("max_file_size_mb", &self.max_file_size_mb)
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
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
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

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn requests_per_minute(mut self, rpm: u32) -> Self {
        self.config.requests_per_minute = rpm.max(1);
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

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = Some(n);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_file_size_mb(mut self, mb: u64) -> Self {
        self.config.max_file_size_mb = mb;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn BatchProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(ExtractError::InvalidConfig("Model must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(ExtractError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.max_pages == Some(0) {
            return Err(ExtractError::InvalidConfig("max_pages must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 || c.download_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig("Timeouts must be ≥ 1 second".into()));
        }
        if c.max_file_size_mb == 0 {
            return Err(ExtractError::InvalidConfig(
                "max_file_size_mb must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ExtractionConfig::default();
        assert_eq!(c.model, "gpt-4o");
        assert_eq!(c.temperature, 0.1);
        assert_eq!(c.max_tokens, 4096);
        assert_eq!(c.requests_per_minute, 10);
        assert_eq!(c.max_rendered_pixels, 2000);
        assert_eq!(c.api_timeout_secs, 60);
        assert_eq!(c.download_timeout_secs, 120);
        assert_eq!(c.max_file_size_mb, 50);
        assert!(c.max_pages.is_none());
    }

    #[test]
    fn setters_clamp() {
        let c = ExtractionConfig::builder()
            .requests_per_minute(0)
            .temperature(5.0)
            .max_rendered_pixels(10)
            .build()
            .unwrap();
        assert_eq!(c.requests_per_minute, 1);
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.max_rendered_pixels, 100);
    }

    #[test]
    fn build_rejects_unclampable_values() {
        assert!(ExtractionConfig::builder().model("  ").build().is_err());
        assert!(ExtractionConfig::builder().max_pages(0).build().is_err());
        assert!(ExtractionConfig::builder().api_timeout_secs(0).build().is_err());
        assert!(ExtractionConfig::builder().max_file_size_mb(0).build().is_err());
    }

    #[test]
    fn debug_masks_password() {
        let c = ExtractionConfig::builder().password("hunter2").build().unwrap();
        let s = format!("{c:?}");
        assert!(!s.contains("hunter2"));
        assert!(s.contains("***"));
    }
}
