//! Error types for the edgequake-extract library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Operation-level**: the user action cannot start or
//!   cannot complete (no credential, no active prompt, empty batch, malformed
//!   schema, storage unavailable). Returned as `Err(ExtractError)` from the
//!   top-level entry points.
//!
//! * [`DocumentError`] — **Per-document**: one document failed (conversion
//!   glitch, endpoint rejection, unparsable model reply) but the batch carries
//!   on. The orchestrator records its message on the document and counts it as
//!   a failure; it never aborts the batch.
//!
//! Schema non-conformance of a model reply is neither: it is data-quality
//! feedback stored as `validation_errors` on the result.

use std::path::PathBuf;
use thiserror::Error;

/// All operation-level errors returned by the edgequake-extract library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input / config errors ─────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// A batch was requested without an active prompt.
    #[error("No active prompt selected.\nCreate a prompt and activate it before processing.")]
    NoActivePrompt,

    /// A batch was requested but no document is pending and selected.
    #[error("No documents to process")]
    EmptyBatch,

    /// A schema failed the `{type: "object", properties: {...}}` sanity check.
    #[error("Invalid JSON schema: {0}")]
    InvalidSchema(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A field or value path does not address anything editable.
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A record was looked up by id and does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    // ── Import errors ─────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The payload is neither a PDF nor a supported image.
    #[error("Unsupported file '{name}': only PDF, PNG, JPEG and WebP are accepted")]
    UnsupportedFile { name: String },

    /// The payload exceeds the configured size cap.
    #[error("File '{name}' is {size_mb:.1} MB, above the {max_mb} MB limit")]
    FileTooLarge { name: String, size_mb: f64, max_mb: u64 },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Export errors ─────────────────────────────────────────────────────
    /// Export was requested but nothing has completed yet.
    #[error("No completed documents to export")]
    NothingToExport,

    // ── Storage errors ────────────────────────────────────────────────────
    /// The storage collaborator failed.
    #[error("Storage error: {0}")]
    Storage(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error scoped to a single document.
///
/// The display string is what ends up in `Document::error`.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    /// PDF rasterisation or image loading failed.
    #[error("Conversion failed: {detail}")]
    ConversionFailed { detail: String },

    /// The endpoint rejected the credential (HTTP 401/403).
    #[error("Invalid API key")]
    Unauthorized { detail: String },

    /// The endpoint throttled the request (HTTP 429). Distinct from local
    /// rate limiting, which only ever delays.
    #[error("Rate limit exceeded")]
    RateLimited { detail: String },

    /// The endpoint rejected the request as malformed (HTTP 400), e.g. an
    /// oversized image payload.
    #[error("Bad request to extraction endpoint: {detail}")]
    BadRequest { detail: String },

    /// The model replied with nothing usable.
    #[error("No response content from extraction endpoint")]
    EmptyResponse,

    /// The model reply was not a JSON object.
    #[error("Model response is not valid JSON: {detail}")]
    InvalidResponse { detail: String },

    /// Any other endpoint failure; wraps the underlying cause.
    #[error("Failed to process document: {detail}")]
    ProcessingFailed { detail: String },

    /// Persisting the document or its result failed mid-run.
    #[error("Storage error: {detail}")]
    Storage { detail: String },
}

impl From<ExtractError> for DocumentError {
    fn from(e: ExtractError) -> Self {
        DocumentError::Storage {
            detail: e.to_string(),
        }
    }
}
