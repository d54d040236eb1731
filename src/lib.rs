//! # edgequake-extract
//!
//! Schema-driven structured data extraction from PDFs and images using
//! Vision Language Models (VLMs).
//!
//! A **prompt** pairs extraction instructions with a JSON Schema. Documents
//! are rendered to page images, sent to the model together with the schema,
//! and the reply is stored as a JSON object next to any schema violations.
//! Users correct values afterwards through path-addressed edits that layer on
//! top of the raw model output, and completed results export as flat rows.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / image
//!  │
//!  ├─ 1. Import    local file or URL, kind sniffed from magic bytes
//!  ├─ 2. Render    rasterise PDF pages via pdfium (spawn_blocking), cached
//!  ├─ 3. Admit     sliding-window rate limiter (N calls per 60 s)
//!  ├─ 4. Extract   one VLM call: instructions + schema + page images
//!  ├─ 5. Validate  JSON Schema check, violations kept as data
//!  └─ 6. Persist   result stored, document marked completed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_extract::{
//!     BatchProcessor, CancelToken, ExtractionConfig, ExtractionContext, JsonSchema,
//!     PdfiumConverter, Prompt, Stores,
//! };
//! use edgequake_extract::pipeline::input::import_document;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = ExtractionConfig::default();
//!     let context = ExtractionContext::init(config.clone())?;
//!     let stores = Stores::in_memory();
//!
//!     let schema = JsonSchema::from_json_str(
//!         r#"{"type":"object","properties":{"total":{"type":"number"}},"required":["total"]}"#,
//!     )?;
//!     let prompt = Prompt::new("Invoices", None, "Extract the invoice total.", schema);
//!     stores.prompts.put(&prompt).await?;
//!     stores.documents.put(&import_document("invoice.pdf", &config).await?).await?;
//!
//!     let batch = BatchProcessor::new(context, stores.clone(), Arc::new(PdfiumConverter::new(&config)));
//!     let summary = batch.process_pending(Some(&prompt.id), &CancelToken::new()).await?;
//!     eprintln!("{} completed, {} failed", summary.completed, summary.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2json` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-extract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod context;
pub mod edit;
pub mod error;
pub mod export;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod schema;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::BatchProcessor;
pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use context::ExtractionContext;
pub use error::{DocumentError, ExtractError};
pub use export::{export_rows, ExportOptions, ExportTable};
pub use model::{
    ColumnConfig, ColumnType, Document, DocumentKind, DocumentStatus, ExtractedData, FieldError,
    NestedRenderStrategy, PageImage, Prompt, PromptUpdate, UiConfig,
};
pub use pipeline::rate_limit::RateLimiter;
pub use pipeline::render::{PageConverter, PdfiumConverter};
pub use progress::{BatchProgress, BatchProgressCallback, CancelToken, NoopProgressCallback, ProgressHandle};
pub use schema::columns::generate_columns_from_schema;
pub use schema::validator::{validate, ValidationReport};
pub use schema::{JsonSchema, PropertyKind, SchemaProperty};
pub use store::{FileStore, MemoryStore, RecordStore, Stores};
