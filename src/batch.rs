//! Batch orchestrator: run every pending, selected document through the
//! extraction pipeline, strictly one after another.
//!
//! ## Per-document steps
//!
//! ```text
//! processing ─▶ images ─▶ extract ─▶ validate ─▶ store result ─▶ completed
//!     │           │          │                        │
//!     └───────────┴──────────┴────── any failure ─────┴──▶ error (batch continues)
//! ```
//!
//! Rendered PDF pages are cached on the document, so a retry after an
//! endpoint failure does not rasterise the file again. Schema mismatches are
//! stored on the result and the document still completes.

use crate::context::ExtractionContext;
use crate::error::{DocumentError, ExtractError};
use crate::model::{Document, DocumentKind, DocumentStatus, ExtractedData, PageImage, Prompt};
use crate::pipeline::llm::{process_document, ExtractionJob};
use crate::pipeline::render::PageConverter;
use crate::progress::{BatchProgress, BatchProgressCallback, CancelToken, ProgressHandle};
use crate::schema::validator::validate;
use crate::store::Stores;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Drives batches over the stores with one context and one converter.
pub struct BatchProcessor {
    context: ExtractionContext,
    stores: Stores,
    converter: Arc<dyn PageConverter>,
    progress: ProgressHandle,
}

impl BatchProcessor {
    pub fn new(context: ExtractionContext, stores: Stores, converter: Arc<dyn PageConverter>) -> Self {
        Self {
            context,
            stores,
            converter,
            progress: ProgressHandle::new(),
        }
    }

    /// Handle for observing the running batch from elsewhere.
    pub fn progress(&self) -> ProgressHandle {
        self.progress.clone()
    }

    pub fn context(&self) -> &ExtractionContext {
        &self.context
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    fn callback(&self) -> Option<&Arc<dyn BatchProgressCallback>> {
        self.context.config().progress_callback.as_ref()
    }

    /// Process every pending, selected document with the active prompt.
    ///
    /// Fails before touching any document when there is no active prompt,
    /// the prompt does not exist, or nothing is ready. Per-document failures
    /// are recorded on the document and counted in `failed`; they never
    /// abort the batch. `cancel` is checked before each document.
    pub async fn process_pending(
        &self,
        active_prompt_id: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<BatchProgress, ExtractError> {
        let prompt_id = active_prompt_id.ok_or(ExtractError::NoActivePrompt)?;
        let prompt = self.stores.prompt(prompt_id).await?;

        let pending: Vec<Document> = self
            .stores
            .documents
            .get_all()
            .await?
            .into_iter()
            .filter(Document::is_ready)
            .collect();
        if pending.is_empty() {
            return Err(ExtractError::EmptyBatch);
        }

        let total = pending.len();
        let batch_start = Instant::now();
        info!("Processing {} document(s) with prompt '{}'", total, prompt.name);
        self.progress.start(total);
        if let Some(cb) = self.callback() {
            cb.on_batch_start(total);
        }

        for (idx, mut doc) in pending.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Batch cancelled after {} of {} document(s)", idx, total);
                break;
            }

            self.progress.set_current(Some(&doc.name));
            if let Some(cb) = self.callback() {
                cb.on_document_start(idx + 1, total, &doc.name);
            }

            let doc_start = Instant::now();
            match self.process_one(&mut doc, &prompt).await {
                Ok(validation_errors) => {
                    self.progress.record_completed();
                    info!(
                        "Processed {} in {}ms ({} validation error(s))",
                        doc.name,
                        doc_start.elapsed().as_millis(),
                        validation_errors
                    );
                    if let Some(cb) = self.callback() {
                        cb.on_document_complete(&doc.name, validation_errors);
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!("Failed to process {}: {}", doc.name, message);
                    self.mark_failed(&mut doc, &message).await;
                    self.progress.record_failed();
                    if let Some(cb) = self.callback() {
                        cb.on_document_error(&doc.name, &message);
                    }
                }
            }
        }

        self.progress.set_current(None);
        let summary = self.progress.snapshot();
        info!(
            "Batch finished: {} completed, {} failed of {} in {}ms",
            summary.completed,
            summary.failed,
            summary.total,
            batch_start.elapsed().as_millis()
        );
        if let Some(cb) = self.callback() {
            cb.on_batch_complete(&summary);
        }
        Ok(summary)
    }

    /// Steps 1 to 6 for one document. Returns the number of schema
    /// violations stored on the result.
    async fn process_one(&self, doc: &mut Document, prompt: &Prompt) -> Result<usize, DocumentError> {
        doc.status = DocumentStatus::Processing;
        doc.error = None;
        self.stores.documents.put(doc).await?;

        let images = self.images_for(doc).await?;

        let data = process_document(
            self.context.endpoint(),
            self.context.limiter(),
            ExtractionJob {
                images: &images,
                system_prompt: &prompt.system_prompt,
                schema: &prompt.json_schema,
                requests_per_minute: self.context.config().requests_per_minute,
            },
        )
        .await?;

        let report = validate(&Value::Object(data.clone()), &prompt.json_schema);
        let violations = report.errors.len();
        let result = ExtractedData {
            validation_errors: report.to_field_errors(),
            ..ExtractedData::new(doc.id.clone(), data)
        };
        self.stores.results.put(&result).await?;

        doc.status = DocumentStatus::Completed;
        doc.processed_at = Some(Utc::now());
        doc.selected = None;
        self.stores.documents.put(doc).await?;
        Ok(violations)
    }

    /// Page images for a document, rendering and caching PDFs on first use.
    async fn images_for(&self, doc: &mut Document) -> Result<Vec<PageImage>, DocumentError> {
        match doc.kind {
            DocumentKind::Pdf => {
                if let Some(cached) = doc.page_images.as_ref().filter(|p| !p.is_empty()) {
                    debug!("{}: reusing {} cached page(s)", doc.name, cached.len());
                    return Ok(cached.clone());
                }
                let pages = self.converter.convert_to_images(doc).await?;
                if pages.is_empty() {
                    return Err(DocumentError::ConversionFailed {
                        detail: "document has no pages".to_string(),
                    });
                }
                doc.page_images = Some(pages.clone());
                self.stores.documents.put(doc).await?;
                Ok(pages)
            }
            DocumentKind::Image => Ok(vec![self.converter.load_single_image(doc).await?]),
        }
    }

    async fn mark_failed(&self, doc: &mut Document, message: &str) {
        doc.status = DocumentStatus::Error;
        doc.error = Some(message.to_string());
        if let Err(e) = self.stores.documents.put(doc).await {
            warn!("Could not record failure of {}: {}", doc.name, e);
        }
    }
}
