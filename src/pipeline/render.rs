//! Document → page images, via pdfium for PDFs.
//!
//! The orchestrator only sees the [`PageConverter`] trait; [`PdfiumConverter`]
//! is the production implementation.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and blocks while rasterising. `tokio::task::spawn_blocking` keeps
//! the Tokio worker threads free while a page renders.
//!
//! ## Why cap pixels?
//!
//! Page sizes vary wildly. `max_rendered_pixels` bounds the longest edge so a
//! poster-sized page does not become a payload the endpoint rejects as a bad
//! request.

use crate::config::ExtractionConfig;
use crate::error::{DocumentError, ExtractError};
use crate::model::{Document, PageImage};
use crate::pipeline::encode;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

/// Converts documents into the images sent to the model.
#[async_trait]
pub trait PageConverter: Send + Sync {
    /// Render every page of a PDF, in page order starting at page 1.
    async fn convert_to_images(&self, document: &Document) -> Result<Vec<PageImage>, DocumentError>;

    /// Wrap an image document as a single page.
    async fn load_single_image(&self, document: &Document) -> Result<PageImage, DocumentError> {
        encode::load_image(&document.file)
    }
}

/// Render settings taken from [`ExtractionConfig`].
#[derive(Debug, Clone)]
pub struct PdfiumConverter {
    max_pixels: u32,
    password: Option<String>,
    max_pages: Option<usize>,
}

impl PdfiumConverter {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            max_pixels: config.max_rendered_pixels,
            password: config.password.clone(),
            max_pages: config.max_pages,
        }
    }
}

#[async_trait]
impl PageConverter for PdfiumConverter {
    async fn convert_to_images(&self, document: &Document) -> Result<Vec<PageImage>, DocumentError> {
        let bytes = document.file.clone();
        let settings = self.clone();
        let name = document.name.clone();

        tokio::task::spawn_blocking(move || render_blocking(&bytes, &settings, &name))
            .await
            .map_err(|e| DocumentError::ConversionFailed {
                detail: format!("Render task panicked: {e}"),
            })?
    }
}

fn load_error(e: &PdfiumError, password: Option<&str>) -> String {
    let err_str = format!("{e:?}");
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            "incorrect PDF password".to_string()
        } else {
            "PDF is password-protected; supply a password".to_string()
        }
    } else {
        format!("invalid or corrupt PDF: {err_str}")
    }
}

fn render_blocking(bytes: &[u8], settings: &PdfiumConverter, name: &str) -> Result<Vec<PageImage>, DocumentError> {
    let pdfium = Pdfium::default();
    let password = settings.password.as_deref();

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| DocumentError::ConversionFailed {
            detail: load_error(&e, password),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    let wanted = settings.max_pages.map_or(total_pages, |m| m.min(total_pages));
    info!("{}: rendering {} of {} pages", name, wanted, total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(settings.max_pixels as i32)
        .set_maximum_height(settings.max_pixels as i32);

    let mut images = Vec::with_capacity(wanted);
    for (idx, page) in pages.iter().enumerate().take(wanted) {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| DocumentError::ConversionFailed {
                detail: format!("page {}: {e:?}", idx + 1),
            })?;
        let image = bitmap.as_image();
        debug!("Rendered page {} → {}x{} px", idx + 1, image.width(), image.height());

        let encoded = encode::encode_page(&image).map_err(|e| DocumentError::ConversionFailed {
            detail: format!("page {}: image encoding failed: {e}", idx + 1),
        })?;
        images.push(encoded);
    }

    if images.is_empty() {
        return Err(DocumentError::ConversionFailed {
            detail: "PDF has no pages".to_string(),
        });
    }
    Ok(images)
}

// ── PDF info ─────────────────────────────────────────────────────────────────

/// Basic facts about a PDF, read without rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfInfo {
    pub num_pages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Page count, title and author of a PDF.
pub async fn pdf_info(bytes: Vec<u8>, password: Option<String>) -> Result<PdfInfo, ExtractError> {
    tokio::task::spawn_blocking(move || pdf_info_blocking(&bytes, password.as_deref()))
        .await
        .map_err(|e| ExtractError::Internal(format!("Metadata task panicked: {e}")))?
}

fn pdf_info_blocking(bytes: &[u8], password: Option<&str>) -> Result<PdfInfo, ExtractError> {
    let pdfium = Pdfium::default();
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| ExtractError::Internal(load_error(&e, password)))?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    Ok(PdfInfo {
        num_pages: document.pages().len() as usize,
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
    })
}
