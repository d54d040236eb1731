//! Document import: turn a user-supplied path or URL into a [`Document`].
//!
//! The payload is read fully into memory; documents own their bytes so the
//! store can persist them and pdfium can load them from a byte slice. The
//! kind is decided from magic bytes (`%PDF` or a PNG/JPEG/WebP signature),
//! never from the file extension.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::model::{Document, DocumentKind};
use crate::pipeline::encode::sniff_image_format;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PDF_MAGIC: &[u8] = b"%PDF";

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Decide the document kind and MIME type from the payload.
pub fn detect_kind(bytes: &[u8]) -> Option<(DocumentKind, String)> {
    if bytes.starts_with(PDF_MAGIC) {
        return Some((DocumentKind::Pdf, "application/pdf".to_string()));
    }
    sniff_image_format(bytes).map(|f| (DocumentKind::Image, f.to_mime_type().to_string()))
}

/// Import a local file or URL as a new pending document.
pub async fn import_document(input: &str, config: &ExtractionConfig) -> Result<Document, ExtractError> {
    let (name, bytes) = if is_url(input) {
        download_url(input, config.download_timeout_secs).await?
    } else {
        read_local(Path::new(input)).await?
    };
    document_from_bytes(name, bytes, config.max_file_size_mb)
}

/// Build a document from an in-memory payload, enforcing the size cap.
pub fn document_from_bytes(name: impl Into<String>, bytes: Vec<u8>, max_file_size_mb: u64) -> Result<Document, ExtractError> {
    let name = name.into();
    let size_mb = bytes.len() as f64 / (1024.0 * 1024.0);
    if size_mb > max_file_size_mb as f64 {
        return Err(ExtractError::FileTooLarge {
            name,
            size_mb,
            max_mb: max_file_size_mb,
        });
    }

    let (kind, mime_type) =
        detect_kind(&bytes).ok_or_else(|| ExtractError::UnsupportedFile { name: name.clone() })?;

    debug!("Imported {} as {:?} ({:.2} MB)", name, kind, size_mb);
    Ok(Document::new(name, kind, mime_type, bytes))
}

async fn read_local(path: &Path) -> Result<(String, Vec<u8>), ExtractError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(ExtractError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    debug!("Read local file: {}", path.display());
    Ok((name, bytes))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<(String, Vec<u8>), ExtractError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ExtractError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ExtractError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok((filename_from_url(url), bytes.to_vec()))
}

/// Last path segment of the URL, or a generic name.
pub fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded".to_string()
}

/// Expand CLI inputs: directories contribute their direct children.
pub fn expand_inputs(inputs: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for input in inputs {
        let path = PathBuf::from(input);
        if !is_url(input) && path.is_dir() {
            if let Ok(entries) = std::fs::read_dir(&path) {
                let mut files: Vec<String> = entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.is_file())
                    .map(|p| p.to_string_lossy().into_owned())
                    .collect();
                files.sort();
                out.extend(files);
            }
        } else {
            out.push(input.clone());
        }
    }
    out
}
