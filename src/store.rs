//! Storage collaborator: keyed CRUD over documents, prompts and results.
//!
//! [`RecordStore`] is the narrow interface the core depends on. `put` is an
//! upsert and a missing key reads back as `Ok(None)`, never as an error.
//! Two implementations ship with the crate:
//!
//! * [`MemoryStore`] — insertion-ordered, process lifetime only. Used by
//!   tests and embedders that persist elsewhere.
//! * [`FileStore`] — one JSON file per record under `<dir>/<kind>/`, written
//!   atomically (temp file + rename). Used by the CLI.

use crate::error::ExtractError;
use crate::model::{Document, ExtractedData, Prompt};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// A persistable record with a string key and named secondary indexes.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection name, also the on-disk directory.
    const KIND: &'static str;

    fn key(&self) -> &str;

    /// Value of the named index for this record, if the index exists.
    fn index_value(&self, index: &str) -> Option<String>;
}

impl Record for Document {
    const KIND: &'static str = "documents";

    fn key(&self) -> &str {
        &self.id
    }

    fn index_value(&self, index: &str) -> Option<String> {
        match index {
            "status" => Some(self.status.as_str().to_string()),
            "date" => Some(self.uploaded_at.format("%Y-%m-%d").to_string()),
            _ => None,
        }
    }
}

impl Record for Prompt {
    const KIND: &'static str = "prompts";

    fn key(&self) -> &str {
        &self.id
    }

    fn index_value(&self, index: &str) -> Option<String> {
        match index {
            "name" => Some(self.name.clone()),
            "date" => Some(self.created_at.format("%Y-%m-%d").to_string()),
            _ => None,
        }
    }
}

impl Record for ExtractedData {
    const KIND: &'static str = "results";

    fn key(&self) -> &str {
        &self.document_id
    }

    fn index_value(&self, index: &str) -> Option<String> {
        match index {
            "documentId" => Some(self.document_id.clone()),
            _ => None,
        }
    }
}

/// Keyed CRUD over one record kind.
#[async_trait]
pub trait RecordStore<R: Record>: Send + Sync {
    /// Insert or replace by key.
    async fn put(&self, record: &R) -> Result<(), ExtractError>;

    async fn get(&self, id: &str) -> Result<Option<R>, ExtractError>;

    async fn get_all(&self) -> Result<Vec<R>, ExtractError>;

    async fn get_all_by_index(&self, index: &str, value: &str) -> Result<Vec<R>, ExtractError> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|r| r.index_value(index).as_deref() == Some(value))
            .collect())
    }

    /// Remove by key. Removing a missing key is not an error.
    async fn delete(&self, id: &str) -> Result<(), ExtractError>;
}

// ── In-memory ────────────────────────────────────────────────────────────────

/// Insertion-ordered in-memory store.
pub struct MemoryStore<R> {
    records: Mutex<IndexMap<String, R>>,
}

impl<R> Default for MemoryStore<R> {
    fn default() -> Self {
        Self {
            records: Mutex::new(IndexMap::new()),
        }
    }
}

impl<R> MemoryStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IndexMap<String, R>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl<R: Record> RecordStore<R> for MemoryStore<R> {
    async fn put(&self, record: &R) -> Result<(), ExtractError> {
        self.lock().insert(record.key().to_string(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<R>, ExtractError> {
        Ok(self.lock().get(id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<R>, ExtractError> {
        Ok(self.lock().values().cloned().collect())
    }

    async fn delete(&self, id: &str) -> Result<(), ExtractError> {
        self.lock().shift_remove(id);
        Ok(())
    }
}

// ── Directory-backed ─────────────────────────────────────────────────────────

/// One pretty-printed JSON file per record under `<root>/<KIND>/<id>.json`.
///
/// `get_all` returns records sorted by key; ids are time-ordered, so this is
/// creation order.
pub struct FileStore<R> {
    dir: PathBuf,
    _kind: PhantomData<fn() -> R>,
}

impl<R: Record> FileStore<R> {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            dir: root.as_ref().join(R::KIND),
            _kind: PhantomData,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, ExtractError> {
        if id.is_empty() || id.contains('/') || id.contains('\\') || id.contains("..") {
            return Err(ExtractError::Storage(format!("invalid record id '{id}'")));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

fn io_error(action: &str, path: &Path, e: impl std::fmt::Display) -> ExtractError {
    ExtractError::Storage(format!("{action} {}: {e}", path.display()))
}

#[async_trait]
impl<R: Record> RecordStore<R> for FileStore<R> {
    async fn put(&self, record: &R) -> Result<(), ExtractError> {
        let path = self.path_for(record.key())?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error("create", &self.dir, e))?;

        let json = serde_json::to_vec_pretty(record).map_err(|e| ExtractError::Storage(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| io_error("write", &tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error("rename", &path, e))?;
        debug!("Stored {} {}", R::KIND, record.key());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<R>, ExtractError> {
        let path = self.path_for(id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error("read", &path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| io_error("parse", &path, e))
    }

    async fn get_all(&self) -> Result<Vec<R>, ExtractError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("list", &self.dir, e)),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("list", &self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| io_error("read", &path, e))?;
            match serde_json::from_slice::<R>(&bytes) {
                Ok(r) => records.push(r),
                Err(e) => warn!("Skipping unreadable {}: {}", path.display(), e),
            }
        }
        records.sort_by(|a, b| a.key().cmp(b.key()));
        Ok(records)
    }

    async fn delete(&self, id: &str) -> Result<(), ExtractError> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete", &path, e)),
        }
    }
}

// ── Bundle ───────────────────────────────────────────────────────────────────

/// The three collections the application works with.
#[derive(Clone)]
pub struct Stores {
    pub documents: Arc<dyn RecordStore<Document>>,
    pub prompts: Arc<dyn RecordStore<Prompt>>,
    pub results: Arc<dyn RecordStore<ExtractedData>>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            documents: Arc::new(MemoryStore::<Document>::new()),
            prompts: Arc::new(MemoryStore::<Prompt>::new()),
            results: Arc::new(MemoryStore::<ExtractedData>::new()),
        }
    }

    /// Directory-backed stores rooted at `root`.
    pub fn open_dir(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            documents: Arc::new(FileStore::<Document>::new(root)),
            prompts: Arc::new(FileStore::<Prompt>::new(root)),
            results: Arc::new(FileStore::<ExtractedData>::new(root)),
        }
    }

    /// Fetch a document, failing with `NotFound` when absent.
    pub async fn document(&self, id: &str) -> Result<Document, ExtractError> {
        self.documents.get(id).await?.ok_or_else(|| ExtractError::NotFound {
            kind: "document",
            id: id.to_string(),
        })
    }

    /// Fetch a prompt, failing with `NotFound` when absent.
    pub async fn prompt(&self, id: &str) -> Result<Prompt, ExtractError> {
        self.prompts.get(id).await?.ok_or_else(|| ExtractError::NotFound {
            kind: "prompt",
            id: id.to_string(),
        })
    }

    /// Fetch the result of a document, failing with `NotFound` when absent.
    pub async fn result(&self, document_id: &str) -> Result<ExtractedData, ExtractError> {
        self.results
            .get(document_id)
            .await?
            .ok_or_else(|| ExtractError::NotFound {
                kind: "result",
                id: document_id.to_string(),
            })
    }

    /// Delete a document together with its result.
    pub async fn delete_document(&self, id: &str) -> Result<(), ExtractError> {
        self.results.delete(id).await?;
        self.documents.delete(id).await
    }

    /// Prompts whose name contains `query`, case-insensitively.
    pub async fn search_prompts(&self, query: &str) -> Result<Vec<Prompt>, ExtractError> {
        let needle = query.to_lowercase();
        Ok(self
            .prompts
            .get_all()
            .await?
            .into_iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .collect())
    }
}
