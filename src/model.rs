//! Records shared by the pipeline, the stores and the CLI.
//!
//! * [`Document`] — one imported file and its processing status.
//! * [`Prompt`] — a named extraction template: instructions, schema, columns.
//! * [`ExtractedData`] — the model output for one document plus the user's
//!   edited overlay and any validation errors.
//!
//! Records are plain serde structs; persistence lives in [`crate::store`].

use crate::schema::columns::generate_columns_from_schema;
use crate::schema::JsonSchema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A JSON object, as returned by the model.
pub type JsonObject = Map<String, Value>;

/// Time-ordered identifier; lexical order equals creation order.
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

// ── Document ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Image,
}

/// `pending → processing → {completed, error}`; both outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Error)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rendered page (or a whole image file) ready to attach to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageImage {
    pub mime_type: String,
    /// Base64 payload without the `data:` prefix.
    pub data: String,
}

impl PageImage {
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub file: Vec<u8>,
    /// Rendered pages, filled on first processing and reused afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_images: Option<Vec<PageImage>>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Batch selection. Absent means selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
}

impl Document {
    pub fn new(name: impl Into<String>, kind: DocumentKind, mime_type: impl Into<String>, file: Vec<u8>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            kind,
            mime_type: mime_type.into(),
            file,
            page_images: None,
            uploaded_at: Utc::now(),
            processed_at: None,
            status: DocumentStatus::Pending,
            error: None,
            selected: None,
        }
    }

    pub fn is_selected(&self) -> bool {
        self.selected.unwrap_or(true)
    }

    /// Pending and selected: the batch will pick this document up.
    pub fn is_ready(&self) -> bool {
        self.status == DocumentStatus::Pending && self.is_selected()
    }

    pub fn size_mb(&self) -> f64 {
        self.file.len() as f64 / (1024.0 * 1024.0)
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

// ── Columns ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Number,
    Date,
    Boolean,
    Nested,
}

/// One display column, addressed by dot-path into the extracted data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub key: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    pub editable: bool,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NestedRenderStrategy {
    Inline,
    #[default]
    Expandable,
    Modal,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiConfig {
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub nested_render_strategy: NestedRenderStrategy,
}

// ── Prompt ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub system_prompt: String,
    pub json_schema: JsonSchema,
    pub ui_config: UiConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update for [`Prompt::update`]; `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct PromptUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub system_prompt: Option<String>,
    pub json_schema: Option<JsonSchema>,
    pub nested_render_strategy: Option<NestedRenderStrategy>,
}

impl Prompt {
    /// A new prompt with columns generated from `json_schema`.
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        system_prompt: impl Into<String>,
        json_schema: JsonSchema,
    ) -> Self {
        let now = Utc::now();
        let columns = generate_columns_from_schema(&json_schema);
        Self {
            id: new_id(),
            name: name.into(),
            description,
            system_prompt: system_prompt.into(),
            json_schema,
            ui_config: UiConfig {
                columns,
                nested_render_strategy: NestedRenderStrategy::default(),
            },
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update, bumping `updated_at`. Columns are regenerated
    /// when the schema changes.
    pub fn update(&mut self, update: PromptUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(system_prompt) = update.system_prompt {
            self.system_prompt = system_prompt;
        }
        if let Some(schema) = update.json_schema {
            self.ui_config.columns = generate_columns_from_schema(&schema);
            self.json_schema = schema;
        }
        if let Some(strategy) = update.nested_render_strategy {
            self.ui_config.nested_render_strategy = strategy;
        }
        self.updated_at = Utc::now();
    }
}

// ── Results ──────────────────────────────────────────────────────────────────

/// A validation message attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// The model output for one document. At most one per document id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedData {
    pub document_id: String,
    pub data: JsonObject,
    /// User edits. When present it replaces `data` for display and export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_data: Option<JsonObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<Vec<FieldError>>,
}

impl ExtractedData {
    pub fn new(document_id: impl Into<String>, data: JsonObject) -> Self {
        Self {
            document_id: document_id.into(),
            data,
            edited_data: None,
            validation_errors: None,
        }
    }

    pub fn effective_data(&self) -> &JsonObject {
        self.edited_data.as_ref().unwrap_or(&self.data)
    }

    pub fn is_edited(&self) -> bool {
        self.edited_data.is_some()
    }
}
