//! Tabular export of extracted results.
//!
//! One row per completed document. Nested objects are flattened to dot-path
//! headers; arrays are written as their JSON text instead of being expanded.
//! The table can be emitted as JSON rows or as CSV.

use crate::error::ExtractError;
use crate::model::{Document, DocumentStatus, ExtractedData, JsonObject};
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

const DOCUMENT_NAME: &str = "Document Name";
const UPLOAD_DATE: &str = "Upload Date";
const PROCESSED_DATE: &str = "Processed Date";

/// Widest column a spreadsheet consumer should auto-size to.
pub const MAX_COLUMN_WIDTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Prepend document name, upload date and processed date.
    pub include_document_info: bool,
    /// Prefer user edits over the raw model output.
    pub use_edited_data: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_document_info: true,
            use_edited_data: true,
        }
    }
}

/// Flat rows plus the union of their headers in first-seen order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportTable {
    pub headers: Vec<String>,
    pub rows: Vec<IndexMap<String, Value>>,
}

/// Flatten nested objects to dot-path keys; arrays become JSON text.
pub fn flatten_object(obj: &JsonObject) -> IndexMap<String, Value> {
    let mut out = IndexMap::new();
    flatten_into(obj, "", &mut out);
    out
}

fn flatten_into(obj: &JsonObject, prefix: &str, out: &mut IndexMap<String, Value>) {
    for (key, value) in obj {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => flatten_into(nested, &path, out),
            Value::Array(_) => {
                out.insert(path, Value::String(value.to_string()));
            }
            other => {
                out.insert(path, other.clone());
            }
        }
    }
}

fn iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Build the export table from documents (in the given order) and results.
///
/// Only `completed` documents that have a result are exported. Fails with
/// [`ExtractError::NothingToExport`] when that leaves nothing.
pub fn export_rows(
    documents: &[Document],
    results: &[ExtractedData],
    options: ExportOptions,
) -> Result<ExportTable, ExtractError> {
    let by_id: HashMap<&str, &ExtractedData> = results.iter().map(|r| (r.document_id.as_str(), r)).collect();

    let mut headers: IndexSet<String> = IndexSet::new();
    let mut rows = Vec::new();

    for doc in documents.iter().filter(|d| d.status == DocumentStatus::Completed) {
        let Some(result) = by_id.get(doc.id.as_str()) else {
            continue;
        };
        let data = if options.use_edited_data {
            result.effective_data()
        } else {
            &result.data
        };

        let mut row = IndexMap::new();
        if options.include_document_info {
            row.insert(DOCUMENT_NAME.to_string(), Value::String(doc.name.clone()));
            row.insert(UPLOAD_DATE.to_string(), Value::String(iso(&doc.uploaded_at)));
            row.insert(
                PROCESSED_DATE.to_string(),
                Value::String(doc.processed_at.as_ref().map(iso).unwrap_or_default()),
            );
        }
        row.extend(flatten_object(data));

        headers.extend(row.keys().cloned());
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(ExtractError::NothingToExport);
    }

    Ok(ExportTable {
        headers: headers.into_iter().collect(),
        rows,
    })
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

impl ExportTable {
    /// RFC 4180 CSV with a header line; missing cells are empty.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        let header: Vec<String> = self.headers.iter().map(|h| csv_field(h)).collect();
        out.push_str(&header.join(","));
        out.push_str("\r\n");
        for row in &self.rows {
            let cells: Vec<String> = self
                .headers
                .iter()
                .map(|h| csv_field(&cell_text(row.get(h))))
                .collect();
            out.push_str(&cells.join(","));
            out.push_str("\r\n");
        }
        out
    }

    /// Per-column width in characters: the longest of header and cells plus
    /// two, capped at [`MAX_COLUMN_WIDTH`].
    pub fn column_widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .map(|h| {
                let longest = self
                    .rows
                    .iter()
                    .map(|r| cell_text(r.get(h)).chars().count())
                    .chain(std::iter::once(h.chars().count()))
                    .max()
                    .unwrap_or(0);
                (longest + 2).min(MAX_COLUMN_WIDTH)
            })
            .collect()
    }
}

/// `extracted-data-2024-05-01T10-20-30.<ext>`
pub fn default_export_filename(now: DateTime<Utc>, extension: &str) -> String {
    format!("extracted-data-{}.{extension}", now.format("%Y-%m-%dT%H-%M-%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentKind;
    use chrono::TimeZone;
    use serde_json::json;

    fn obj(v: Value) -> JsonObject {
        v.as_object().cloned().unwrap()
    }

    fn completed(name: &str) -> Document {
        let mut d = Document::new(name, DocumentKind::Pdf, "application/pdf", vec![]);
        d.status = DocumentStatus::Completed;
        d.processed_at = Some(Utc::now());
        d
    }

    #[test]
    fn nested_objects_flatten_and_arrays_stringify() {
        let flat = flatten_object(&obj(json!({
            "vendor": {"name": "ACME", "address": {"city": "Lyon"}},
            "items": [{"sku": "A"}],
            "total": 9.5,
            "note": null
        })));
        let keys: Vec<_> = flat.keys().cloned().collect();
        assert_eq!(keys, vec!["vendor.name", "vendor.address.city", "items", "total", "note"]);
        assert_eq!(flat["items"], json!("[{\"sku\":\"A\"}]"));
        assert_eq!(flat["note"], Value::Null);
    }

    #[test]
    fn only_completed_documents_with_results_export() {
        let a = completed("a.pdf");
        let b = Document::new("b.pdf", DocumentKind::Pdf, "application/pdf", vec![]);
        let c = completed("c.pdf");
        let results = vec![
            ExtractedData::new(a.id.clone(), obj(json!({"total": 1}))),
            ExtractedData::new(b.id.clone(), obj(json!({"total": 2}))),
        ];
        let table = export_rows(&[a, b, c], &results, ExportOptions::default()).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.headers, vec![DOCUMENT_NAME, UPLOAD_DATE, PROCESSED_DATE, "total"]);
        assert_eq!(table.rows[0][DOCUMENT_NAME], json!("a.pdf"));
    }

    #[test]
    fn edited_data_is_preferred_when_asked() {
        let a = completed("a.pdf");
        let mut result = ExtractedData::new(a.id.clone(), obj(json!({"total": 1})));
        result.edited_data = Some(obj(json!({"total": 5})));

        let opts = ExportOptions {
            include_document_info: false,
            use_edited_data: true,
        };
        let table = export_rows(std::slice::from_ref(&a), std::slice::from_ref(&result), opts).unwrap();
        assert_eq!(table.headers, vec!["total"]);
        assert_eq!(table.rows[0]["total"], json!(5));

        let raw = ExportOptions {
            use_edited_data: false,
            ..opts
        };
        let table = export_rows(&[a], &[result], raw).unwrap();
        assert_eq!(table.rows[0]["total"], json!(1));
    }

    #[test]
    fn nothing_to_export() {
        let pending = Document::new("p.pdf", DocumentKind::Pdf, "application/pdf", vec![]);
        let err = export_rows(&[pending], &[], ExportOptions::default()).unwrap_err();
        assert!(matches!(err, ExtractError::NothingToExport));
    }

    #[test]
    fn csv_quotes_and_fills_missing_cells() {
        let table = ExportTable {
            headers: vec!["a".into(), "b".into()],
            rows: vec![
                IndexMap::from([("a".to_string(), json!("x, \"y\"")), ("b".to_string(), json!(2))]),
                IndexMap::from([("a".to_string(), json!(true))]),
            ],
        };
        assert_eq!(table.to_csv(), "a,b\r\n\"x, \"\"y\"\"\",2\r\ntrue,\r\n");
        assert_eq!(table.column_widths(), vec![8, 3]);
    }

    #[test]
    fn widths_are_capped() {
        let table = ExportTable {
            headers: vec!["k".into()],
            rows: vec![IndexMap::from([("k".to_string(), json!("x".repeat(80)))])],
        };
        assert_eq!(table.column_widths(), vec![MAX_COLUMN_WIDTH]);
    }

    #[test]
    fn filename_has_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 20, 30).unwrap();
        assert_eq!(default_export_filename(now, "csv"), "extracted-data-2024-05-01T10-20-30.csv");
    }
}
