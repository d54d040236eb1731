//! Schema → display columns.
//!
//! Every property at every depth becomes one [`ColumnConfig`] keyed by its
//! dot-path from the root. Columns follow declaration order, depth-first,
//! with a container's own column emitted before its children.
//!
//! Arrays of objects are a known limitation: their item properties are
//! addressed under the array's own path (`line_items.sku`, not
//! `line_items.0.sku`) because the table shows one row per document, not one
//! row per array element.

use super::{JsonSchema, PropertyKind, SchemaProperty};
use crate::model::{ColumnConfig, ColumnType};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

static WORD_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[_\-\s]+").unwrap());

/// Derive the flat column list for a schema.
pub fn generate_columns_from_schema(schema: &JsonSchema) -> Vec<ColumnConfig> {
    let mut columns = Vec::new();
    push_columns(&schema.properties, None, &mut Vec::new(), &mut columns);
    columns
}

fn push_columns(
    properties: &IndexMap<String, SchemaProperty>,
    parent_key: Option<&str>,
    parent_labels: &mut Vec<String>,
    out: &mut Vec<ColumnConfig>,
) {
    for (key, prop) in properties {
        let full_key = match parent_key {
            Some(parent) => format!("{parent}.{key}"),
            None => key.clone(),
        };
        parent_labels.push(format_label(key));

        out.push(ColumnConfig {
            key: full_key.clone(),
            label: parent_labels.join(" > "),
            width: None,
            editable: true,
            column_type: column_type_for(prop.kind),
            format: prop.format.clone(),
        });

        if prop.kind == PropertyKind::Object {
            if let Some(children) = &prop.properties {
                push_columns(children, Some(&full_key), parent_labels, out);
            }
        }
        if let Some(items) = prop.object_items() {
            if let Some(children) = &items.properties {
                push_columns(children, Some(&full_key), parent_labels, out);
            }
        }

        parent_labels.pop();
    }
}

/// `invoice_number` → `Invoice Number`. Separators are `_`, `-` and
/// whitespace; the rest of each word keeps its case.
pub fn format_label(key: &str) -> String {
    WORD_SEPARATORS
        .split(key)
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Booleans render as literal text, not a toggle.
pub fn column_type_for(kind: PropertyKind) -> ColumnType {
    match kind {
        PropertyKind::String => ColumnType::Text,
        PropertyKind::Number | PropertyKind::Integer => ColumnType::Number,
        PropertyKind::Boolean => ColumnType::Text,
        PropertyKind::Object | PropertyKind::Array => ColumnType::Nested,
        PropertyKind::Null => ColumnType::Text,
    }
}
