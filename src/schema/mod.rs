//! JSON Schema model: the contract a model reply must satisfy.
//!
//! Only the subset a user can build in the schema builder is modelled:
//! `object | array | string | number | integer | boolean | null`, nested
//! `properties`/`required`, array `items`, and the scalar constraints
//! (`minimum`, `maximum`, `minLength`, `maxLength`, `format`, `enum`).
//!
//! Property maps are [`IndexMap`]s so declaration order survives every
//! parse/serialise cycle; the column projector and the builder both depend
//! on it.
//!
//! ## Submodules
//!
//! 1. [`builder`]   — field tree ⇄ schema conversion and the schema editor
//! 2. [`columns`]   — schema → flat dot-path display columns
//! 3. [`validator`] — data ⇄ schema validation with field-level errors

pub mod builder;
pub mod columns;
pub mod validator;

use crate::error::ExtractError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Primitive or composite kind of a schema property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl PropertyKind {
    /// The JSON Schema keyword for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::String => "string",
            PropertyKind::Number => "number",
            PropertyKind::Integer => "integer",
            PropertyKind::Boolean => "boolean",
            PropertyKind::Object => "object",
            PropertyKind::Array => "array",
            PropertyKind::Null => "null",
        }
    }
}

/// The root type tag. A root schema is always an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootKind {
    #[default]
    Object,
}

/// One property of a schema, possibly nested.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaProperty {
    #[serde(rename = "type")]
    pub kind: PropertyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Child properties (object kind only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, SchemaProperty>>,
    /// Required child names (object kind only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Element descriptor (array kind only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaProperty>>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
}

impl SchemaProperty {
    /// A bare property of the given kind with no constraints.
    pub fn of(kind: PropertyKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// `true` for an object property that declares child properties.
    pub fn is_structured_object(&self) -> bool {
        self.kind == PropertyKind::Object && self.properties.is_some()
    }

    /// The item descriptor when this is an array of structured objects.
    pub fn object_items(&self) -> Option<&SchemaProperty> {
        match (&self.kind, &self.items) {
            (PropertyKind::Array, Some(items)) if items.is_structured_object() => Some(items),
            _ => None,
        }
    }
}

/// A root JSON Schema: always `type: object`.
///
/// Deserialisation goes through [`JsonSchema::from_value`], so a schema read
/// back from storage passes the same checks as one typed into the editor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct JsonSchema {
    #[serde(rename = "type")]
    pub kind: RootKind,
    pub properties: IndexMap<String, SchemaProperty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct RawSchema {
    #[serde(rename = "type")]
    kind: RootKind,
    properties: IndexMap<String, SchemaProperty>,
    #[serde(default)]
    required: Option<Vec<String>>,
}

impl TryFrom<Value> for JsonSchema {
    type Error = ExtractError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl JsonSchema {
    /// Accept a schema from user input or storage.
    ///
    /// Runs [`is_valid_json_schema`], deserialises, and rejects `required`
    /// entries that name no sibling property.
    pub fn from_value(value: Value) -> Result<Self, ExtractError> {
        if !is_valid_json_schema(&value) {
            return Err(ExtractError::InvalidSchema(
                "expected {\"type\": \"object\", \"properties\": {...}}".into(),
            ));
        }
        let raw: RawSchema = serde_json::from_value(value)
            .map_err(|e| ExtractError::InvalidSchema(e.to_string()))?;
        let schema = JsonSchema {
            kind: raw.kind,
            properties: raw.properties,
            required: raw.required,
        };
        check_required(&schema.properties, schema.required.as_deref(), "")?;
        Ok(schema)
    }

    /// Parse schema text typed into the editor.
    pub fn from_json_str(text: &str) -> Result<Self, ExtractError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ExtractError::InvalidSchema(e.to_string()))?;
        Self::from_value(value)
    }

    /// Pretty-printed schema text (two-space indent).
    pub fn to_pretty_string(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// View the root as an object property so validators can recurse uniformly.
    pub fn as_property(&self) -> SchemaProperty {
        SchemaProperty {
            kind: PropertyKind::Object,
            properties: Some(self.properties.clone()),
            required: self.required.clone(),
            ..Default::default()
        }
    }
}

fn check_required(
    properties: &IndexMap<String, SchemaProperty>,
    required: Option<&[String]>,
    prefix: &str,
) -> Result<(), ExtractError> {
    for name in required.unwrap_or_default() {
        if !properties.contains_key(name) {
            return Err(ExtractError::InvalidSchema(format!(
                "required field '{}{}' is not declared in properties",
                prefix, name
            )));
        }
    }
    for (name, prop) in properties {
        let path = format!("{prefix}{name}.");
        if let Some(children) = &prop.properties {
            check_required(children, prop.required.as_deref(), &path)?;
        }
        if let Some(items) = &prop.items {
            if let Some(children) = &items.properties {
                check_required(children, items.required.as_deref(), &path)?;
            }
        }
    }
    Ok(())
}

/// Minimal sanity check applied before a schema is accepted from the editor
/// or a saved prompt: an object with `type: "object"` and an object-valued
/// `properties`.
pub fn is_valid_json_schema(candidate: &Value) -> bool {
    let Some(obj) = candidate.as_object() else {
        return false;
    };
    if obj.get("type").and_then(Value::as_str) != Some("object") {
        return false;
    }
    matches!(obj.get("properties"), Some(Value::Object(_)))
}

/// Starter schema offered when a new prompt is created.
pub fn default_schema() -> JsonSchema {
    let mut properties = IndexMap::new();
    properties.insert(
        "field1".to_string(),
        SchemaProperty::of(PropertyKind::String).with_description("Example text field"),
    );
    properties.insert(
        "field2".to_string(),
        SchemaProperty::of(PropertyKind::Number).with_description("Example number field"),
    );
    JsonSchema {
        kind: RootKind::Object,
        properties,
        required: Some(vec!["field1".to_string()]),
    }
}

/// Look up the property addressed by a dot-path, descending through nested
/// objects only.
pub fn property_at_path<'a>(schema: &'a JsonSchema, path: &str) -> Option<&'a SchemaProperty> {
    let mut current = &schema.properties;
    let mut segments = path.split('.').peekable();
    while let Some(key) = segments.next() {
        let prop = current.get(key)?;
        if segments.peek().is_none() {
            return Some(prop);
        }
        current = prop.properties.as_ref()?;
    }
    None
}

/// Flatten a schema into `(dot-path, leaf property)` pairs, recursing into
/// structured objects. Arrays are leaves.
pub fn flatten_schema(schema: &JsonSchema) -> Vec<(String, &SchemaProperty)> {
    let mut out = Vec::new();
    flatten_into(&schema.properties, "", &mut out);
    out
}

fn flatten_into<'a>(
    properties: &'a IndexMap<String, SchemaProperty>,
    prefix: &str,
    out: &mut Vec<(String, &'a SchemaProperty)>,
) {
    for (key, prop) in properties {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match &prop.properties {
            Some(children) if prop.kind == PropertyKind::Object => {
                flatten_into(children, &path, out)
            }
            _ => out.push((path, prop)),
        }
    }
}

/// Placeholder value for a freshly added field of the given property.
pub fn example_value(prop: &SchemaProperty) -> Value {
    match prop.kind {
        PropertyKind::String => Value::String("example".into()),
        PropertyKind::Number | PropertyKind::Integer => Value::from(0),
        PropertyKind::Boolean => Value::Bool(false),
        PropertyKind::Array => Value::Array(Vec::new()),
        PropertyKind::Object => Value::Object(serde_json::Map::new()),
        PropertyKind::Null => Value::Null,
    }
}
