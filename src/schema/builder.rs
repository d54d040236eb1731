//! Structural field tree ⇄ JSON Schema conversion, and the schema editor.
//!
//! A [`Field`] is one row in the builder: a name, a required flag, a
//! property descriptor stripped of its nested structure, and a [`FieldNode`]
//! that carries the nested rows for objects and arrays of objects.
//!
//! ## Round trip
//!
//! For any schema produced by [`fields_to_schema`] whose field names are all
//! non-empty, `fields_to_schema(&parse_schema_to_fields(&s)) == s`. Fields
//! with blank names are dropped on serialisation; this is how a freshly added
//! but not yet named row stays out of the schema.
//!
//! ## Editing
//!
//! [`SchemaEditor`] owns the field tree as its single source of truth. The
//! schema and its pretty-printed text are derived on demand, and a raw text
//! edit is applied by re-parsing into a new tree. Every change goes through
//! one [`SchemaCommand`], so there is no second copy to keep in sync.

use super::{JsonSchema, PropertyKind, RootKind, SchemaProperty};
use crate::error::ExtractError;
use indexmap::IndexMap;
use tracing::debug;

/// One named property in the builder tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    /// Descriptor without `properties`/`required`; for arrays of objects the
    /// `items` descriptor is likewise stripped.
    pub property: SchemaProperty,
    pub required: bool,
    pub node: FieldNode,
}

/// Nested structure of a field.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldNode {
    #[default]
    Leaf,
    /// An object with its own child properties.
    Object { children: Vec<Field> },
    /// An array whose items are objects with their own properties.
    Array { item_fields: Vec<Field> },
}

impl Field {
    /// A blank `string` row, as appended by "add field".
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            property: SchemaProperty::of(PropertyKind::String),
            required: false,
            node: FieldNode::Leaf,
        }
    }

    pub fn leaf(name: impl Into<String>, property: SchemaProperty) -> Self {
        Self {
            name: name.into(),
            property,
            required: false,
            node: FieldNode::Leaf,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Nested rows of this field, if it has any.
    pub fn children(&self) -> Option<&Vec<Field>> {
        match &self.node {
            FieldNode::Leaf => None,
            FieldNode::Object { children } => Some(children),
            FieldNode::Array { item_fields } => Some(item_fields),
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<Field>> {
        match &mut self.node {
            FieldNode::Leaf => None,
            FieldNode::Object { children } => Some(children),
            FieldNode::Array { item_fields } => Some(item_fields),
        }
    }
}

// ── Schema → fields ──────────────────────────────────────────────────────────

/// Derive the field tree of a root schema.
pub fn parse_schema_to_fields(schema: &JsonSchema) -> Vec<Field> {
    parse_properties(&schema.properties, schema.required.as_deref().unwrap_or_default())
}

fn parse_properties(properties: &IndexMap<String, SchemaProperty>, required: &[String]) -> Vec<Field> {
    properties
        .iter()
        .map(|(name, prop)| parse_property(name, prop, required.contains(name)))
        .collect()
}

fn parse_property(name: &str, prop: &SchemaProperty, required: bool) -> Field {
    let mut property = prop.clone();
    let mut node = FieldNode::Leaf;

    if prop.kind == PropertyKind::Object {
        if let Some(children) = &prop.properties {
            node = FieldNode::Object {
                children: parse_properties(children, prop.required.as_deref().unwrap_or_default()),
            };
            property.properties = None;
            property.required = None;
        }
    }

    if let Some(items) = prop.object_items() {
        let item_props = items.properties.as_ref().map(|p| {
            parse_properties(p, items.required.as_deref().unwrap_or_default())
        });
        node = FieldNode::Array {
            item_fields: item_props.unwrap_or_default(),
        };
        let mut clean_items = items.clone();
        clean_items.properties = None;
        clean_items.required = None;
        property.items = Some(Box::new(clean_items));
    }

    Field {
        name: name.to_string(),
        property,
        required,
        node,
    }
}

// ── Fields → schema ──────────────────────────────────────────────────────────

/// Serialise a field tree back into a root schema. Blank-named fields are
/// skipped; `required` is omitted when empty.
pub fn fields_to_schema(fields: &[Field]) -> JsonSchema {
    let (properties, required) = fields_to_properties(fields);
    JsonSchema {
        kind: RootKind::Object,
        properties,
        required: non_empty(required),
    }
}

fn fields_to_properties(fields: &[Field]) -> (IndexMap<String, SchemaProperty>, Vec<String>) {
    let mut properties = IndexMap::new();
    let mut required = Vec::new();

    for field in fields {
        let name = field.name.trim();
        if name.is_empty() {
            continue;
        }
        let mut property = field.property.clone();

        match (&field.node, property.kind) {
            (FieldNode::Object { children }, PropertyKind::Object) => {
                let (props, req) = fields_to_properties(children);
                property.properties = Some(props);
                property.required = non_empty(req);
            }
            (FieldNode::Array { item_fields }, PropertyKind::Array) => {
                let (props, req) = fields_to_properties(item_fields);
                let mut items = property
                    .items
                    .take()
                    .map(|b| *b)
                    .unwrap_or_else(|| SchemaProperty::of(PropertyKind::Object));
                items.kind = PropertyKind::Object;
                items.properties = Some(props);
                items.required = non_empty(req);
                property.items = Some(Box::new(items));
            }
            _ => {}
        }

        if field.required {
            required.push(name.to_string());
        }
        properties.insert(name.to_string(), property);
    }

    (properties, required)
}

fn non_empty(v: Vec<String>) -> Option<Vec<String>> {
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

// ── Editor ───────────────────────────────────────────────────────────────────

/// A single edit to the builder state.
///
/// Paths are index sequences: `[2]` is the third top-level field, `[2, 0]` is
/// the first child (or item field) of that field.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaCommand {
    /// Append a blank row under `parent` (empty path = root).
    AddField { parent: Vec<usize> },
    /// Remove the row at `path`.
    RemoveField { path: Vec<usize> },
    /// Replace the row at `path`.
    UpdateField { path: Vec<usize>, field: Field },
    /// Replace the whole tree from raw schema text.
    ReplaceText(String),
}

/// Builder state for one prompt's schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaEditor {
    fields: Vec<Field>,
}

impl SchemaEditor {
    pub fn new(schema: &JsonSchema) -> Self {
        Self {
            fields: parse_schema_to_fields(schema),
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The schema as currently described by the field tree.
    pub fn schema(&self) -> JsonSchema {
        fields_to_schema(&self.fields)
    }

    /// The schema as editable JSON text.
    pub fn text(&self) -> String {
        self.schema().to_pretty_string()
    }

    /// Apply one command and return the resulting schema.
    ///
    /// A failing command leaves the editor untouched.
    pub fn apply(&mut self, command: SchemaCommand) -> Result<JsonSchema, ExtractError> {
        debug!(?command, "Applying schema command");
        match command {
            SchemaCommand::AddField { parent } => {
                let siblings = if parent.is_empty() {
                    &mut self.fields
                } else {
                    let field = field_at_mut(&mut self.fields, &parent)?;
                    ensure_container(field, &parent)?
                };
                siblings.push(Field::empty());
            }
            SchemaCommand::RemoveField { path } => {
                let (siblings, index) = siblings_of(&mut self.fields, &path)?;
                siblings.remove(index);
            }
            SchemaCommand::UpdateField { path, field } => {
                let (siblings, index) = siblings_of(&mut self.fields, &path)?;
                let name = field.name.trim();
                let taken = !name.is_empty()
                    && siblings
                        .iter()
                        .enumerate()
                        .any(|(i, other)| i != index && other.name.trim() == name);
                if taken {
                    return Err(ExtractError::InvalidSchema(format!("duplicate field name '{name}'")));
                }
                if let Some(children) = field.children() {
                    check_unique_names(children)?;
                }
                siblings[index] = field;
            }
            SchemaCommand::ReplaceText(text) => {
                let schema = JsonSchema::from_json_str(&text)?;
                self.fields = parse_schema_to_fields(&schema);
            }
        }
        Ok(self.schema())
    }
}

fn path_error(path: &[usize], reason: &str) -> ExtractError {
    ExtractError::InvalidPath {
        path: format!("{path:?}"),
        reason: reason.to_string(),
    }
}

fn check_unique_names(fields: &[Field]) -> Result<(), ExtractError> {
    let mut seen = std::collections::HashSet::new();
    for field in fields {
        let name = field.name.trim();
        if !name.is_empty() && !seen.insert(name) {
            return Err(ExtractError::InvalidSchema(format!("duplicate field name '{name}'")));
        }
        if let Some(children) = field.children() {
            check_unique_names(children)?;
        }
    }
    Ok(())
}

fn field_at_mut<'a>(fields: &'a mut Vec<Field>, path: &[usize]) -> Result<&'a mut Field, ExtractError> {
    let (siblings, index) = siblings_of(fields, path)?;
    Ok(&mut siblings[index])
}

/// Resolve the sibling list containing `path` and the index within it.
fn siblings_of<'a>(
    fields: &'a mut Vec<Field>,
    path: &[usize],
) -> Result<(&'a mut Vec<Field>, usize), ExtractError> {
    let Some((&last, parents)) = path.split_last() else {
        return Err(path_error(path, "empty field path"));
    };
    let mut current = fields;
    for &i in parents {
        current = current
            .get_mut(i)
            .and_then(Field::children_mut)
            .ok_or_else(|| path_error(path, "no nested fields at this position"))?;
    }
    if last >= current.len() {
        return Err(path_error(path, "index out of range"));
    }
    Ok((current, last))
}

/// Children list of an object or array field, promoting a leaf of the right
/// kind into a container on first use.
fn ensure_container<'a>(field: &'a mut Field, path: &[usize]) -> Result<&'a mut Vec<Field>, ExtractError> {
    if matches!(field.node, FieldNode::Leaf) {
        field.node = match field.property.kind {
            PropertyKind::Object => FieldNode::Object { children: Vec::new() },
            PropertyKind::Array => {
                field.property.items = Some(Box::new(SchemaProperty::of(PropertyKind::Object)));
                FieldNode::Array { item_fields: Vec::new() }
            }
            _ => return Err(path_error(path, "only object and array fields can have nested fields")),
        };
    }
    field
        .children_mut()
        .ok_or_else(|| path_error(path, "field has no nested fields"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(v: serde_json::Value) -> JsonSchema {
        JsonSchema::from_value(v).expect("valid schema")
    }

    fn nested_schema() -> JsonSchema {
        schema(json!({
            "type": "object",
            "properties": {
                "invoice_number": {"type": "string", "description": "Number on the header"},
                "total": {"type": "number", "minimum": 0},
                "customer": {
                    "type": "object",
                    "description": "Billed party",
                    "properties": {
                        "name": {"type": "string", "maxLength": 80},
                        "vat_id": {"type": "string"}
                    },
                    "required": ["name"]
                },
                "line_items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "sku": {"type": "string"},
                            "qty": {"type": "integer"}
                        },
                        "required": ["sku"]
                    }
                },
                "tags": {"type": "array", "items": {"type": "string"}},
                "status": {"type": "string", "enum": ["paid", "open"]}
            },
            "required": ["invoice_number", "total"]
        }))
    }

    #[test]
    fn round_trip_is_identity_for_named_fields() {
        let s = nested_schema();
        let back = fields_to_schema(&parse_schema_to_fields(&s));
        assert_eq!(back, s);
        assert_eq!(back.to_value(), s.to_value());
    }

    #[test]
    fn parse_builds_tagged_tree() {
        let fields = parse_schema_to_fields(&nested_schema());
        assert_eq!(fields.len(), 6);
        assert!(fields[0].required);
        assert!(!fields[2].required);

        let FieldNode::Object { children } = &fields[2].node else {
            panic!("customer should be an object node");
        };
        assert_eq!(children[0].name, "name");
        assert!(children[0].required);
        assert!(fields[2].property.properties.is_none());
        assert!(fields[2].property.required.is_none());

        let FieldNode::Array { item_fields } = &fields[3].node else {
            panic!("line_items should be an array node");
        };
        assert_eq!(item_fields.len(), 2);
        assert!(fields[3].property.items.as_ref().unwrap().properties.is_none());

        // array of primitives stays a leaf
        assert_eq!(fields[4].node, FieldNode::Leaf);
    }

    #[test]
    fn blank_names_are_dropped() {
        let mut fields = parse_schema_to_fields(&nested_schema());
        fields.push(Field::empty().required());
        let s = fields_to_schema(&fields);
        assert_eq!(s.properties.len(), 6);
        assert_eq!(
            s.required,
            Some(vec!["invoice_number".to_string(), "total".to_string()])
        );
    }

    #[test]
    fn empty_required_is_omitted() {
        let s = fields_to_schema(&[Field::leaf("a", SchemaProperty::of(PropertyKind::String))]);
        assert!(s.required.is_none());
        assert_eq!(s.to_value(), json!({"type": "object", "properties": {"a": {"type": "string"}}}));
    }

    #[test]
    fn editor_add_then_name_field() {
        let mut editor = SchemaEditor::new(&super::super::default_schema());
        let s = editor.apply(SchemaCommand::AddField { parent: vec![] }).unwrap();
        // blank row not yet part of the schema
        assert_eq!(s.properties.len(), 2);
        assert_eq!(editor.fields().len(), 3);

        let named = Field::leaf("due_date", SchemaProperty {
            kind: PropertyKind::String,
            format: Some("date".into()),
            ..Default::default()
        });
        let s = editor
            .apply(SchemaCommand::UpdateField { path: vec![2], field: named })
            .unwrap();
        let keys: Vec<&str> = s.properties.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["field1", "field2", "due_date"]);
    }

    #[test]
    fn editor_rejects_duplicate_names() {
        let mut editor = SchemaEditor::new(&super::super::default_schema());
        editor.apply(SchemaCommand::AddField { parent: vec![] }).unwrap();
        let before = editor.schema();

        let clash = Field::leaf("field1", SchemaProperty::of(PropertyKind::Number)).required();
        let err = editor
            .apply(SchemaCommand::UpdateField { path: vec![2], field: clash })
            .unwrap_err();
        assert!(err.to_string().contains("field1"), "got: {err}");
        assert_eq!(editor.schema(), before);
        assert_eq!(editor.schema().required, Some(vec!["field1".to_string()]));

        // renaming a field to its own name is fine
        let same = Field::leaf(" field2 ", SchemaProperty::of(PropertyKind::String));
        editor
            .apply(SchemaCommand::UpdateField { path: vec![1], field: same })
            .unwrap();

        let mut parent = Field::leaf("meta", SchemaProperty::of(PropertyKind::Object));
        parent.node = FieldNode::Object {
            children: vec![
                Field::leaf("a", SchemaProperty::of(PropertyKind::String)),
                Field::leaf("a", SchemaProperty::of(PropertyKind::String)),
            ],
        };
        assert!(editor
            .apply(SchemaCommand::UpdateField { path: vec![2], field: parent })
            .is_err());
    }

    #[test]
    fn editor_adds_nested_field_to_object_leaf() {
        let mut editor = SchemaEditor::new(&schema(json!({
            "type": "object",
            "properties": {"address": {"type": "object"}}
        })));
        editor.apply(SchemaCommand::AddField { parent: vec![0] }).unwrap();
        let s = editor
            .apply(SchemaCommand::UpdateField {
                path: vec![0, 0],
                field: Field::leaf("city", SchemaProperty::of(PropertyKind::String)),
            })
            .unwrap();
        assert_eq!(
            s.to_value(),
            json!({"type": "object", "properties": {
                "address": {"type": "object", "properties": {"city": {"type": "string"}}}
            }})
        );
    }

    #[test]
    fn editor_rejects_nesting_under_primitive() {
        let mut editor = SchemaEditor::new(&super::super::default_schema());
        let err = editor.apply(SchemaCommand::AddField { parent: vec![0] }).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPath { .. }));
        assert_eq!(editor.schema(), super::super::default_schema());
    }

    #[test]
    fn editor_remove_nested_item_field() {
        let mut editor = SchemaEditor::new(&nested_schema());
        let s = editor.apply(SchemaCommand::RemoveField { path: vec![3, 0] }).unwrap();
        let items = s.properties["line_items"].items.as_ref().unwrap();
        let props = items.properties.as_ref().unwrap();
        assert_eq!(props.keys().collect::<Vec<_>>(), vec!["qty"]);
        assert!(items.required.is_none());
    }

    #[test]
    fn invalid_text_leaves_editor_unchanged() {
        let mut editor = SchemaEditor::new(&nested_schema());
        let before = editor.text();
        assert!(editor.apply(SchemaCommand::ReplaceText("{not json".into())).is_err());
        assert!(editor
            .apply(SchemaCommand::ReplaceText(r#"{"type":"array","properties":{}}"#.into()))
            .is_err());
        assert_eq!(editor.text(), before);
    }

    #[test]
    fn text_edit_rederives_tree() {
        let mut editor = SchemaEditor::new(&super::super::default_schema());
        let s = editor
            .apply(SchemaCommand::ReplaceText(
                r#"{"type":"object","properties":{"x":{"type":"boolean"}},"required":["x"]}"#.into(),
            ))
            .unwrap();
        assert_eq!(editor.fields().len(), 1);
        assert!(editor.fields()[0].required);
        assert_eq!(s.required, Some(vec!["x".to_string()]));
    }

    #[test]
    fn out_of_range_path_is_an_error() {
        let mut editor = SchemaEditor::new(&super::super::default_schema());
        assert!(editor.apply(SchemaCommand::RemoveField { path: vec![9] }).is_err());
        assert!(editor.apply(SchemaCommand::RemoveField { path: vec![] }).is_err());
    }
}
