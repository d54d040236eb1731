//! Nested-value editor: path-addressed, copy-on-write edits of extracted data.
//!
//! Every mutation takes the root by reference and returns a new value, so a
//! result's stored `data` is never touched. Edits on an [`ExtractedData`]
//! produce a fresh `edited_data` snapshot built from the current effective
//! data; `data` itself only ever holds what the model returned.
//!
//! Paths are sequences of [`PathSegment`]s. The dot-path form used by column
//! keys (`line_items.0.sku`) is converted with [`parse_dot_path`].

use crate::error::ExtractError;
use crate::model::{ExtractedData, JsonObject};
use crate::schema::validator::validate;
use crate::schema::JsonSchema;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::fmt;

/// Leading float literal, the prefix a lenient number parse accepts.
static RE_LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").unwrap());

/// One step into a JSON value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => f.write_str(k),
            PathSegment::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        PathSegment::Key(s.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        PathSegment::Index(i)
    }
}

/// Split `a.b.0.c` into segments; all-digit segments become indexes.
pub fn parse_dot_path(path: &str) -> Vec<PathSegment> {
    path.split('.')
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<usize>() {
            Ok(i) if s.bytes().all(|b| b.is_ascii_digit()) => PathSegment::Index(i),
            _ => PathSegment::Key(s.to_string()),
        })
        .collect()
}

fn display_path(path: &[PathSegment]) -> String {
    path.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(".")
}

fn invalid(path: &[PathSegment], reason: impl Into<String>) -> ExtractError {
    ExtractError::InvalidPath {
        path: display_path(path),
        reason: reason.into(),
    }
}

/// Key as seen by an object; indexes address keys like `"0"`.
fn object_key(seg: &PathSegment) -> String {
    seg.to_string()
}

/// Index as seen by an array; keys must be numeric.
fn array_index(seg: &PathSegment) -> Option<usize> {
    match seg {
        PathSegment::Index(i) => Some(*i),
        PathSegment::Key(k) => k.parse().ok(),
    }
}

// ── Core operations ──────────────────────────────────────────────────────────

/// Value at `path`, or `None` when any step is missing.
pub fn get<'a>(root: &'a Value, path: &[PathSegment]) -> Option<&'a Value> {
    path.iter().try_fold(root, |current, seg| match current {
        Value::Object(map) => map.get(&object_key(seg)),
        Value::Array(items) => array_index(seg).and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Copy of `root` with `value` stored at `path`.
///
/// Missing (or null) intermediate containers are created as objects. Setting
/// an array index equal to the length appends; an index past that is an
/// error.
/// Stepping into a string, number or boolean is an error.
pub fn set(root: &Value, path: &[PathSegment], value: Value) -> Result<Value, ExtractError> {
    let mut copy = root.clone();
    set_in_place(&mut copy, path, path, value)?;
    Ok(copy)
}

fn set_in_place(
    target: &mut Value,
    full: &[PathSegment],
    rest: &[PathSegment],
    value: Value,
) -> Result<(), ExtractError> {
    let Some((seg, tail)) = rest.split_first() else {
        *target = value;
        return Ok(());
    };

    if target.is_null() {
        *target = Value::Object(Map::new());
    }

    let slot = match target {
        Value::Object(map) => map.entry(object_key(seg)).or_insert(Value::Null),
        Value::Array(items) => {
            let i = array_index(seg).ok_or_else(|| invalid(full, format!("'{seg}' is not an array index")))?;
            if i == items.len() {
                items.push(Value::Null);
            }
            let len = items.len();
            items.get_mut(i).ok_or_else(|| {
                invalid(full, format!("index {i} is past the end of an array of {len}"))
            })?
        }
        other => {
            return Err(invalid(
                full,
                format!("cannot step into {} at '{seg}'", kind_name(other)),
            ))
        }
    };
    set_in_place(slot, full, tail, value)
}

/// Copy of `root` without the key or array element at `path`.
///
/// Array elements are spliced out so later indexes shift down. Removing
/// something that is not there returns an unchanged copy.
pub fn remove(root: &Value, path: &[PathSegment]) -> Result<Value, ExtractError> {
    let Some((last, parent_path)) = path.split_last() else {
        return Err(invalid(path, "cannot remove the root"));
    };

    let mut copy = root.clone();
    if let Some(parent) = get_mut(&mut copy, parent_path) {
        match parent {
            Value::Object(map) => {
                map.shift_remove(&object_key(last));
            }
            Value::Array(items) => {
                if let Some(i) = array_index(last).filter(|i| *i < items.len()) {
                    items.remove(i);
                }
            }
            _ => {}
        }
    }
    Ok(copy)
}

fn get_mut<'a>(root: &'a mut Value, path: &[PathSegment]) -> Option<&'a mut Value> {
    path.iter().try_fold(root, |current, seg| match current {
        Value::Object(map) => map.get_mut(&object_key(seg)),
        Value::Array(items) => array_index(seg).and_then(move |i| items.get_mut(i)),
        _ => None,
    })
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Structural commands ──────────────────────────────────────────────────────

/// Add `key` with an empty string value to the object at `path`.
pub fn add_property(root: &Value, path: &[PathSegment], key: &str) -> Result<Value, ExtractError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(invalid(path, "property name is empty"));
    }
    match get(root, path) {
        Some(Value::Object(map)) if map.contains_key(key) => {
            Err(invalid(path, format!("property '{key}' already exists")))
        }
        Some(Value::Object(_)) => {
            let mut child = path.to_vec();
            child.push(PathSegment::Key(key.to_string()));
            set(root, &child, Value::String(String::new()))
        }
        Some(other) => Err(invalid(path, format!("expected an object, found {}", kind_name(other)))),
        None => Err(invalid(path, "nothing at this path")),
    }
}

/// Append an empty string to the array at `path`.
pub fn add_array_item(root: &Value, path: &[PathSegment]) -> Result<Value, ExtractError> {
    match get(root, path) {
        Some(Value::Array(items)) => {
            let mut child = path.to_vec();
            child.push(PathSegment::Index(items.len()));
            set(root, &child, Value::String(String::new()))
        }
        Some(other) => Err(invalid(path, format!("expected an array, found {}", kind_name(other)))),
        None => Err(invalid(path, "nothing at this path")),
    }
}

pub fn remove_property(root: &Value, path: &[PathSegment], key: &str) -> Result<Value, ExtractError> {
    let mut child = path.to_vec();
    child.push(PathSegment::Key(key.to_string()));
    remove(root, &child)
}

pub fn remove_array_item(root: &Value, path: &[PathSegment], index: usize) -> Result<Value, ExtractError> {
    let mut child = path.to_vec();
    child.push(PathSegment::Index(index));
    remove(root, &child)
}

// ── Primitive text edits ─────────────────────────────────────────────────────

/// Interpret freeform text as a replacement for `previous`, keeping its type.
///
/// * number: the leading numeric prefix (`"12.5 kg"` → `12.5`); no digits
///   keeps `previous`.
/// * boolean: `true/yes/1` and `false/no/0`, case-insensitive; anything
///   else keeps `previous`.
/// * everything else: the text as a string.
pub fn parse_primitive_edit(input: &str, previous: &Value) -> Value {
    match previous {
        Value::Number(_) => parse_number(input).unwrap_or_else(|| previous.clone()),
        Value::Bool(_) => match input.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Value::Bool(true),
            "false" | "no" | "0" => Value::Bool(false),
            _ => previous.clone(),
        },
        _ => Value::String(input.to_string()),
    }
}

fn parse_number(input: &str) -> Option<Value> {
    let m = RE_LEADING_NUMBER.find(input.trim_start())?;
    let n: f64 = m.as_str().parse().ok()?;
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return Some(Value::Number(Number::from(n as i64)));
    }
    Number::from_f64(n).map(Value::Number)
}

/// Display text for a value in a cell.
pub fn format_primitive(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── Result overlay ───────────────────────────────────────────────────────────

fn overlay(result: &ExtractedData, edited: Value) -> Result<ExtractedData, ExtractError> {
    let Value::Object(map) = edited else {
        return Err(ExtractError::InvalidPath {
            path: String::new(),
            reason: "edited data must stay an object".to_string(),
        });
    };
    Ok(ExtractedData {
        edited_data: Some(map),
        ..result.clone()
    })
}

fn effective_value(result: &ExtractedData) -> Value {
    Value::Object(result.effective_data().clone())
}

/// New result whose `edited_data` has `value` at `path`.
///
/// Validation errors are carried over untouched; call [`revalidate`] to
/// refresh them.
pub fn apply_edit(result: &ExtractedData, path: &[PathSegment], value: Value) -> Result<ExtractedData, ExtractError> {
    if path.is_empty() {
        return Err(invalid(path, "path is empty"));
    }
    overlay(result, set(&effective_value(result), path, value)?)
}

/// New result whose `edited_data` lacks the entry at `path`.
pub fn apply_removal(result: &ExtractedData, path: &[PathSegment]) -> Result<ExtractedData, ExtractError> {
    overlay(result, remove(&effective_value(result), path)?)
}

/// Edit one cell from text, preserving the type of the value it replaces.
pub fn edit_cell(result: &ExtractedData, dot_path: &str, input: &str) -> Result<ExtractedData, ExtractError> {
    let path = parse_dot_path(dot_path);
    let current = effective_value(result);
    let previous = get(&current, &path).cloned().unwrap_or(Value::Null);
    apply_edit(result, &path, parse_primitive_edit(input, &previous))
}

/// Recompute `validation_errors` from the effective data.
pub fn revalidate(result: &ExtractedData, schema: &JsonSchema) -> ExtractedData {
    let report = validate(&effective_value(result), schema);
    ExtractedData {
        validation_errors: report.to_field_errors(),
        ..result.clone()
    }
}

/// Discard user edits.
pub fn clear_edits(result: &ExtractedData) -> ExtractedData {
    ExtractedData {
        edited_data: None,
        ..result.clone()
    }
}

/// Convenience for callers holding a bare object.
pub fn object_at<'a>(data: &'a JsonObject, dot_path: &str) -> Option<&'a Value> {
    let path = parse_dot_path(dot_path);
    let (first, rest) = path.split_first()?;
    get(data.get(&object_key(first))?, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(dot: &str) -> Vec<PathSegment> {
        parse_dot_path(dot)
    }

    #[test]
    fn dot_paths_split_into_keys_and_indexes() {
        assert_eq!(
            parse_dot_path("items.0.sku"),
            vec![
                PathSegment::Key("items".into()),
                PathSegment::Index(0),
                PathSegment::Key("sku".into())
            ]
        );
        assert!(parse_dot_path("").is_empty());
        assert_eq!(parse_dot_path("+1"), vec![PathSegment::Key("+1".into())]);
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let root = json!({});
        let out = set(&root, &p("a.b"), json!(5)).unwrap();
        assert_eq!(out, json!({"a": {"b": 5}}));
        assert_eq!(root, json!({}));

        let removed = remove(&out, &p("a.b")).unwrap();
        assert_eq!(removed, json!({"a": {}}));
        assert_eq!(out, json!({"a": {"b": 5}}));
    }

    #[test]
    fn get_walks_objects_and_arrays() {
        let root = json!({"items": [{"sku": "A1"}, {"sku": "B2"}]});
        assert_eq!(get(&root, &p("items.1.sku")), Some(&json!("B2")));
        assert_eq!(get(&root, &p("items.5.sku")), None);
        assert_eq!(get(&root, &p("items.x")), None);
        assert_eq!(get(&root, &[]), Some(&root));
    }

    #[test]
    fn set_on_arrays_appends_only_at_the_end() {
        let root = json!({"tags": ["a"]});
        assert_eq!(set(&root, &p("tags.1"), json!("b")).unwrap(), json!({"tags": ["a", "b"]}));
        let err = set(&root, &p("tags.3"), json!("d")).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPath { .. }));
    }

    #[test]
    fn set_rejects_huge_array_index() {
        let root = json!({"tags": []});
        let err = set(&root, &p("tags.18446744073709551615"), json!("x")).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPath { .. }));
        let err = set(&root, &p("tags.1000000000000"), json!("x")).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPath { .. }));

        let result = ExtractedData::new("doc-1", json!({"tags": []}).as_object().cloned().unwrap());
        assert!(edit_cell(&result, "tags.1000000000000", "x").is_err());
        assert_eq!(edit_cell(&result, "tags.0", "x").unwrap().effective_data()["tags"], json!(["x"]));
    }

    #[test]
    fn set_refuses_to_step_into_primitives() {
        let root = json!({"total": 3});
        let err = set(&root, &p("total.currency"), json!("EUR")).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPath { .. }));
    }

    #[test]
    fn remove_splices_arrays_and_ignores_missing() {
        let root = json!({"items": [1, 2, 3], "k": "v"});
        assert_eq!(remove(&root, &p("items.1")).unwrap(), json!({"items": [1, 3], "k": "v"}));
        assert_eq!(remove(&root, &p("missing.deep")).unwrap(), root);
        assert_eq!(remove(&root, &p("items.9")).unwrap(), root);
        assert!(remove(&root, &[]).is_err());
    }

    #[test]
    fn remove_keeps_key_order() {
        let root = json!({"a": 1, "b": 2, "c": 3});
        let out = remove(&root, &p("b")).unwrap();
        let keys: Vec<_> = out.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn structural_commands() {
        let root = json!({"vendor": {"name": "ACME"}, "tags": []});
        let out = add_property(&root, &p("vendor"), "vat").unwrap();
        assert_eq!(out["vendor"]["vat"], json!(""));
        assert!(add_property(&out, &p("vendor"), "vat").is_err());
        assert!(add_property(&root, &p("tags"), "x").is_err());

        let out = add_array_item(&out, &p("tags")).unwrap();
        assert_eq!(out["tags"], json!([""]));
        let out = remove_array_item(&out, &p("tags"), 0).unwrap();
        assert_eq!(out["tags"], json!([]));
        let out = remove_property(&out, &p("vendor"), "name").unwrap();
        assert_eq!(out["vendor"], json!({"vat": ""}));
    }

    #[test]
    fn primitive_edits_preserve_type() {
        assert_eq!(parse_primitive_edit("42", &json!(1)), json!(42));
        assert_eq!(parse_primitive_edit("12.5 kg", &json!(1)), json!(12.5));
        assert_eq!(parse_primitive_edit("abc", &json!(7)), json!(7));
        assert_eq!(parse_primitive_edit("Yes", &json!(false)), json!(true));
        assert_eq!(parse_primitive_edit("0", &json!(true)), json!(false));
        assert_eq!(parse_primitive_edit("maybe", &json!(true)), json!(true));
        assert_eq!(parse_primitive_edit("42", &json!("x")), json!("42"));
        assert_eq!(parse_primitive_edit("hi", &Value::Null), json!("hi"));
    }

    #[test]
    fn formatting_primitives() {
        assert_eq!(format_primitive(&Value::Null), "null");
        assert_eq!(format_primitive(&json!(false)), "false");
        assert_eq!(format_primitive(&json!(3.5)), "3.5");
        assert_eq!(format_primitive(&json!("x")), "x");
        assert_eq!(format_primitive(&json!([1])), "[1]");
    }

    fn sample() -> ExtractedData {
        ExtractedData::new("doc-1", json!({"total": 10, "paid": false}).as_object().cloned().unwrap())
    }

    #[test]
    fn edits_layer_on_top_of_raw_data() {
        let original = sample();
        let edited = edit_cell(&original, "total", "12").unwrap();
        assert_eq!(edited.data, original.data);
        assert_eq!(edited.effective_data()["total"], json!(12));
        assert!(original.edited_data.is_none());

        // second edit starts from the previous snapshot
        let edited = edit_cell(&edited, "paid", "yes").unwrap();
        assert_eq!(edited.effective_data()["total"], json!(12));
        assert_eq!(edited.effective_data()["paid"], json!(true));
        assert_eq!(edited.data["total"], json!(10));

        assert!(clear_edits(&edited).edited_data.is_none());
    }

    #[test]
    fn empty_edit_path_is_rejected() {
        assert!(matches!(
            apply_edit(&sample(), &[], json!(1)),
            Err(ExtractError::InvalidPath { .. })
        ));
    }

    #[test]
    fn removal_produces_snapshot() {
        let out = apply_removal(&sample(), &p("paid")).unwrap();
        assert!(out.effective_data().get("paid").is_none());
        assert!(out.data.contains_key("paid"));
    }

    #[test]
    fn revalidate_reflects_edits() {
        let schema = JsonSchema::from_value(json!({
            "type": "object",
            "properties": {"total": {"type": "number"}},
            "required": ["total"]
        }))
        .unwrap();
        let edited = apply_edit(&sample(), &p("total"), json!("ten")).unwrap();
        assert!(edited.validation_errors.is_none());
        let checked = revalidate(&edited, &schema);
        let errors = checked.validation_errors.as_ref().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "/total");

        let fixed = revalidate(&edit_cell(&checked, "total", "11").unwrap(), &schema);
        // "ten" is a string, so the text edit stays a string
        assert!(fixed.validation_errors.is_some());
        let fixed = revalidate(&apply_edit(&checked, &p("total"), json!(11)).unwrap(), &schema);
        assert!(fixed.validation_errors.is_none());
    }

    #[test]
    fn object_lookup_by_dot_path() {
        let data = json!({"a": {"b": [1, 2]}}).as_object().cloned().unwrap();
        assert_eq!(object_at(&data, "a.b.1"), Some(&json!(2)));
        assert_eq!(object_at(&data, ""), None);
    }
}
