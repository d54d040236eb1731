//! Validate extracted data against the schema it was extracted with.
//!
//! Draft-07 semantics for the supported keyword subset: `type`, `required`,
//! `properties`, `items`, `minimum`, `maximum`, `minLength`, `maxLength`,
//! `enum` and `format`. All violations are collected. A value of the wrong
//! type skips the type-specific keywords but is still checked against `enum`.
//!
//! Instance paths are JSON pointers (`/customer/name`, `/lines/0/qty`), with
//! `/` standing for the root. A missing required property is reported at its
//! parent's path, with the property name in `params.missingProperty`.

use super::{JsonSchema, PropertyKind, SchemaProperty};
use crate::model::FieldError;
use chrono::{DateTime, NaiveDate};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One constraint violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaViolation {
    pub instance_path: String,
    pub message: String,
    /// The keyword that failed, e.g. `type`, `required`, `minimum`.
    pub keyword: String,
    pub params: Value,
}

/// Outcome of [`validate`]. `valid` is true exactly when `errors` is empty.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<SchemaViolation>,
}

impl ValidationReport {
    /// Errors in the `{field, message}` shape stored on a result, or `None`
    /// when the data is valid.
    pub fn to_field_errors(&self) -> Option<Vec<FieldError>> {
        if self.valid {
            return None;
        }
        Some(
            self.errors
                .iter()
                .map(|e| FieldError {
                    field: e.instance_path.clone(),
                    message: e.message.clone(),
                })
                .collect(),
        )
    }
}

/// Validate `data` against a root schema.
pub fn validate(data: &Value, schema: &JsonSchema) -> ValidationReport {
    let mut errors = Vec::new();
    check_value(data, &schema.as_property(), "", &mut errors);
    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

/// Validate a single value against one property descriptor and return the
/// first message, as an inline cell editor would show it.
pub fn validate_field_value(value: &Value, property: &SchemaProperty) -> Result<(), String> {
    let mut properties = IndexMap::new();
    properties.insert("field".to_string(), property.clone());
    let wrapper = JsonSchema {
        properties,
        required: Some(vec!["field".to_string()]),
        ..Default::default()
    };
    let report = validate(&json!({ "field": value }), &wrapper);
    match report.errors.into_iter().next() {
        None => Ok(()),
        Some(e) => Err(e.message),
    }
}

// ── Core walk ────────────────────────────────────────────────────────────────

fn violation(errors: &mut Vec<SchemaViolation>, path: &str, keyword: &str, message: String, params: Value) {
    errors.push(SchemaViolation {
        instance_path: if path.is_empty() { "/".to_string() } else { path.to_string() },
        message,
        keyword: keyword.to_string(),
        params,
    });
}

fn child_path(path: &str, segment: &str) -> String {
    let escaped = segment.replace('~', "~0").replace('/', "~1");
    format!("{path}/{escaped}")
}

fn check_value(value: &Value, prop: &SchemaProperty, path: &str, errors: &mut Vec<SchemaViolation>) {
    if matches_type(value, prop.kind) {
        check_keywords(value, prop, path, errors);
    } else {
        violation(
            errors,
            path,
            "type",
            format!("must be {}", prop.kind.as_str()),
            json!({ "type": prop.kind.as_str() }),
        );
    }

    if let Some(allowed) = &prop.enum_values {
        if !allowed.contains(value) {
            violation(
                errors,
                path,
                "enum",
                "must be equal to one of the allowed values".to_string(),
                json!({ "allowedValues": allowed }),
            );
        }
    }
}

/// Keywords that only apply once the value has the declared type.
fn check_keywords(value: &Value, prop: &SchemaProperty, path: &str, errors: &mut Vec<SchemaViolation>) {
    match value {
        Value::Object(map) => {
            for name in prop.required.as_deref().unwrap_or_default() {
                if !map.contains_key(name) {
                    violation(
                        errors,
                        path,
                        "required",
                        format!("must have required property '{name}'"),
                        json!({ "missingProperty": name }),
                    );
                }
            }
            if let Some(children) = &prop.properties {
                for (key, child) in children {
                    if let Some(v) = map.get(key) {
                        check_value(v, child, &child_path(path, key), errors);
                    }
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_prop) = &prop.items {
                for (i, item) in items.iter().enumerate() {
                    check_value(item, item_prop, &child_path(path, &i.to_string()), errors);
                }
            }
        }
        Value::Number(n) => {
            if let Some(x) = n.as_f64() {
                check_bounds(x, prop, path, errors);
            }
        }
        Value::String(s) => check_string(s, prop, path, errors),
        _ => {}
    }
}

fn matches_type(value: &Value, kind: PropertyKind) -> bool {
    match kind {
        PropertyKind::String => value.is_string(),
        PropertyKind::Number => value.is_number(),
        PropertyKind::Integer => value
            .as_f64()
            .map(|x| x.is_finite() && x.fract() == 0.0)
            .unwrap_or(false),
        PropertyKind::Boolean => value.is_boolean(),
        PropertyKind::Object => value.is_object(),
        PropertyKind::Array => value.is_array(),
        PropertyKind::Null => value.is_null(),
    }
}

/// Whole limits are reported as integers (`5`, not `5.0`).
fn limit_value(limit: f64) -> Value {
    if limit.fract() == 0.0 && limit.abs() < i64::MAX as f64 {
        json!(limit as i64)
    } else {
        json!(limit)
    }
}

fn check_bounds(x: f64, prop: &SchemaProperty, path: &str, errors: &mut Vec<SchemaViolation>) {
    if let Some(min) = prop.minimum {
        if x < min {
            violation(
                errors,
                path,
                "minimum",
                format!("must be >= {min}"),
                json!({ "comparison": ">=", "limit": limit_value(min) }),
            );
        }
    }
    if let Some(max) = prop.maximum {
        if x > max {
            violation(
                errors,
                path,
                "maximum",
                format!("must be <= {max}"),
                json!({ "comparison": "<=", "limit": limit_value(max) }),
            );
        }
    }
}

fn check_string(s: &str, prop: &SchemaProperty, path: &str, errors: &mut Vec<SchemaViolation>) {
    let len = s.chars().count() as u64;
    if let Some(min) = prop.min_length {
        if len < min {
            violation(
                errors,
                path,
                "minLength",
                format!("must NOT have fewer than {min} characters"),
                json!({ "limit": min }),
            );
        }
    }
    if let Some(max) = prop.max_length {
        if len > max {
            violation(
                errors,
                path,
                "maxLength",
                format!("must NOT have more than {max} characters"),
                json!({ "limit": max }),
            );
        }
    }
    if let Some(format) = &prop.format {
        if !matches_format(s, format) {
            violation(
                errors,
                path,
                "format",
                format!("must match format \"{format}\""),
                json!({ "format": format }),
            );
        }
    }
}

// ── Formats ──────────────────────────────────────────────────────────────────

static RE_EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

static RE_URI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:[^\s]*$").unwrap());

/// Unknown formats (including numeric hints like `int32`) always match.
fn matches_format(s: &str, format: &str) -> bool {
    match format {
        "date" => NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
        "date-time" => DateTime::parse_from_rfc3339(s).is_ok(),
        "email" => RE_EMAIL.is_match(s),
        "uri" => RE_URI.is_match(s),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(v: Value) -> JsonSchema {
        JsonSchema::from_value(v).unwrap()
    }

    fn total_schema() -> JsonSchema {
        schema(json!({
            "type": "object",
            "properties": {"total": {"type": "number"}},
            "required": ["total"]
        }))
    }

    #[test]
    fn conforming_data_is_valid() {
        let report = validate(&json!({"total": 42}), &total_schema());
        assert!(report.valid);
        assert!(report.errors.is_empty());
        assert!(report.to_field_errors().is_none());
    }

    #[test]
    fn string_for_number_is_one_type_error() {
        let s = schema(json!({"type": "object", "properties": {"x": {"type": "number"}}}));
        let report = validate(&json!({"x": "5"}), &s);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        let e = &report.errors[0];
        assert_eq!(e.instance_path, "/x");
        assert_eq!(e.keyword, "type");
        assert_eq!(e.message, "must be number");
        assert_eq!(e.params, json!({"type": "number"}));
    }

    #[test]
    fn missing_required_reported_at_parent() {
        let report = validate(&json!({}), &total_schema());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].instance_path, "/");
        assert_eq!(report.errors[0].message, "must have required property 'total'");
        assert_eq!(report.errors[0].params, json!({"missingProperty": "total"}));
    }

    #[test]
    fn collects_errors_across_nesting() {
        let s = schema(json!({
            "type": "object",
            "properties": {
                "customer": {
                    "type": "object",
                    "properties": {"name": {"type": "string", "minLength": 2}, "id": {"type": "string"}},
                    "required": ["name", "id"]
                },
                "lines": {"type": "array", "items": {
                    "type": "object",
                    "properties": {"qty": {"type": "integer", "minimum": 1}}
                }}
            }
        }));
        let data = json!({
            "customer": {"name": "A"},
            "lines": [{"qty": 2}, {"qty": 0}, {"qty": 1.5}]
        });
        let report = validate(&data, &s);
        let got: Vec<(&str, &str)> = report
            .errors
            .iter()
            .map(|e| (e.instance_path.as_str(), e.keyword.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("/customer", "required"),
                ("/customer/name", "minLength"),
                ("/lines/1/qty", "minimum"),
                ("/lines/2/qty", "type"),
            ]
        );
        assert_eq!(report.errors[2].message, "must be >= 1");
        assert_eq!(report.errors[2].params, json!({"comparison": ">=", "limit": 1}));
    }

    #[test]
    fn type_mismatch_stops_deeper_checks() {
        let s = schema(json!({
            "type": "object",
            "properties": {"c": {"type": "object", "properties": {"x": {"type": "number"}}, "required": ["x"]}}
        }));
        let report = validate(&json!({"c": [1, 2]}), &s);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].message, "must be object");
    }

    #[test]
    fn enum_and_bounds() {
        let s = schema(json!({
            "type": "object",
            "properties": {
                "status": {"type": "string", "enum": ["paid", "open"]},
                "rate": {"type": "number", "maximum": 0.5}
            }
        }));
        let report = validate(&json!({"status": "void", "rate": 0.75}), &s);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].message, "must be equal to one of the allowed values");
        assert_eq!(report.errors[1].message, "must be <= 0.5");
    }

    #[test]
    fn wrong_type_is_still_checked_against_enum() {
        let s = schema(json!({
            "type": "object",
            "properties": {"status": {"type": "string", "enum": ["paid", "open"], "minLength": 2}}
        }));
        let report = validate(&json!({"status": 5}), &s);
        let keywords: Vec<&str> = report.errors.iter().map(|e| e.keyword.as_str()).collect();
        assert_eq!(keywords, vec!["type", "enum"]);
        assert!(report.errors.iter().all(|e| e.instance_path == "/status"));

        let prop = SchemaProperty {
            kind: PropertyKind::Integer,
            enum_values: Some(vec![json!(1), json!(2)]),
            ..Default::default()
        };
        assert_eq!(validate_field_value(&json!("one"), &prop).unwrap_err(), "must be integer");
        assert_eq!(
            validate_field_value(&json!(3), &prop).unwrap_err(),
            "must be equal to one of the allowed values"
        );
    }

    #[test]
    fn string_length_counts_characters() {
        let s = schema(json!({
            "type": "object",
            "properties": {"city": {"type": "string", "maxLength": 5}}
        }));
        assert!(validate(&json!({"city": "Zürich"}), &s).errors.len() == 1);
        assert!(validate(&json!({"city": "Genf"}), &s).valid);
        assert!(validate(&json!({"city": "Köln"}), &s).valid);
    }

    #[test]
    fn formats() {
        assert!(matches_format("2024-02-29", "date"));
        assert!(!matches_format("2023-02-29", "date"));
        assert!(!matches_format("29/02/2024", "date"));
        assert!(matches_format("2024-01-05T10:00:00Z", "date-time"));
        assert!(!matches_format("2024-01-05 10:00", "date-time"));
        assert!(matches_format("billing@example.com", "email"));
        assert!(!matches_format("billing at example", "email"));
        assert!(matches_format("https://example.com/a?b=c", "uri"));
        assert!(!matches_format("not a uri", "uri"));
        assert!(matches_format("anything", "int32"));
    }

    #[test]
    fn pointer_segments_are_escaped() {
        let s = schema(json!({
            "type": "object",
            "properties": {"a/b": {"type": "number"}}
        }));
        let report = validate(&json!({"a/b": "x"}), &s);
        assert_eq!(report.errors[0].instance_path, "/a~1b");
    }

    #[test]
    fn field_value_validation_returns_first_message() {
        let prop = SchemaProperty {
            kind: PropertyKind::String,
            format: Some("email".into()),
            ..Default::default()
        };
        assert!(validate_field_value(&json!("a@b.co"), &prop).is_ok());
        assert_eq!(
            validate_field_value(&json!("nope"), &prop).unwrap_err(),
            "must match format \"email\""
        );
        assert_eq!(
            validate_field_value(&json!(3), &prop).unwrap_err(),
            "must be string"
        );
    }

    #[test]
    fn field_errors_use_instance_path() {
        let report = validate(&json!({"total": "bad"}), &total_schema());
        let errs = report.to_field_errors().unwrap();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].field, "/total");
        assert_eq!(errs[0].message, "must be number");
    }
}
