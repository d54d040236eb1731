//! Post-processing: turn the model's reply text into a JSON object.
//!
//! ## Why is post-processing necessary?
//!
//! The request sets `response_format: json_object` on providers that support
//! it and restates the contract in the prompt. Replies still drift:
//!
//! - Wrapping the object in ` ```json ... ``` ` fences
//! - Prefixing a BOM or zero-width characters
//! - Returning an array or a bare string instead of an object
//!
//! The first two are fixed here. Anything that still does not parse to an
//! object is a per-document failure; no repair beyond that is attempted.

use crate::error::DocumentError;
use crate::model::JsonObject;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Parse a model reply into a JSON object.
///
/// Rules (applied in order):
/// 1. Strip invisible Unicode (BOM, zero-width spaces)
/// 2. Strip outer code fences
/// 3. Parse; reject empty text, invalid JSON and non-object values
pub fn parse_json_object(raw: &str) -> Result<JsonObject, DocumentError> {
    let s = remove_invisible_chars(raw);
    let s = strip_code_fences(&s);
    let s = s.trim();

    if s.is_empty() {
        return Err(DocumentError::EmptyResponse);
    }

    match serde_json::from_str::<Value>(s) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(DocumentError::InvalidResponse {
            detail: format!("expected a JSON object, got {}", type_name(&other)),
        }),
        Err(e) => Err(DocumentError::InvalidResponse {
            detail: e.to_string(),
        }),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Rule 1: Strip invisible characters ───────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}

// ── Rule 2: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*\n(.*?)\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_object() {
        let obj = parse_json_object(r#"{"total": 42}"#).unwrap();
        assert_eq!(obj["total"], json!(42));
    }

    #[test]
    fn fenced_object() {
        let obj = parse_json_object("```json\n{\"a\": [1, 2]}\n```").unwrap();
        assert_eq!(obj["a"], json!([1, 2]));
        let obj = parse_json_object("```\n{\"a\": 1}\n```\n").unwrap();
        assert_eq!(obj["a"], json!(1));
    }

    #[test]
    fn bom_and_zero_width_are_ignored() {
        let obj = parse_json_object("\u{FEFF}{\"a\":\u{200B} true}").unwrap();
        assert_eq!(obj["a"], json!(true));
    }

    #[test]
    fn empty_reply_is_empty_response() {
        assert_eq!(parse_json_object("   \n"), Err(DocumentError::EmptyResponse));
        assert_eq!(parse_json_object("```json\n```"), Err(DocumentError::EmptyResponse));
    }

    #[test]
    fn non_json_is_invalid_response() {
        let err = parse_json_object("Sure! Here is the data: total=42").unwrap_err();
        assert!(matches!(err, DocumentError::InvalidResponse { .. }));
    }

    #[test]
    fn array_is_rejected() {
        let err = parse_json_object("[1, 2]").unwrap_err();
        assert_eq!(
            err,
            DocumentError::InvalidResponse {
                detail: "expected a JSON object, got an array".into()
            }
        );
    }

    #[test]
    fn key_order_is_preserved() {
        let obj = parse_json_object(r#"{"z": 1, "a": 2}"#).unwrap();
        assert_eq!(obj.keys().collect::<Vec<_>>(), vec!["z", "a"]);
    }
}
