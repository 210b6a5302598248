//! Human-readable failure reasons from server error bodies.
//!
//! The server answers failed requests with a `detail` field that is either
//! a string, an object, or a list of validation errors of the form
//! `{"loc": [..., "field"], "msg": "..."}`.

// Rust guideline compliant 2026-02

use serde_json::Value;

/// Reason used when neither the body nor the transport say anything useful.
pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred";

/// Build a failure reason from an error response body.
///
/// `fallback` is the transport-level message (e.g. "Request failed with
/// status code 500") and is used when the body has no `detail`.
pub fn extract_error_message(body: Option<&Value>, fallback: &str) -> String {
    match body.and_then(|b| b.get("detail")) {
        Some(Value::Array(errors)) => errors
            .iter()
            .map(validation_error)
            .collect::<Vec<_>>()
            .join(", "),
        Some(Value::String(detail)) => detail.clone(),
        Some(detail @ Value::Object(_)) => detail.to_string(),
        _ if !fallback.is_empty() => fallback.to_string(),
        _ => UNEXPECTED_ERROR.to_string(),
    }
}

fn validation_error(error: &Value) -> String {
    let msg = error.get("msg").and_then(Value::as_str);
    let field = error
        .get("loc")
        .and_then(Value::as_array)
        .and_then(|loc| loc.last())
        .map(|field| match field {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });

    match (field, msg) {
        (Some(field), Some(msg)) => format!("{field}: {msg}"),
        (_, Some(msg)) => msg.to_string(),
        _ => "Validation error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validation_errors_are_joined() {
        let body = json!({
            "detail": [
                {"loc": ["body", "message"], "msg": "field required"},
                {"loc": ["query", "limit"], "msg": "must be positive"},
                {"msg": "something else"},
                {"type": "opaque"}
            ]
        });
        assert_eq!(
            extract_error_message(Some(&body), "Request failed"),
            "message: field required, limit: must be positive, something else, Validation error"
        );
    }

    #[test]
    fn test_numeric_location_segment() {
        let body = json!({"detail": [{"loc": ["body", 0], "msg": "bad item"}]});
        assert_eq!(extract_error_message(Some(&body), ""), "0: bad item");
    }

    #[test]
    fn test_string_detail() {
        let body = json!({"detail": "Invalid token"});
        assert_eq!(extract_error_message(Some(&body), "401"), "Invalid token");
    }

    #[test]
    fn test_object_detail_is_json() {
        let body = json!({"detail": {"code": "quota"}});
        assert_eq!(
            extract_error_message(Some(&body), "429"),
            r#"{"code":"quota"}"#
        );
    }

    #[test]
    fn test_fallbacks() {
        assert_eq!(
            extract_error_message(None, "Request failed with status code 502"),
            "Request failed with status code 502"
        );
        assert_eq!(
            extract_error_message(Some(&json!({"error": "x"})), ""),
            UNEXPECTED_ERROR
        );
    }
}
