//! Validation of structured reasoning responses.

use crate::errors::MalformedResponseError;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*\s*\n(.*?)\n?\s*```\s*$")
            .unwrap_or_else(|_| unreachable!("fence pattern is a valid regex"))
    })
}

/// Strips a surrounding Markdown code fence, if present.
#[must_use]
pub fn extract_json(raw: &str) -> &str {
    match fence_pattern().captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => raw.trim(),
    }
}

/// Parses a response that must be a JSON object of shape `T`.
///
/// # Errors
///
/// Returns `MalformedResponseError` if the text is not JSON, is not an object,
/// or does not match `T` (including missing required fields).
pub fn parse_structured<T: DeserializeOwned>(
    raw: &str,
    source_name: &str,
) -> Result<T, MalformedResponseError> {
    let body = extract_json(raw);
    if body.is_empty() {
        return Err(MalformedResponseError::new(source_name, "response was empty"));
    }

    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| MalformedResponseError::new(source_name, format!("not valid JSON: {e}")))?;

    if !value.is_object() {
        return Err(MalformedResponseError::new(
            source_name,
            "expected a JSON object at the top level",
        ));
    }

    // Deserialize from the text so that object key order is preserved.
    serde_json::from_str(body).map_err(|e| MalformedResponseError::new(source_name, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Shape {
        answer: String,
    }

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_extract_json_fenced() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json(raw), "{\"a\": 1}");

        let bare = "```\n{\"b\": 2}\n```\n";
        assert_eq!(extract_json(bare), "{\"b\": 2}");
    }

    #[test]
    fn test_parse_structured_ok() {
        let shape: Shape = parse_structured("{\"answer\": \"42\"}", "test").unwrap();
        assert_eq!(shape.answer, "42");
    }

    #[test]
    fn test_parse_structured_rejects_non_json() {
        let err = parse_structured::<Shape>("sure, here you go", "selector").unwrap_err();
        assert_eq!(err.source_name, "selector");
        assert!(err.message.contains("not valid JSON"));
    }

    #[test]
    fn test_parse_structured_rejects_non_object() {
        let err = parse_structured::<Shape>("[1, 2]", "selector").unwrap_err();
        assert!(err.message.contains("object"));
    }

    #[test]
    fn test_parse_structured_rejects_missing_field() {
        let err = parse_structured::<Shape>("{\"other\": 1}", "modifier").unwrap_err();
        assert!(err.message.contains("answer"));
    }

    #[test]
    fn test_parse_structured_rejects_empty() {
        assert!(parse_structured::<Shape>("   ", "planner").is_err());
    }
}
