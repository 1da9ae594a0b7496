//! Conversion between domain types and provider wire formats

pub mod google;
pub mod openai;

use serde_json::{Map, Value};

/// Decode streamed tool arguments
///
/// Empty input means no arguments. Malformed JSON is kept as a raw string so
/// the handler can report it.
pub fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Map::new());
    }

    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "tool call arguments are not valid JSON");
        Value::String(raw.to_owned())
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn arguments_parse_or_stay_raw() {
        assert_eq!(parse_arguments(""), json!({}));
        assert_eq!(parse_arguments("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_arguments("{\"a\":"), json!("{\"a\":"));
    }
}
