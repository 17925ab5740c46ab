//! Normalization of provider replies to plain text.
//!
//! Chat-completion style backends answer with an object carrying
//! `choices[0].message.content`; simpler gateways answer with a bare string.
//! Both collapse to one `String` here, before any parsing happens.

use anyhow::{Result, anyhow};
use serde_json::Value;

/// Extract the reply text from a decoded provider response.
pub fn extract_reply_text(reply: &Value) -> Result<String> {
    match reply {
        Value::String(text) => Ok(text.clone()),
        Value::Object(_) => reply
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("Reply has no choices[0].message.content")),
        other => Err(anyhow!("Unsupported reply shape: {}", kind(other))),
    }
}

/// Extract the reply text from a raw HTTP body.
///
/// Bodies that are not JSON at all are taken verbatim as a bare-string reply.
pub fn extract_reply_body(body: &str) -> Result<String> {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => extract_reply_text(&value),
        Err(_) => Ok(body.to_owned()),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structured_reply() {
        let reply = json!({
            "choices": [{"message": {"role": "assistant", "content": "billing"}}]
        });
        assert_eq!(extract_reply_text(&reply).unwrap(), "billing");
    }

    #[test]
    fn test_bare_string_reply() {
        assert_eq!(extract_reply_text(&json!("usage")).unwrap(), "usage");
    }

    #[test]
    fn test_missing_content_is_error() {
        assert!(extract_reply_text(&json!({"choices": []})).is_err());
        assert!(extract_reply_text(&json!({"choices": [{"message": null}]})).is_err());
        assert!(extract_reply_text(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_plain_text_body() {
        assert_eq!(extract_reply_body("support").unwrap(), "support");
        assert_eq!(
            extract_reply_body(r#"{"choices":[{"message":{"content":"other"}}]}"#).unwrap(),
            "other"
        );
    }
}
