//! Plain-text answers out of chat responses.

use serde_json::{Map, Value};

use crate::llm::ChatResponse;

/// Keys tried, in order, when a response is a keyed object.
const TEXT_KEYS: [&str; 3] = ["response", "text", "content"];

/// Normalize a chat response to a single text value.
///
/// Objects are searched for `message.content`, then `response`, `text` and
/// `content`. Empty fields are skipped. When nothing matches, the JSON
/// rendering of the response is returned so the checker still sees something.
pub fn extract_answer(response: &ChatResponse) -> String {
    match response {
        ChatResponse::Text(text) => text.clone(),
        ChatResponse::Object(map) => {
            text_field(map).unwrap_or_else(|| Value::Object(map.clone()).to_string())
        }
        ChatResponse::Other(value) => value.to_string(),
    }
}

fn text_field(map: &Map<String, Value>) -> Option<String> {
    let message_content = map
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());

    message_content
        .or_else(|| {
            TEXT_KEYS.iter().find_map(|key| {
                map.get(*key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
            })
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> ChatResponse {
        ChatResponse::from(value)
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(extract_answer(&ChatResponse::from("45")), "45");
    }

    #[test]
    fn test_ollama_message_shape() {
        let response = object(json!({
            "model": "etch:7b",
            "message": {"role": "assistant", "content": "The answer is 45."},
            "done": true
        }));
        assert_eq!(extract_answer(&response), "The answer is 45.");
    }

    #[test]
    fn test_generate_shape() {
        let response = object(json!({"response": "Paris", "done": true}));
        assert_eq!(extract_answer(&response), "Paris");
    }

    #[test]
    fn test_empty_message_falls_through() {
        let response = object(json!({"message": {"content": ""}, "text": "green"}));
        assert_eq!(extract_answer(&response), "green");
    }

    #[test]
    fn test_unknown_object_renders_json() {
        let response = object(json!({"value": 45}));
        assert_eq!(extract_answer(&response), r#"{"value":45}"#);
    }

    #[test]
    fn test_other_shape_renders() {
        assert_eq!(extract_answer(&object(json!(45))), "45");
    }
}
