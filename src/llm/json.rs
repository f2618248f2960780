
use serde_json::Value;

/// Finds the first well-formed JSON object or array embedded in `text`.
///
/// Models wrap payloads in code fences, preambles and trailing commentary;
/// each `{` or `[` is tried as a start position and the first one that
/// deserializes wins.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() || value.is_array() {
            return Some(value);
        }
    }

    for (start, ch) in trimmed.char_indices() {
        if ch != '{' && ch != '[' {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&trimmed[start..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            return Some(value);
        }
    }

    None
}


pub fn extract_json_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    for (start, ch) in trimmed.char_indices() {
        if ch != '{' {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&trimmed[start..]).into_iter::<Value>();
        if let Some(Ok(value @ Value::Object(_))) = stream.next() {
            return Some(value);
        }
    }
    None
}
