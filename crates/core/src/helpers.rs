//! Helper functions for text and column-name processing.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

// Timestamp value shapes: ISO 8601 dates/datetimes and epoch seconds/millis
static ISO_TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}([T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:?\d{2})?)?$")
        .unwrap()
});
static EPOCH_TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{10,13}$").unwrap());

/// Clean text by normalizing line endings and trimming trailing whitespace.
pub fn clean_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim()
        .to_string()
}

/// Normalize a column name for synonym matching: lowercase, letters and
/// digits only. "Conversation ID", "conversation_id" and "conversationId"
/// all normalize to "conversationid".
pub fn normalize_column_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Render a cell as text. Nulls become empty strings; non-string values
/// use their compact JSON form.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether a cell looks like a timestamp (ISO 8601 or epoch seconds/millis).
pub fn looks_like_timestamp(value: &Value) -> bool {
    match value {
        Value::Number(_) => EPOCH_TIMESTAMP_RE.is_match(&value.to_string()),
        Value::String(s) => {
            let s = s.trim();
            ISO_TIMESTAMP_RE.is_match(s) || EPOCH_TIMESTAMP_RE.is_match(s)
        }
        _ => false,
    }
}
