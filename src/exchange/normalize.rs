//! Reply normalization.
//!
//! Backend versions disagree on where the answer lives (`response`,
//! `message`, `content`, `text`, ...).  [`ReplyNormalizer`] checks a
//! configured list of keys in order and otherwise shows the whole JSON
//! document.

use serde_json::Value;

/// Turns a parsed reply payload into one display string.
#[derive(Debug, Clone)]
pub struct ReplyNormalizer {
    fields: Vec<String>,
}

impl ReplyNormalizer {
    /// `fields` are tried in order; the first populated one wins.
    pub fn new(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Normalize `payload`.
    ///
    /// A field is populated unless it is `null`, `false`, or an empty
    /// string.  String values are used verbatim, anything else is rendered
    /// as compact JSON.  When no field is populated (or the payload is not
    /// an object) the whole payload is serialized.
    ///
    /// ```
    /// use kani_assistant::exchange::ReplyNormalizer;
    /// use serde_json::json;
    ///
    /// let n = ReplyNormalizer::new(["response", "message", "content"]);
    /// assert_eq!(n.normalize(&json!({"message": "hi"})), "hi");
    /// assert_eq!(n.normalize(&json!({"other": 1})), r#"{"other":1}"#);
    /// ```
    pub fn normalize(&self, payload: &Value) -> String {
        self.fields
            .iter()
            .filter_map(|field| payload.get(field))
            .find(|value| is_populated(value))
            .map(render)
            .unwrap_or_else(|| payload.to_string())
    }
}

fn is_populated(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
