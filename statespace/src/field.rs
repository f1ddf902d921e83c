//! Single-field setters
//!
//! A [`FieldSetter`] writes one key of an object space. Values shaped like
//! UI change events (an object with a `target` object) are reduced to the
//! value the event carries before they are stored.

use crate::error::Result;
use crate::notify::action_label;
use crate::patch::{Input, Patch};
use crate::space::Space;
use serde_json::Value;

/// Setter for one key of an object space
#[derive(Debug, Clone)]
pub struct FieldSetter {
    space: Space,
    key: String,
}

impl FieldSetter {
    pub(crate) fn new(space: Space, key: String) -> Self {
        Self { space, key }
    }

    /// The key this setter writes
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Cause label of every write, `#set:<key>`
    pub fn label(&self) -> String {
        action_label(&format!("set:{}", self.key))
    }

    /// Write the field, returning the new version of the space
    ///
    /// `null` deletes the key.
    pub fn set(&self, value: impl Into<Value>) -> Result<Space> {
        let value = coerce(value.into());
        let patch = Patch::field(self.key.clone(), Input::Value(value));
        self.space.update_as(patch, &format!("set:{}", self.key))
    }
}

/// Reduce an event-shaped value to the value it carries
///
/// - `checkbox` targets yield `target.checked` as a boolean
/// - `number` targets yield the leading integer of `target.value`, or the
///   raw string when it does not start with digits
/// - any other target yields `target.value` as a string
///
/// Anything that is not event-shaped is returned unchanged.
pub fn coerce(value: Value) -> Value {
    let Some(target) = value.get("target").and_then(Value::as_object) else {
        return value;
    };

    let raw = target.get("value");
    match target.get("type").and_then(Value::as_str) {
        Some("checkbox") => Value::Bool(target.get("checked").map(truthy).unwrap_or(false)),
        Some("number") => {
            let text = raw.map(stringify).unwrap_or_default();
            match leading_integer(&text) {
                Some(number) => Value::from(number),
                None => Value::String(text),
            }
        }
        _ => Value::String(raw.map(stringify).unwrap_or_default()),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Null => false,
        Value::Number(n) => n.as_f64().map(|n| n != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Integer formed by the leading sign and digits of `text`
fn leading_integer(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let sign_len = usize::from(trimmed.starts_with(['-', '+']));
    let digits = trimmed[sign_len..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len() - sign_len);
    if digits == 0 {
        return None;
    }
    trimmed[..sign_len + digits].parse().ok()
}
