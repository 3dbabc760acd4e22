//! Transport options carried by a builder next to its headers.
//!
//! # Design
//! Options are a typed struct, but callers may also patch them by key with
//! JSON values (`set_option("custom.emit_progress", json!(true))`). A patch
//! is applied to the serialized form and deserialized back, so unknown keys
//! and ill-typed values are rejected by serde and the previous options stay
//! untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// Non-header options for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestOptions {
    /// Overrides the host taken from the URL.
    pub host: Option<String>,
    /// Overrides the port taken from the URL or the scheme default.
    pub port: Option<u16>,
    pub custom: CustomOptions,
}

/// Flags that shape how the response is consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CustomOptions {
    /// Resolve `perform()` with raw bytes instead of a decoded string.
    pub return_body_as_bytes: bool,
    /// Emit `Progress` events when the response declares its length.
    pub emit_progress: bool,
}

impl RequestOptions {
    /// Set one option by dotted key, e.g. `port` or `custom.emit_progress`.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), Error> {
        if key.is_empty() || key.split('.').any(str::is_empty) {
            return Err(Error::invalid_argument("key", format!("malformed option key `{key}`")));
        }
        let patch = key
            .rsplit('.')
            .fold(value, |inner, segment| {
                let mut map = Map::new();
                map.insert(segment.to_string(), inner);
                Value::Object(map)
            });
        self.merge(patch)
    }

    /// Deep-merge a JSON object into the options.
    pub fn merge(&mut self, patch: Value) -> Result<(), Error> {
        if !patch.is_object() {
            return Err(Error::invalid_argument("options", "expected a JSON object"));
        }
        let mut current = serde_json::to_value(&*self)
            .map_err(|e| Error::invalid_argument("options", e.to_string()))?;
        merge_value(&mut current, patch);
        *self = serde_json::from_value(current)
            .map_err(|e| Error::invalid_argument("options", e.to_string()))?;
        Ok(())
    }
}

fn merge_value(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(slot) if slot.is_object() && value.is_object() => merge_value(slot, value),
                    _ => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn defaults_are_off() {
        let options = RequestOptions::default();
        assert_eq!(options.port, None);
        assert!(!options.custom.return_body_as_bytes);
        assert!(!options.custom.emit_progress);
    }

    #[test]
    fn set_by_dotted_key() {
        let mut options = RequestOptions::default();
        options.set("port", json!(8080)).unwrap();
        options.set("custom.emit_progress", json!(true)).unwrap();
        assert_eq!(options.port, Some(8080));
        assert!(options.custom.emit_progress);
        assert!(!options.custom.return_body_as_bytes);
    }

    #[test]
    fn merge_keeps_sibling_flags() {
        let mut options = RequestOptions::default();
        options.set("custom.return_body_as_bytes", json!(true)).unwrap();
        options.merge(json!({ "custom": { "emit_progress": true } })).unwrap();
        assert!(options.custom.return_body_as_bytes);
        assert!(options.custom.emit_progress);
    }

    #[test]
    fn unknown_key_is_rejected_and_state_kept() {
        let mut options = RequestOptions::default();
        options.set("port", json!(81)).unwrap();
        let err = options.set("retries", json!(3)).unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
        assert_eq!(options.port, Some(81));
    }

    #[test]
    fn ill_typed_value_is_rejected() {
        let mut options = RequestOptions::default();
        assert!(options.set("port", json!("eighty")).is_err());
        assert!(options.set("port", json!(70000)).is_err());
        assert!(options.merge(json!([1, 2])).is_err());
        assert!(options.set("custom..flag", json!(true)).is_err());
        assert_eq!(options, RequestOptions::default());
    }

    #[test]
    fn loads_from_json() {
        let options: RequestOptions =
            serde_json::from_str(r#"{"host":"localhost","custom":{"emit_progress":true}}"#).unwrap();
        assert_eq!(options.host.as_deref(), Some("localhost"));
        assert!(options.custom.emit_progress);
    }
}
