use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TokenError};

/// Token fields accepted from command-line flags. The token name is never a
/// field flag; it arrives positionally or inside the input file. File-supplied
/// keys are not checked against this list; the store owns full document
/// validation.
pub const SUPPORTED_KEYS: &[&str] = &[
    "cmd",
    "cmd-type",
    "concurrency-level",
    "cpus",
    "fallback-period-secs",
    "grace-period-secs",
    "health-check-url",
    "https-redirect",
    "idle-timeout-mins",
    "image",
    "max-instances",
    "mem",
    "metadata",
    "min-instances",
    "namespace",
    "owner",
    "permitted-user",
    "ports",
    "restart-backoff-factor",
    "run-as-user",
    "version",
];

/// Top-level keys holding a string-to-string mapping. Dotted flag paths assign
/// into these per sub-key instead of replacing the whole container.
pub const NESTED_KEYS: &[&str] = &["env", "metadata"];

const FLOAT_KEYS: &[&str] = &["cpus", "restart-backoff-factor"];
const INT_KEYS: &[&str] = &[
    "concurrency-level",
    "fallback-period-secs",
    "grace-period-secs",
    "idle-timeout-mins",
    "max-instances",
    "mem",
    "min-instances",
    "ports",
];
const BOOL_KEYS: &[&str] = &["https-redirect"];

pub fn is_supported_key(key: &str) -> bool {
    SUPPORTED_KEYS.contains(&key) || NESTED_KEYS.contains(&key)
}

pub fn is_nested_key(key: &str) -> bool {
    NESTED_KEYS.contains(&key)
}

/// Parses a flag-supplied scalar into the type the schema expects for the key.
/// Values under nested containers are always strings.
pub fn parse_scalar(key: &str, raw: &str) -> Result<Value> {
    if FLOAT_KEYS.contains(&key) {
        let parsed: f64 = raw
            .parse()
            .map_err(|_| TokenError::Usage(format!("--{key} must be a number, got '{raw}'")))?;
        serde_json::Number::from_f64(parsed)
            .map(Value::Number)
            .ok_or_else(|| TokenError::Usage(format!("--{key} must be a finite number")))
    } else if INT_KEYS.contains(&key) {
        let parsed: i64 = raw
            .parse()
            .map_err(|_| TokenError::Usage(format!("--{key} must be an integer, got '{raw}'")))?;
        Ok(Value::from(parsed))
    } else if BOOL_KEYS.contains(&key) {
        let parsed: bool = raw
            .parse()
            .map_err(|_| TokenError::Usage(format!("--{key} must be true or false, got '{raw}'")))?;
        Ok(Value::Bool(parsed))
    } else {
        Ok(Value::String(raw.to_string()))
    }
}

/// A token document: a named, versioned service description held by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenDocument(pub Map<String, Value>);

impl TokenDocument {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(TokenError::Usage(format!(
                "token data must be a dictionary, instead it is {}",
                render_scalar(&other)
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Top-level keys, excluding nested containers.
    pub fn scalar_keys(&self) -> impl Iterator<Item = &str> {
        self.0
            .keys()
            .map(String::as_str)
            .filter(|key| !is_nested_key(key))
    }

    /// Assigns into a nested container without clobbering sibling sub-keys.
    pub fn set_nested(&mut self, container: &str, key: &str, value: Value) {
        let entry = self
            .0
            .entry(container.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = entry {
            map.insert(key.to_string(), value);
        } else {
            let mut map = Map::new();
            map.insert(key.to_string(), value);
            *entry = Value::Object(map);
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

pub fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn scalar_flags_are_typed_per_schema() {
        assert_eq!(parse_scalar("cpus", "0.2").unwrap(), json!(0.2));
        assert_eq!(parse_scalar("mem", "256").unwrap(), json!(256));
        assert_eq!(parse_scalar("https-redirect", "true").unwrap(), json!(true));
        assert_eq!(parse_scalar("cmd", "run.sh").unwrap(), json!("run.sh"));
    }

    #[test]
    fn restart_backoff_factor_parses_as_a_float() {
        assert_eq!(
            parse_scalar("restart-backoff-factor", "1.1").unwrap(),
            json!(1.1)
        );
        assert!(is_supported_key("restart-backoff-factor"));
    }

    #[test]
    fn non_numeric_cpus_is_a_usage_error() {
        let err = parse_scalar("cpus", "lots").unwrap_err();
        assert!(matches!(err, TokenError::Usage(_)));
    }

    #[test]
    fn set_nested_preserves_sibling_keys() {
        let mut doc = TokenDocument::from_value(json!({"env": {"A": "1"}})).unwrap();
        doc.set_nested("env", "B", json!("2"));
        assert_eq!(doc.get("env"), Some(&json!({"A": "1", "B": "2"})));
    }

    #[test]
    fn non_object_document_is_rejected() {
        let err = TokenDocument::from_value(json!("foo-bar")).unwrap_err();
        assert!(err.to_string().contains("foo-bar"));
    }
}
