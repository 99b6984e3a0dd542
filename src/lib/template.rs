use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::{
    document::TokenDocument,
    error::{Result, TokenError},
};

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z0-9_-]+)\}").expect("valid placeholder regex"));

/// Template context: variables substituted into `${name}` placeholders inside
/// string-valued token fields. Never merged into the document itself.
pub type Context = BTreeMap<String, String>;

/// Assembles the context from an optional file-supplied mapping plus
/// `--context.key value` flag overrides. Overrides win per key; no conflict
/// detection is needed since the context is not the document.
pub fn build_context(file_context: Option<Context>, overrides: &[(String, String)]) -> Context {
    let mut context = file_context.unwrap_or_default();
    for (key, value) in overrides {
        context.insert(key.clone(), value.clone());
    }
    context
}

/// Parses a context file body (JSON or YAML). Anything other than a mapping of
/// strings is rejected with the offending contents in the message.
pub fn parse_context(contents: &str) -> Result<Context> {
    let value: serde_yaml::Value = serde_yaml::from_str(contents)
        .map_err(|err| TokenError::Serialization(err.to_string()))?;
    let serde_yaml::Value::Mapping(mapping) = value else {
        return Err(TokenError::Usage(format!(
            "Provided context file must evaluate to a dictionary, instead it is {}",
            contents.trim()
        )));
    };

    let mut context = Context::new();
    for (key, value) in mapping {
        let (serde_yaml::Value::String(key), serde_yaml::Value::String(value)) = (key, value)
        else {
            return Err(TokenError::Usage(
                "context entries must map string keys to string values".to_string(),
            ));
        };
        context.insert(key, value);
    }
    Ok(context)
}

/// Substitutes every `${name}` placeholder in the document's string fields,
/// recursing into nested containers. Fails on the first placeholder whose name
/// is absent from the context; a partially substituted document is never
/// returned.
pub fn expand(document: TokenDocument, context: &Context) -> Result<TokenDocument> {
    let expanded = expand_value(document.into_value(), context)?;
    TokenDocument::from_value(expanded)
}

fn expand_value(value: Value, context: &Context) -> Result<Value> {
    match value {
        Value::String(text) => expand_string(&text, context).map(Value::String),
        Value::Object(map) => {
            let mut expanded = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                expanded.insert(key, expand_value(value, context)?);
            }
            Ok(Value::Object(expanded))
        }
        Value::Array(items) => items
            .into_iter()
            .map(|item| expand_value(item, context))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        other => Ok(other),
    }
}

fn expand_string(text: &str, context: &Context) -> Result<String> {
    let mut output = String::with_capacity(text.len());
    let mut cursor = 0;
    for captures in PLACEHOLDER_RE.captures_iter(text) {
        let matched = captures.get(0).expect("capture 0 always present");
        let name = &captures[1];
        let value = context
            .get(name)
            .ok_or_else(|| TokenError::MissingVariable(name.to_string()))?;
        output.push_str(&text[cursor..matched.start()]);
        output.push_str(value);
        cursor = matched.end();
    }
    output.push_str(&text[cursor..]);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn context(pairs: &[(&str, &str)]) -> Context {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    fn doc(value: serde_json::Value) -> TokenDocument {
        TokenDocument::from_value(value).unwrap()
    }

    #[test]
    fn expands_placeholders_in_scalars_and_nested_containers() {
        let document = doc(json!({
            "cmd": "${fee}-${fie}",
            "cpus": 0.2,
            "metadata": {"foe": "${foe}"},
        }));
        let ctx = context(&[("fee", "bar"), ("fie", "baz"), ("foe", "fum")]);
        let expanded = expand(document, &ctx).unwrap();
        assert_eq!(expanded.get("cmd"), Some(&json!("bar-baz")));
        assert_eq!(expanded.get("metadata"), Some(&json!({"foe": "fum"})));
        assert_eq!(expanded.get("cpus"), Some(&json!(0.2)));
    }

    #[test]
    fn missing_variable_names_the_exact_placeholder() {
        let document = doc(json!({"cmd": "${fee}-${fie}-${foe}"}));
        let ctx = context(&[("fee", "bar"), ("fie", "baz")]);
        let err = expand(document, &ctx).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error when processing template: missing variable 'foe'"
        );
    }

    #[test]
    fn expansion_is_idempotent_without_placeholders() {
        let document = doc(json!({"cmd": "plain", "mem": 128, "env": {"A": "1"}}));
        let expanded = expand(document.clone(), &context(&[("unused", "x")])).unwrap();
        assert_eq!(expanded, document);
    }

    #[test]
    fn flag_overrides_win_over_file_context() {
        let file = context(&[("fee", "bar"), ("fie", "baz")]);
        let ctx = build_context(
            Some(file),
            &[("fie".into(), "box".into()), ("foe".into(), "fum".into())],
        );
        assert_eq!(ctx.get("fie").map(String::as_str), Some("box"));
        assert_eq!(ctx.get("foe").map(String::as_str), Some("fum"));
        assert_eq!(ctx.get("fee").map(String::as_str), Some("bar"));
    }

    #[test]
    fn non_mapping_context_file_is_rejected_with_its_contents() {
        let err = parse_context("foo-bar").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Provided context file must evaluate to a dictionary, instead it is foo-bar"
        );
    }
}
