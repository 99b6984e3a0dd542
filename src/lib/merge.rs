use serde_json::Value;

use crate::{
    document::{TokenDocument, is_nested_key},
    error::{Result, TokenError},
    flags::FieldAssignment,
};

/// The merger's output: one token identity plus the combined change set from
/// the file and flag sources, ready to run through the template expander and
/// the per-cluster mutator.
#[derive(Debug, Clone)]
pub struct ResolvedIntent {
    pub token: String,
    pub changes: TokenDocument,
    /// True when a file source was supplied. A file is a whole-document
    /// source: on update, every top-level key it sets replaces the remote
    /// value outright, nested containers included. Flag-only invocations
    /// instead patch nested containers per sub-key.
    pub whole_document: bool,
}

/// Combines the positional token argument, an optional file-supplied document,
/// and dotted flag assignments under the requested conflict policy.
pub fn resolve(
    token_arg: Option<&str>,
    file_source: Option<TokenDocument>,
    assignments: &[FieldAssignment],
    override_mode: bool,
) -> Result<ResolvedIntent> {
    let whole_document = file_source.is_some();
    let mut file_doc = file_source.unwrap_or_default();
    let file_token = file_doc.remove("token");
    let file_token = match file_token {
        Some(Value::String(name)) => Some(name),
        Some(other) => {
            return Err(TokenError::Usage(format!(
                "the token name in the input file must be a string, got {other}"
            )));
        }
        None => None,
    };

    let token = match (token_arg, file_token) {
        (Some(arg), Some(_)) if override_mode => arg.to_string(),
        (Some(_), Some(_)) => return Err(TokenError::NameConflict),
        (Some(arg), None) => arg.to_string(),
        (None, Some(name)) => name,
        (None, None) => return Err(TokenError::MissingName),
    };

    let flag_doc = build_flag_document(assignments);

    if !override_mode {
        let mut conflicts: Vec<String> = flag_doc
            .scalar_keys()
            .filter(|key| file_doc.get(key).is_some())
            .map(str::to_string)
            .collect();
        if !conflicts.is_empty() {
            conflicts.sort();
            return Err(TokenError::Conflict { fields: conflicts });
        }
    }

    Ok(ResolvedIntent {
        token,
        changes: merge_documents(file_doc, flag_doc),
        whole_document,
    })
}

/// Applies a resolved change set to a base document. For create the base is
/// empty; for update it is the current remote document, so unrelated remote
/// fields survive untouched.
pub fn apply_to_base(mut base: TokenDocument, intent: &ResolvedIntent) -> TokenDocument {
    if intent.whole_document {
        for (key, value) in &intent.changes.0 {
            base.insert(key.clone(), value.clone());
        }
        return base;
    }

    for (key, value) in &intent.changes.0 {
        match value {
            Value::Object(entries) if is_nested_key(key) => {
                for (sub_key, sub_value) in entries {
                    base.set_nested(key, sub_key, sub_value.clone());
                }
            }
            other => {
                base.insert(key.clone(), other.clone());
            }
        }
    }
    base
}

/// Builds the flag-source document: scalars at the top level, dotted paths
/// gathered into their nested containers.
fn build_flag_document(assignments: &[FieldAssignment]) -> TokenDocument {
    let mut doc = TokenDocument::new();
    for assignment in assignments {
        match assignment.path.as_slice() {
            [key] => {
                doc.insert(key.clone(), assignment.value.clone());
            }
            [container, key] => {
                doc.set_nested(container, key, assignment.value.clone());
            }
            _ => unreachable!("flag parser rejects paths deeper than two segments"),
        }
    }
    doc
}

/// File and flag sources combined: flag scalars win, nested containers are
/// shallow-merged with flag entries winning per sub-key.
fn merge_documents(file: TokenDocument, flags: TokenDocument) -> TokenDocument {
    let mut merged = file;
    for (key, value) in flags.0 {
        let merge_nested = is_nested_key(&key)
            && matches!(value, Value::Object(_))
            && matches!(merged.0.get(&key), Some(Value::Object(_)));
        if merge_nested {
            let Value::Object(incoming) = value else {
                unreachable!()
            };
            let Some(Value::Object(existing)) = merged.0.get_mut(&key) else {
                unreachable!()
            };
            for (sub_key, sub_value) in incoming {
                existing.insert(sub_key, sub_value);
            }
        } else {
            merged.insert(key, value);
        }
    }
    merged
}
