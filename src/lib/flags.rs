use serde_json::Value;

use crate::{
    document::{self, is_nested_key, is_supported_key},
    error::{Result, TokenError},
};

/// One dotted flag parsed into path segments plus its typed leaf value.
/// `--cpus 0.2` becomes `["cpus"] = 0.2`; `--env.KEY v` is `["env", "KEY"] = "v"`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAssignment {
    pub path: Vec<String>,
    pub value: Value,
}

impl FieldAssignment {
    pub fn top_level_key(&self) -> &str {
        &self.path[0]
    }
}

/// Everything the field-flag parser extracted from the trailing CLI arguments.
/// Clap handles the fixed outer flags; open-ended dotted assignments such as
/// `--env.KEY value` and `--context.key value` are outside its vocabulary, so
/// the commands hand them here untouched.
#[derive(Debug, Default, Clone)]
pub struct FlagInput {
    pub token: Option<String>,
    pub assignments: Vec<FieldAssignment>,
    pub context_overrides: Vec<(String, String)>,
}

impl FlagInput {
    pub fn has_context_source(&self) -> bool {
        !self.context_overrides.is_empty()
    }
}

pub fn parse(args: &[String]) -> Result<FlagInput> {
    let mut input = FlagInput::default();
    let mut unsupported: Vec<String> = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let Some(name) = arg.strip_prefix("--") else {
            if input.token.is_some() {
                return Err(TokenError::Usage(format!(
                    "unexpected extra argument '{arg}'"
                )));
            }
            input.token = Some(arg.clone());
            continue;
        };

        let value = iter
            .next()
            .ok_or_else(|| TokenError::Usage(format!("--{name} requires a value")))?;

        let segments: Vec<&str> = name.split('.').collect();
        match segments.as_slice() {
            ["context", key] => {
                input
                    .context_overrides
                    .push((key.to_string(), value.clone()));
            }
            [key] if is_nested_key(key) => {
                // A bare `--env value` cannot mean anything; env and metadata
                // are only assignable per sub-key.
                unsupported.push(key.to_string());
            }
            [key] => {
                if is_supported_key(key) {
                    input.assignments.push(FieldAssignment {
                        path: vec![key.to_string()],
                        value: document::parse_scalar(key, value)?,
                    });
                } else {
                    unsupported.push(key.to_string());
                }
            }
            [container, key] if is_nested_key(container) => {
                // Nested container values are deliberately untyped strings.
                input.assignments.push(FieldAssignment {
                    path: vec![container.to_string(), key.to_string()],
                    value: Value::String(value.clone()),
                });
            }
            _ => unsupported.push(name.to_string()),
        }
    }

    if unsupported.is_empty() {
        Ok(input)
    } else {
        unsupported.sort();
        unsupported.dedup();
        Err(TokenError::UnsupportedKeys { keys: unsupported })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[test]
    fn parses_positional_token_and_typed_scalars() {
        let input = parse(&args(&["my-token", "--cpus", "0.2", "--mem", "256"])).unwrap();
        assert_eq!(input.token.as_deref(), Some("my-token"));
        assert_eq!(
            input.assignments,
            vec![
                FieldAssignment {
                    path: vec!["cpus".into()],
                    value: json!(0.2),
                },
                FieldAssignment {
                    path: vec!["mem".into()],
                    value: json!(256),
                },
            ]
        );
    }

    #[test]
    fn nested_values_stay_strings() {
        let input = parse(&args(&["--metadata.instances", "5", "--env.KEY", "true"])).unwrap();
        assert_eq!(input.assignments[0].value, json!("5"));
        assert_eq!(input.assignments[1].value, json!("true"));
    }

    #[test]
    fn context_overrides_are_split_out() {
        let input = parse(&args(&["--context.fie", "box", "--cpus", "1"])).unwrap();
        assert_eq!(input.context_overrides, vec![("fie".into(), "box".into())]);
        assert_eq!(input.assignments.len(), 1);
    }

    #[test]
    fn unsupported_keys_are_collected_and_sorted() {
        let err = parse(&args(&[
            "--cpus",
            "0.1",
            "--foo-level",
            "HIGH",
            "--bar-rate",
            "LOW",
        ]))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported key(s): bar-rate, foo-level"
        );
    }

    #[test]
    fn token_is_not_a_field_flag() {
        // The name arrives positionally or in the input file, never as --token.
        let err = parse(&args(&["t1", "--token", "other"])).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported key(s): token");
        let err = parse(&args(&["--token", "t1", "--cpus", "0.1"])).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported key(s): token");
    }

    #[test]
    fn deep_dotted_paths_are_unsupported() {
        let err = parse(&args(&["--env.A.B", "x"])).unwrap_err();
        assert!(matches!(err, TokenError::UnsupportedKeys { .. }));
    }

    #[test]
    fn missing_value_is_a_usage_error() {
        let err = parse(&args(&["--cpus"])).unwrap_err();
        assert!(err.to_string().contains("requires a value"));
    }

    #[test]
    fn second_positional_is_rejected() {
        let err = parse(&args(&["a", "b"])).unwrap_err();
        assert!(err.to_string().contains("unexpected extra argument"));
    }
}
