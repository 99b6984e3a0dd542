use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TokenError>;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(
        "You cannot specify the same parameter in both an input file and token field flags at the same time: {}",
        .fields.join(", ")
    )]
    Conflict { fields: Vec<String> },
    #[error("cannot specify the token name both as an argument and in the input file")]
    NameConflict,
    #[error("must specify the token name")]
    MissingName,
    #[error("Unsupported key(s): {}", .keys.join(", "))]
    UnsupportedKeys { keys: Vec<String> },
    #[error("Error when processing template: missing variable '{0}'")]
    MissingVariable(String),
    #[error("{0}")]
    Usage(String),
    #[error("Token description is improper:\n{}", .messages.join("\n"))]
    Validation { messages: Vec<String> },
    #[error(
        "the token on {cluster} was modified concurrently (stale token); fetch the latest version and retry"
    )]
    StaleToken { cluster: String },
    #[error("{}", in_use_message(.token, .service_ids))]
    InUse {
        token: String,
        service_ids: Vec<String>,
    },
    #[error("{0}")]
    NotAuthorized(String),
    #[error("No matching data found")]
    NotFound,
    #[error("Encountered connection error with {cluster}: {cause}")]
    Transport { cluster: String, cause: String },
    #[error("unexpected response from {cluster}: {status} {body}")]
    UnexpectedResponse {
        cluster: String,
        status: u16,
        body: String,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
}

fn in_use_message(token: &str, service_ids: &[String]) -> String {
    if service_ids.len() == 1 {
        format!(
            "There is one service using token {}:\n  {}\nPlease kill this service before deleting the token",
            token, service_ids[0]
        )
    } else {
        format!(
            "There are {} services using token {}:\n  {}\nPlease kill these services before deleting the token",
            service_ids.len(),
            token,
            service_ids.join("\n  ")
        )
    }
}

impl TokenError {
    /// Pre-network errors are guaranteed to fire before any request is issued.
    pub fn is_pre_network(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Conflict { .. }
                | Self::NameConflict
                | Self::MissingName
                | Self::UnsupportedKeys { .. }
                | Self::MissingVariable(_)
                | Self::Usage(_)
                | Self::NotAuthorized(_)
        )
    }
}

impl From<toml::de::Error> for TokenError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for TokenError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for TokenError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for TokenError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_use_wording_is_singular_for_one_service() {
        let err = TokenError::InUse {
            token: "foo".into(),
            service_ids: vec!["svc-1".into()],
        };
        let text = err.to_string();
        assert!(text.contains("There is one service using token foo"));
        assert!(text.contains("Please kill this service"));
        assert!(text.contains("svc-1"));
    }

    #[test]
    fn in_use_wording_is_plural_for_many_services() {
        let err = TokenError::InUse {
            token: "foo".into(),
            service_ids: vec!["svc-1".into(), "svc-2".into()],
        };
        let text = err.to_string();
        assert!(text.contains("There are 2 services using token foo"));
        assert!(text.contains("Please kill these services"));
        assert!(text.contains("svc-1"));
        assert!(text.contains("svc-2"));
    }

    #[test]
    fn conflict_lists_every_field() {
        let err = TokenError::Conflict {
            fields: vec!["cpus".into(), "mem".into()],
        };
        assert!(err.to_string().ends_with("cpus, mem"));
    }
}
