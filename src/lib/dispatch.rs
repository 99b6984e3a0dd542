use futures::future;
use serde_json::Value;
use tracing::warn;

use crate::{
    config::ClusterConfig,
    error::{Result, TokenError},
};

/// One cluster's contribution to a fan-out operation.
#[derive(Debug)]
pub enum DispatchOutcome {
    Success { cluster: String, payload: Value },
    /// The cluster answered but does not know the requested token.
    Missing { cluster: String },
    Transport { cluster: String, cause: String },
    Application { cluster: String, error: TokenError },
}

impl DispatchOutcome {
    pub fn cluster(&self) -> &str {
        match self {
            Self::Success { cluster, .. }
            | Self::Missing { cluster }
            | Self::Transport { cluster, .. }
            | Self::Application { cluster, .. } => cluster,
        }
    }

    fn from_result(cluster: &ClusterConfig, result: Result<Option<Value>>) -> Self {
        match result {
            Ok(Some(payload)) => Self::Success {
                cluster: cluster.name.clone(),
                payload,
            },
            Ok(None) => Self::Missing {
                cluster: cluster.name.clone(),
            },
            Err(TokenError::NotFound) => Self::Missing {
                cluster: cluster.name.clone(),
            },
            Err(TokenError::Transport { cluster, cause }) => Self::Transport { cluster, cause },
            Err(error) => Self::Application {
                cluster: cluster.name.clone(),
                error,
            },
        }
    }
}

/// Runs one query per cluster concurrently; outcomes come back in selector
/// order, and no cluster's failure prevents the others from being attempted.
pub async fn fan_out<'a, F, Fut>(clusters: &'a [&'a ClusterConfig], call: F) -> Vec<DispatchOutcome>
where
    F: Fn(&'a ClusterConfig) -> Fut,
    Fut: future::Future<Output = Result<Option<Value>>> + 'a,
{
    let calls = clusters.iter().copied().map(|cluster| {
        let fut = call(cluster);
        async move { DispatchOutcome::from_result(cluster, fut.await) }
    });
    future::join_all(calls).await
}

/// The aggregated result of a fan-out, ready for the presentation layer.
#[derive(Debug)]
pub struct AggregateReport {
    /// Successful payloads in outcome order, tagged with their cluster.
    pub payloads: Vec<(String, Value)>,
    /// One warning line per unreachable cluster.
    pub warnings: Vec<String>,
}

/// Folds per-cluster outcomes into a single pass/fail plus a report. A read
/// succeeds when at least one cluster answered; unreachable clusters surface
/// as warnings without sinking the result. When nothing succeeded the first
/// application error wins, then a transport error, then not-found.
pub fn aggregate(outcomes: Vec<DispatchOutcome>) -> Result<AggregateReport> {
    let mut payloads = Vec::new();
    let mut warnings = Vec::new();
    let mut application: Option<TokenError> = None;
    let mut transport: Option<TokenError> = None;

    for outcome in outcomes {
        match outcome {
            DispatchOutcome::Success { cluster, payload } => payloads.push((cluster, payload)),
            DispatchOutcome::Missing { .. } => {}
            DispatchOutcome::Transport { cluster, cause } => {
                warn!(cluster = %cluster, "cluster unreachable: {cause}");
                warnings.push(
                    TokenError::Transport {
                        cluster: cluster.clone(),
                        cause: cause.clone(),
                    }
                    .to_string(),
                );
                transport.get_or_insert(TokenError::Transport { cluster, cause });
            }
            DispatchOutcome::Application { error, .. } => {
                application.get_or_insert(error);
            }
        }
    }

    if payloads.is_empty() {
        if let Some(error) = application {
            return Err(error);
        }
        if let Some(error) = transport {
            return Err(error);
        }
        return Err(TokenError::NotFound);
    }

    Ok(AggregateReport { payloads, warnings })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn one_reachable_cluster_is_enough_for_success() {
        let outcomes = vec![
            DispatchOutcome::Success {
                cluster: "foo".into(),
                payload: json!({"cpus": 0.1}),
            },
            DispatchOutcome::Transport {
                cluster: "bar".into(),
                cause: "connection refused".into(),
            },
        ];
        let report = aggregate(outcomes).unwrap();
        assert_eq!(report.payloads.len(), 1);
        assert_eq!(report.payloads[0].0, "foo");
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("Encountered connection error with bar"));
    }

    #[test]
    fn all_clusters_missing_is_not_found() {
        let outcomes = vec![
            DispatchOutcome::Missing { cluster: "foo".into() },
            DispatchOutcome::Missing { cluster: "bar".into() },
        ];
        let err = aggregate(outcomes).unwrap_err();
        assert!(matches!(err, TokenError::NotFound));
    }

    #[test]
    fn application_error_outranks_transport_when_nothing_succeeded() {
        let outcomes = vec![
            DispatchOutcome::Transport {
                cluster: "foo".into(),
                cause: "timed out".into(),
            },
            DispatchOutcome::Application {
                cluster: "bar".into(),
                error: TokenError::StaleToken { cluster: "bar".into() },
            },
        ];
        let err = aggregate(outcomes).unwrap_err();
        assert!(matches!(err, TokenError::StaleToken { .. }));
    }

    #[test]
    fn only_transport_failures_propagate_the_transport_error() {
        let outcomes = vec![DispatchOutcome::Transport {
            cluster: "bar".into(),
            cause: "dns failure".into(),
        }];
        let err = aggregate(outcomes).unwrap_err();
        assert!(matches!(err, TokenError::Transport { .. }));
    }

    #[test]
    fn payloads_preserve_outcome_order() {
        let outcomes = vec![
            DispatchOutcome::Success {
                cluster: "a".into(),
                payload: json!(1),
            },
            DispatchOutcome::Success {
                cluster: "b".into(),
                payload: json!(2),
            },
        ];
        let report = aggregate(outcomes).unwrap();
        let clusters: Vec<&str> = report.payloads.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(clusters, vec!["a", "b"]);
    }
}
