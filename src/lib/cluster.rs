use crate::{
    config::ClusterConfig,
    error::{Result, TokenError},
};

/// Operation kinds the selector distinguishes. Creates target exactly one
/// cluster; reads and mutations without an explicit cluster fan out to all of
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Mutate,
}

/// Picks the ordered list of target clusters for an operation, failing before
/// any request is issued when the selection is ambiguous.
pub fn select<'a>(
    clusters: &'a [ClusterConfig],
    operation: Operation,
    explicit: Option<&str>,
) -> Result<Vec<&'a ClusterConfig>> {
    if clusters.is_empty() {
        return Err(TokenError::Config(
            "must specify at least one cluster".into(),
        ));
    }

    if let Some(name) = explicit {
        let cluster = clusters
            .iter()
            .find(|cluster| cluster.name == name)
            .ok_or_else(|| TokenError::Config(format!("no cluster named '{name}' is configured")))?;
        return Ok(vec![cluster]);
    }

    match operation {
        Operation::Create => {
            let defaults: Vec<&ClusterConfig> = clusters
                .iter()
                .filter(|cluster| cluster.default_for_create)
                .collect();
            match defaults.as_slice() {
                [] => Err(TokenError::Config(
                    "must either specify a cluster via --cluster or set \"default-for-create\" to true"
                        .into(),
                )),
                [single] => Ok(vec![*single]),
                many => {
                    let names: Vec<&str> =
                        many.iter().map(|cluster| cluster.name.as_str()).collect();
                    Err(TokenError::Config(format!(
                        "you have \"default-for-create\" set to true for more than one cluster: {}",
                        names.join(", ")
                    )))
                }
            }
        }
        Operation::Read | Operation::Mutate => Ok(clusters.iter().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(name: &str, default_for_create: bool) -> ClusterConfig {
        ClusterConfig {
            name: name.into(),
            url: format!("http://{name}.example:9091"),
            default_for_create,
        }
    }

    #[test]
    fn empty_cluster_list_is_fatal_for_every_operation() {
        for operation in [Operation::Create, Operation::Read, Operation::Mutate] {
            let err = select(&[], operation, None).unwrap_err();
            assert!(err.to_string().contains("must specify at least one cluster"));
        }
    }

    #[test]
    fn create_targets_the_single_default_cluster() {
        let clusters = vec![cluster("foo", false), cluster("bar", true)];
        let selected = select(&clusters, Operation::Create, None).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "bar");
    }

    #[test]
    fn create_without_any_default_requires_an_explicit_cluster() {
        let clusters = vec![cluster("foo", false), cluster("bar", false)];
        let err = select(&clusters, Operation::Create, None).unwrap_err();
        assert!(
            err.to_string()
                .contains("specify a cluster via --cluster or set \"default-for-create\" to true")
        );
    }

    #[test]
    fn create_with_competing_defaults_names_both_clusters() {
        let clusters = vec![cluster("foo", true), cluster("bar", true)];
        let err = select(&clusters, Operation::Create, None).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("\"default-for-create\" set to true for more than one cluster"));
        assert!(text.contains("foo"));
        assert!(text.contains("bar"));
    }

    #[test]
    fn explicit_cluster_flag_overrides_defaults() {
        let clusters = vec![cluster("foo", false), cluster("bar", true)];
        let selected = select(&clusters, Operation::Create, Some("foo")).unwrap();
        assert_eq!(selected[0].name, "foo");
    }

    #[test]
    fn unknown_explicit_cluster_is_a_configuration_error() {
        let clusters = vec![cluster("foo", false)];
        let err = select(&clusters, Operation::Read, Some("baz")).unwrap_err();
        assert!(err.to_string().contains("no cluster named 'baz'"));
    }

    #[test]
    fn reads_and_mutations_fan_out_in_config_order() {
        let clusters = vec![cluster("foo", false), cluster("bar", true)];
        for operation in [Operation::Read, Operation::Mutate] {
            let selected = select(&clusters, operation, None).unwrap();
            let names: Vec<&str> = selected.iter().map(|c| c.name.as_str()).collect();
            assert_eq!(names, vec!["foo", "bar"]);
        }
    }
}
