use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::Value;

use crate::commands;
use tokenctl::{
    cluster::{self, Operation},
    config::load_or_default,
    dispatch,
    error::TokenError,
};

#[derive(Args)]
pub struct ShowArgs {
    /// Token name to fetch
    pub token: String,
    /// Target a single named cluster instead of every configured cluster
    #[arg(long, value_name = "NAME")]
    pub cluster: Option<String>,
    /// Emit the fetched documents as a JSON array
    #[arg(long, conflicts_with = "yaml")]
    pub json: bool,
    /// Emit the fetched documents as YAML
    #[arg(long)]
    pub yaml: bool,
}

pub async fn execute(config_path: Option<PathBuf>, args: ShowArgs) -> Result<()> {
    let (config, _) = load_or_default(config_path)?;
    let selected = cluster::select(&config.clusters, Operation::Read, args.cluster.as_deref())?;
    let client = commands::build_client(&config)?;

    let outcomes = dispatch::fan_out(&selected, |target| {
        let client = client.clone();
        let token = args.token.clone();
        async move {
            Ok(client
                .get_token(target, &token)
                .await?
                .map(|(document, _)| document.into_value()))
        }
    })
    .await;

    // "No matching data found" is ordinary output for a lookup, not a
    // diagnostic; it goes to stdout while the exit status stays nonzero.
    let report = match dispatch::aggregate(outcomes) {
        Ok(report) => report,
        Err(err @ TokenError::NotFound) => {
            println!("{err}");
            std::process::exit(1);
        }
        Err(err) => return Err(err.into()),
    };
    for warning in &report.warnings {
        eprintln!("{warning}");
    }

    if args.json {
        let documents: Vec<&Value> = report.payloads.iter().map(|(_, doc)| doc).collect();
        println!("{}", serde_json::to_string_pretty(&documents)?);
    } else if args.yaml {
        let documents: Vec<&Value> = report.payloads.iter().map(|(_, doc)| doc).collect();
        print!("{}", serde_yaml::to_string(&documents)?);
    } else {
        for (cluster_name, document) in &report.payloads {
            let url = selected
                .iter()
                .find(|candidate| candidate.name == *cluster_name)
                .map(|candidate| candidate.url.as_str())
                .unwrap_or(cluster_name);
            println!("=== {} / {} ===", url, args.token);
            println!("{}", serde_json::to_string_pretty(document)?);
        }
    }
    Ok(())
}
