use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::Value;

use crate::commands;
use tokenctl::{
    cluster::{self, Operation},
    config::load_or_default,
    dispatch,
};

#[derive(Args)]
pub struct TokensArgs {
    /// Target a single named cluster instead of every configured cluster
    #[arg(long, value_name = "NAME")]
    pub cluster: Option<String>,
    /// Emit the listing as a JSON array
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(config_path: Option<PathBuf>, args: TokensArgs) -> Result<()> {
    let (config, _) = load_or_default(config_path)?;
    let selected = cluster::select(&config.clusters, Operation::Read, args.cluster.as_deref())?;
    let client = commands::build_client(&config)?;

    let outcomes = dispatch::fan_out(&selected, |target| {
        let client = client.clone();
        async move { client.list_tokens(target).await.map(|tokens| Some(Value::Array(tokens))) }
    })
    .await;

    let report = dispatch::aggregate(outcomes)?;
    for warning in &report.warnings {
        eprintln!("{warning}");
    }

    if args.json {
        let mut combined: Vec<Value> = Vec::new();
        for (_, payload) in report.payloads {
            if let Value::Array(entries) = payload {
                combined.extend(entries);
            }
        }
        println!("{}", serde_json::to_string_pretty(&combined)?);
        return Ok(());
    }

    for (cluster_name, payload) in &report.payloads {
        let Value::Array(entries) = payload else {
            continue;
        };
        for entry in entries {
            let name = entry
                .get("token")
                .and_then(Value::as_str)
                .unwrap_or("(unnamed)");
            println!("{name} {cluster_name}");
        }
    }
    Ok(())
}
