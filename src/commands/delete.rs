use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::commands;
use tokenctl::{
    cluster::{self, Operation},
    config::load_or_default,
    error::TokenError,
    mutate,
};

#[derive(Args)]
pub struct DeleteArgs {
    /// Token name to delete
    pub token: String,
    /// Target a single named cluster instead of every configured cluster
    #[arg(long, value_name = "NAME")]
    pub cluster: Option<String>,
}

pub async fn execute(config_path: Option<PathBuf>, args: DeleteArgs) -> Result<()> {
    let (config, _) = load_or_default(config_path)?;
    let selected = cluster::select(&config.clusters, Operation::Mutate, args.cluster.as_deref())?;
    let client = commands::build_client(&config)?;

    let mut deleted = 0usize;
    let mut last_error: Option<TokenError> = None;
    for target in selected {
        println!("Deleting token {} on {}", args.token, target.name);
        match mutate::delete(&client, target, &args.token).await {
            Ok(_) => {
                println!("Successfully deleted {}", args.token);
                deleted += 1;
            }
            Err(TokenError::NotFound) => {
                last_error.get_or_insert(TokenError::NotFound);
            }
            Err(TokenError::Transport { cluster, cause }) => {
                let warning = TokenError::Transport { cluster, cause };
                eprintln!("{warning}");
                last_error.get_or_insert(warning);
            }
            Err(err) => return Err(err.into()),
        }
    }

    if deleted == 0 {
        return Err(last_error.unwrap_or(TokenError::NotFound).into());
    }
    Ok(())
}
