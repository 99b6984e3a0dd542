mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{
    delete::DeleteArgs,
    post::{PostArgs, PostMode},
    show::ShowArgs,
    tokens::TokensArgs,
};

#[derive(Parser)]
#[command(author, version, about = "Multi-cluster token management CLI")]
struct Cli {
    /// Path to the configuration file. Defaults to ~/.config/tokenctl/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a token (wholesale replace; upserts an existing token)
    Create(PostArgs),
    /// Update a token, patching only the supplied fields
    Update(PostArgs),
    /// Delete a token after checking for services still using it
    Delete(DeleteArgs),
    /// Fetch a token from every configured cluster
    Show(ShowArgs),
    /// List tokens across every configured cluster
    Tokens(TokensArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let Cli { config, command } = Cli::parse();

    match command {
        Commands::Create(args) => commands::post::execute(config, args, PostMode::Create).await?,
        Commands::Update(args) => commands::post::execute(config, args, PostMode::Update).await?,
        Commands::Delete(args) => commands::delete::execute(config, args).await?,
        Commands::Show(args) => commands::show::execute(config, args).await?,
        Commands::Tokens(args) => commands::tokens::execute(config, args).await?,
    }

    Ok(())
}
