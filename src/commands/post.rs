use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::Value;
use tracing::debug;

use crate::commands;
use tokenctl::{
    cluster::{self, Operation},
    config::{ClusterConfig, load_or_default},
    document::render_scalar,
    error::TokenError,
    flags,
    merge::{self, ResolvedIntent},
    mutate,
    store::StoreClient,
    template,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostMode {
    Create,
    Update,
}

impl PostMode {
    fn verb(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            Self::Create => "created",
            Self::Update => "updated",
        }
    }
}

#[derive(Args)]
pub struct PostArgs {
    /// Read the token document from a JSON file ('-' for stdin)
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,
    /// Read the token document from a YAML file ('-' for stdin)
    #[arg(long, value_name = "PATH")]
    pub yaml: Option<PathBuf>,
    /// Read the token document from a file, inferring the format from its extension
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,
    /// Template context file for ${var} substitution in the document
    #[arg(long, value_name = "PATH")]
    pub context: Option<PathBuf>,
    /// Let token field flags win over file-supplied fields instead of failing
    #[arg(long = "override", conflicts_with = "no_override")]
    pub override_mode: bool,
    /// Fail when a field appears in both the input file and field flags (default)
    #[arg(long = "no-override")]
    pub no_override: bool,
    /// Write in admin update mode (requires the TOKENCTL_ADMIN environment toggle)
    #[arg(long)]
    pub admin: bool,
    /// Target a single named cluster instead of the configured default
    #[arg(long, value_name = "NAME")]
    pub cluster: Option<String>,
    /// Token name followed by field flags: --cpus 0.2 --env.KEY value --metadata.key value
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "TOKEN_AND_FIELDS"
    )]
    pub rest: Vec<String>,
}

pub async fn execute(config_path: Option<PathBuf>, args: PostArgs, mode: PostMode) -> Result<()> {
    let (config, _) = load_or_default(config_path)?;
    let input = flags::parse(&args.rest)?;

    let file_source =
        commands::load_file_source(args.json.as_deref(), args.yaml.as_deref(), args.input.as_deref())?;

    let has_context_source = args.context.is_some() || input.has_context_source();
    if has_context_source && file_source.is_none() {
        return Err(TokenError::Usage(
            "--context file can only be used when a data file is specified via --input, --json, or --yaml"
                .to_string(),
        )
        .into());
    }
    let context = commands::load_context(args.context.as_ref(), &input.context_overrides)?;

    let mut intent = merge::resolve(
        input.token.as_deref(),
        file_source,
        &input.assignments,
        args.override_mode,
    )?;
    if let Some(context) = &context {
        intent.changes = template::expand(intent.changes, context)?;
    }

    if args.admin {
        commands::ensure_admin_enabled()?;
    }
    check_run_as_user(&intent, args.admin)?;

    let operation = match mode {
        PostMode::Create => Operation::Create,
        PostMode::Update => Operation::Mutate,
    };
    let selected = cluster::select(&config.clusters, operation, args.cluster.as_deref())?;
    let client = commands::build_client(&config)?;

    let targets = match mode {
        PostMode::Create => selected,
        PostMode::Update => resolve_update_targets(&client, selected, &intent.token).await?,
    };

    for target in targets {
        if args.admin {
            println!(
                "Attempting to {} token {} on {} in ADMIN mode",
                mode.verb(),
                intent.token,
                target.name
            );
        } else {
            println!(
                "Attempting to {} token {} on {}",
                mode.verb(),
                intent.token,
                target.name
            );
        }
        debug!(cluster = %target.name, token = %intent.token, mode = ?mode, "dispatching write");

        let result = match mode {
            PostMode::Create => mutate::create(&client, target, &intent, args.admin).await?,
            PostMode::Update => mutate::update(&client, target, &intent, args.admin).await?,
        };
        report_success(mode, &intent.token, &result);
    }

    Ok(())
}

/// Updates without an explicit cluster target every cluster currently holding
/// the token. When no cluster holds it, a single-cluster configuration still
/// gets the upsert; with several clusters the intent is ambiguous and the
/// operation fails instead of creating the token everywhere.
async fn resolve_update_targets<'a>(
    client: &StoreClient,
    selected: Vec<&'a ClusterConfig>,
    token: &str,
) -> Result<Vec<&'a ClusterConfig>> {
    if selected.len() == 1 {
        return Ok(selected);
    }

    let mut holders = Vec::new();
    for candidate in &selected {
        match client.get_token(candidate, token).await {
            Ok(Some(_)) => holders.push(*candidate),
            Ok(None) => {}
            Err(TokenError::Transport { cluster, cause }) => {
                eprintln!(
                    "{}",
                    TokenError::Transport { cluster, cause }
                );
            }
            Err(err) => return Err(err.into()),
        }
    }

    if holders.is_empty() {
        return Err(TokenError::NotFound.into());
    }
    Ok(holders)
}

fn check_run_as_user(intent: &ResolvedIntent, admin: bool) -> Result<()> {
    if admin {
        return Ok(());
    }
    if let Some(run_as_user) = intent.changes.get("run-as-user") {
        let requested = render_scalar(run_as_user);
        if requested != "*" && requested != commands::current_user() {
            return Err(TokenError::NotAuthorized(format!(
                "Cannot run as user. Running as user '{requested}' requires --admin"
            ))
            .into());
        }
    }
    Ok(())
}

fn report_success(mode: PostMode, token: &str, result: &Value) {
    if let Some(message) = result.get("message").and_then(Value::as_str) {
        println!("{message}");
    }
    println!("Successfully {} {}", mode.past_tense(), token);
}
