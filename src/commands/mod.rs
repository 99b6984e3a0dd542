use std::{
    env, fs,
    io::Read as _,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context as _, Result, bail};

use tokenctl::{
    config::Config,
    document::TokenDocument,
    error::TokenError,
    store::StoreClient,
    template::{self, Context},
};

pub mod delete;
pub mod post;
pub mod show;
pub mod tokens;

/// Client-side admin toggle. A convenience check only, never a security
/// boundary; the store remains the authority on authorization.
pub const ADMIN_ENV: &str = "TOKENCTL_ADMIN";

pub(crate) fn build_client(config: &Config) -> Result<StoreClient> {
    StoreClient::new(Duration::from_secs(config.timeout_secs))
        .context("failed to build store client")
}

pub(crate) fn current_user() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

pub(crate) fn ensure_admin_enabled() -> Result<()> {
    let enabled = env::var(ADMIN_ENV)
        .map(|value| value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if enabled {
        Ok(())
    } else {
        Err(TokenError::NotAuthorized(format!(
            "admin mode requires {ADMIN_ENV}=true in the environment"
        ))
        .into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Json,
    Yaml,
}

/// Loads the file-supplied document from `--json`, `--yaml`, or `--input`
/// (format inferred from the extension). `-` reads standard input. At most one
/// source may be given.
pub(crate) fn load_file_source(
    json: Option<&Path>,
    yaml: Option<&Path>,
    input: Option<&Path>,
) -> Result<Option<TokenDocument>> {
    let mut sources: Vec<(FileFormat, &Path)> = Vec::new();
    if let Some(path) = json {
        sources.push((FileFormat::Json, path));
    }
    if let Some(path) = yaml {
        sources.push((FileFormat::Yaml, path));
    }
    if let Some(path) = input {
        sources.push((infer_format(path)?, path));
    }

    match sources.as_slice() {
        [] => Ok(None),
        [(format, path)] => {
            let contents = read_source(path)?;
            let value: serde_json::Value = match format {
                FileFormat::Json => serde_json::from_str(&contents)
                    .with_context(|| format!("failed to parse {} as JSON", path.display()))?,
                FileFormat::Yaml => serde_yaml::from_str(&contents)
                    .with_context(|| format!("failed to parse {} as YAML", path.display()))?,
            };
            Ok(Some(TokenDocument::from_value(value)?))
        }
        _ => bail!("only one of --json, --yaml, or --input may be specified"),
    }
}

fn infer_format(path: &Path) -> Result<FileFormat> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(FileFormat::Json),
        Some("yaml") | Some("yml") => Ok(FileFormat::Yaml),
        _ => bail!(
            "unable to infer the format of {}; use --json or --yaml instead",
            path.display()
        ),
    }
}

fn read_source(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut contents = String::new();
        std::io::stdin()
            .read_to_string(&mut contents)
            .context("failed to read standard input")?;
        Ok(contents)
    } else {
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
    }
}

/// Builds the template context from the `--context` file plus `--context.key`
/// overrides. Returns `None` when no context source was supplied at all.
pub(crate) fn load_context(
    context_file: Option<&PathBuf>,
    overrides: &[(String, String)],
) -> Result<Option<Context>> {
    let file_context = match context_file {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .map_err(|_| anyhow::anyhow!("Unable to load context from {}", path.display()))?;
            Some(template::parse_context(&contents)?)
        }
        None => None,
    };

    if file_context.is_none() && overrides.is_empty() {
        return Ok(None);
    }
    Ok(Some(template::build_context(file_context, overrides)))
}
