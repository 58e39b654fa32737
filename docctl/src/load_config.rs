/// `load_config` module: builds the run's [`PipelineConfig`] and store
/// credentials from the process environment.
///
/// CI passes everything through environment variables; a local `.env` file
/// is honoured by `main` via `dotenvy` before this runs.
///
/// # Responsibilities
/// - Resolve the repository root (`--repo-root`, then `GITHUB_WORKSPACE`,
///   then the working directory)
/// - Read git host, repository, commit, branch, PR and actor metadata
/// - Hold the Notion token and documents database id, which only the
///   publish command requires
///
/// # Errors
/// All errors in this module use `anyhow::Error` and are surfaced at the
/// CLI boundary.
use anyhow::{bail, Context, Result};
use docctl_core::config::{PipelineConfig, DEFAULT_BOT_AUTHOR};
use std::env;
use std::path::PathBuf;
use tracing::{error, info};

pub const ENV_NOTION_TOKEN: &str = "NOTION_TOKEN";
pub const ENV_DATABASE_ID: &str = "NOTION_DATABASE_ID_DOCUMENTS";

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub pipeline: PipelineConfig,
    pub notion_token: Option<String>,
}

impl CliConfig {
    /// Token and database id, both required to talk to the store.
    pub fn store_credentials(&self) -> Result<(&str, &str)> {
        let Some(token) = self.notion_token.as_deref() else {
            error!(var = ENV_NOTION_TOKEN, "Notion token missing in environment");
            bail!("{ENV_NOTION_TOKEN} is not set");
        };
        if self.pipeline.database_id.is_empty() {
            error!(var = ENV_DATABASE_ID, "Database id missing in environment");
            bail!("{ENV_DATABASE_ID} is not set");
        }
        Ok((token, self.pipeline.database_id.as_str()))
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn var_or_empty(key: &str) -> String {
    var(key).unwrap_or_default()
}

/// Loads configuration from the environment. `repo_root` overrides
/// `GITHUB_WORKSPACE`.
pub fn load_config(repo_root: Option<PathBuf>) -> Result<CliConfig> {
    let repo_root = match repo_root.or_else(|| var("GITHUB_WORKSPACE").map(PathBuf::from)) {
        Some(root) => root,
        None => env::current_dir().context("Failed to determine current directory")?,
    };
    info!(repo_root = %repo_root.display(), "Loading configuration from environment");
    if !repo_root.is_dir() {
        error!(repo_root = %repo_root.display(), "Repository root is not a directory");
        bail!("repository root {} is not a directory", repo_root.display());
    }

    let mut pipeline = PipelineConfig::new(repo_root);
    pipeline.database_id = var_or_empty(ENV_DATABASE_ID);
    pipeline.git_host_url = var_or_empty("GITEA_URL");
    pipeline.repo_owner = var_or_empty("GITHUB_REPOSITORY_OWNER");
    pipeline.repo_name = var("GITHUB_REPOSITORY")
        .and_then(|r| r.rsplit('/').next().map(str::to_string))
        .unwrap_or_default();
    pipeline.commit_sha = var_or_empty("GITHUB_SHA");
    pipeline.branch = var_or_empty("GITHUB_REF_NAME");
    pipeline.pr_number = var_or_empty("PR_NUMBER");
    pipeline.pr_url = var_or_empty("PR_URL");
    pipeline.actor = var_or_empty("GITHUB_ACTOR");
    pipeline.bot_author = var("BOT_COMMIT_AUTHOR").unwrap_or_else(|| DEFAULT_BOT_AUTHOR.to_string());
    pipeline.trace_loaded();

    Ok(CliConfig {
        pipeline,
        notion_token: var(ENV_NOTION_TOKEN),
    })
}
