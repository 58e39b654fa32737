use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

pub const DOCS_DIR: &str = "docs";
pub const IMAGES_DIR: &str = "docs/images";
pub const META_DIR: &str = "docs/.meta";
pub const DEFAULT_BOT_AUTHOR: &str = "docctl-bot";
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(350);

/// Per-run settings. Built by the CLI from the environment; tests build it
/// directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub repo_root: PathBuf,
    pub docs_dir: PathBuf,
    pub images_dir: PathBuf,
    pub meta_dir: PathBuf,
    pub database_id: String,
    pub git_host_url: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub commit_sha: String,
    pub branch: String,
    pub pr_number: String,
    pub pr_url: String,
    pub actor: String,
    pub bot_author: String,
    /// Pause between consecutive block-append requests.
    pub batch_delay: Duration,
}

impl PipelineConfig {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        PipelineConfig {
            docs_dir: repo_root.join(DOCS_DIR),
            images_dir: repo_root.join(IMAGES_DIR),
            meta_dir: repo_root.join(META_DIR),
            repo_root,
            database_id: String::new(),
            git_host_url: String::new(),
            repo_owner: String::new(),
            repo_name: String::new(),
            commit_sha: String::new(),
            branch: String::new(),
            pr_number: String::new(),
            pr_url: String::new(),
            actor: String::new(),
            bot_author: DEFAULT_BOT_AUTHOR.to_string(),
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }

    /// Base for raw file URLs on the git host, used to publish repository
    /// images. `None` unless host, owner and repo are all known.
    pub fn raw_content_base_url(&self) -> Option<String> {
        if self.git_host_url.is_empty() || self.repo_owner.is_empty() || self.repo_name.is_empty()
        {
            return None;
        }
        Some(format!("{}/raw/branch/main", self.repo_url()))
    }

    pub fn repo_url(&self) -> String {
        if self.git_host_url.is_empty() {
            return String::new();
        }
        format!(
            "{}/{}/{}",
            self.git_host_url.trim_end_matches('/'),
            self.repo_owner,
            self.repo_name
        )
    }

    pub fn pr_url(&self) -> Option<&str> {
        Some(self.pr_url.as_str()).filter(|u| !u.is_empty())
    }

    pub fn is_bot_actor(&self) -> bool {
        !self.actor.is_empty() && self.actor == self.bot_author
    }

    /// Resolves a user-supplied document path against the repo root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.repo_root.join(path)
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            repo_root = %self.repo_root.display(),
            database_id = %self.database_id,
            commit = %self.commit_sha,
            branch = %self.branch,
            actor = %self.actor,
            "Loaded PipelineConfig"
        );
        debug!(?self, "PipelineConfig loaded (full debug)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_base_needs_host_owner_and_repo() {
        let mut config = PipelineConfig::new("/repo");
        assert_eq!(config.raw_content_base_url(), None);
        config.git_host_url = "https://git.example.com/".into();
        config.repo_owner = "org".into();
        config.repo_name = "docs".into();
        assert_eq!(
            config.raw_content_base_url().as_deref(),
            Some("https://git.example.com/org/docs/raw/branch/main")
        );
        assert_eq!(config.docs_dir, PathBuf::from("/repo/docs"));
    }
}
