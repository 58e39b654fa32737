//! Git plumbing behind the core `SourceControl` contract.
//!
//! Commands run synchronously in the repository root, one at a time, the
//! same way the rest of the pipeline processes documents.

use std::path::{Path, PathBuf};
use std::process::Command;

use async_trait::async_trait;
use docctl_core::contract::{ScmError, SourceControl};

pub struct GitCli {
    repo_root: PathBuf,
    bot_author: String,
    branch: String,
}

impl GitCli {
    pub fn new(repo_root: impl Into<PathBuf>, bot_author: &str, branch: &str) -> Self {
        GitCli {
            repo_root: repo_root.into(),
            bot_author: bot_author.to_string(),
            branch: branch.to_string(),
        }
    }

    fn bot_email(&self) -> String {
        format!("{}@users.noreply.localhost", self.bot_author)
    }

    /// Runs `git <args>` in the repo root and returns stdout.
    fn git(&self, args: &[&str]) -> Result<String, ScmError> {
        let command = format!("git {}", args.join(" "));
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_root)
            .args(args)
            .output()
            .map_err(|e| {
                tracing::error!(error = ?e, command = %command, "Failed to launch git process");
                ScmError::Spawn {
                    command: command.clone(),
                    source: e,
                }
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(
                command = %command,
                status = ?output.status,
                stderr = %stderr,
                "Git exited with non-zero code"
            );
            return Err(ScmError::CommandFailed {
                command,
                status: output.status.code().unwrap_or(-1),
                stderr,
            });
        }
        tracing::debug!(command = %command, "Git command succeeded");
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl SourceControl for GitCli {
    async fn changed_files(&self) -> Result<Vec<PathBuf>, ScmError> {
        let stdout = self.git(&["diff", "--name-only", "HEAD~1", "HEAD"])?;
        let files: Vec<PathBuf> = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect();
        tracing::info!(count = files.len(), "Detected changed files");
        Ok(files)
    }

    async fn commit_uid_assignment(&self, path: &Path, uid: &str) -> Result<(), ScmError> {
        let path = path.to_string_lossy().into_owned();
        let name = format!("user.name={}", self.bot_author);
        let email = format!("user.email={}", self.bot_email());
        let author = format!("{} <{}>", self.bot_author, self.bot_email());
        let message = format!("chore: assign doc_uid {uid} to {path}");

        self.git(&["add", path.as_str()])?;
        self.git(&[
            "-c",
            name.as_str(),
            "-c",
            email.as_str(),
            "commit",
            "--author",
            author.as_str(),
            "-m",
            message.as_str(),
        ])?;
        if self.branch.is_empty() {
            self.git(&["push"])?;
        } else {
            let refspec = format!("HEAD:{}", self.branch);
            self.git(&["push", "origin", refspec.as_str()])?;
        }
        tracing::info!(doc_uid = uid, path = %path, "Committed and pushed uid assignment");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failing_command_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitCli::new(dir.path(), "docctl-bot", "main");
        // Not a repository: git refuses and the error carries its message.
        match git.changed_files().await {
            Err(ScmError::CommandFailed { command, stderr, .. }) => {
                assert_eq!(command, "git diff --name-only HEAD~1 HEAD");
                assert!(!stderr.is_empty());
            }
            Err(ScmError::Spawn { .. }) => {} // git not installed
            Ok(files) => panic!("expected failure outside a repository, got {files:?}"),
        }
    }
}
