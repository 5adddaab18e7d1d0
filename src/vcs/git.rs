//! Git backend: shells out to the `git` binary.
//!
//! Every invocation runs under a bounded timeout; on expiry the operation
//! fails with `VcsTimeout` and the caller re-resolves the working tree state
//! before the next commit-affecting step instead of trusting memory.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{EngineError, Result};
use crate::models::{RepositoryContext, ReviewHandle, ReviewRequest};

use super::Vcs;

#[derive(Debug, Clone)]
pub struct GitCli {
    timeout: Duration,
}

impl GitCli {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run `git` and return trimmed stdout; a non-zero exit is a backend error.
    async fn run(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let output = self.output(dir, args).await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(EngineError::Vcs(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr
            )))
        }
    }

    /// Run `git` where a non-zero exit is an answer, not an error.
    async fn check(&self, dir: &Path, args: &[&str]) -> Result<bool> {
        Ok(self.output(dir, args).await?.status.success())
    }

    async fn output(&self, dir: &Path, args: &[&str]) -> Result<std::process::Output> {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(dir).kill_on_drop(true);
        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|e| EngineError::Vcs(format!("failed to spawn git: {}", e))),
            Err(_) => Err(EngineError::VcsTimeout {
                operation: format!("git {}", args.join(" ")),
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    async fn resolve_trunk(&self, root: &Path, trunk_override: Option<&str>) -> Result<String> {
        if let Some(trunk) = trunk_override {
            return Ok(trunk.to_string());
        }
        for conventional in ["main", "master"] {
            if self.local_branch_exists(root, conventional).await? {
                return Ok(conventional.to_string());
            }
        }
        // Fall back to the default branch the remote reports.
        if let Ok(head) = self
            .run(root, &["symbolic-ref", "refs/remotes/origin/HEAD"])
            .await
        {
            if let Some(name) = head.strip_prefix("refs/remotes/origin/") {
                if !name.is_empty() {
                    return Ok(name.to_string());
                }
            }
        }
        Err(EngineError::AmbiguousTrunk(root.to_path_buf()))
    }

    async fn local_branch_exists(&self, root: &Path, name: &str) -> Result<bool> {
        self.check(
            root,
            &[
                "rev-parse",
                "--verify",
                "--quiet",
                &format!("refs/heads/{}", name),
            ],
        )
        .await
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn resolve_context(
        &self,
        path: &Path,
        trunk_override: Option<&str>,
    ) -> Result<RepositoryContext> {
        let root = self
            .run(path, &["rev-parse", "--show-toplevel"])
            .await
            .map_err(|e| match e {
                EngineError::Vcs(_) => EngineError::RepositoryNotFound(path.to_path_buf()),
                other => other,
            })?;
        let root = std::path::PathBuf::from(root);

        let current_branch = self.run(&root, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        let status = self.run(&root, &["status", "--porcelain"]).await?;
        let trunk_branch = self.resolve_trunk(&root, trunk_override).await?;

        Ok(RepositoryContext {
            root_path: root,
            trunk_branch,
            current_branch,
            is_clean: status.is_empty(),
        })
    }

    async fn branch_exists(&self, root: &Path, name: &str) -> Result<bool> {
        self.local_branch_exists(root, name).await
    }

    async fn create_branch(&self, root: &Path, name: &str, from: &str) -> Result<()> {
        self.run(root, &["branch", name, from]).await?;
        Ok(())
    }

    async fn switch_branch(&self, root: &Path, name: &str) -> Result<()> {
        if !self.local_branch_exists(root, name).await? {
            return Err(EngineError::BranchNotFound(name.to_string()));
        }
        self.run(root, &["checkout", name]).await?;
        Ok(())
    }

    async fn commit_file(&self, root: &Path, file: &Path, message: &str) -> Result<String> {
        let file_arg = file.to_string_lossy();
        self.run(root, &["add", "--", &file_arg]).await?;
        // Exit 0 means the staged file is identical to HEAD.
        if self
            .check(root, &["diff", "--cached", "--quiet", "--", &file_arg])
            .await?
        {
            return Err(EngineError::NothingToCommit(file.to_path_buf()));
        }
        self.run(root, &["commit", "-m", message, "--", &file_arg])
            .await?;
        self.run(root, &["rev-parse", "HEAD"]).await
    }

    async fn open_review(&self, root: &Path, request: &ReviewRequest) -> Result<ReviewHandle> {
        // Safe to repeat: pushing an unchanged branch is a no-op.
        self.run(
            root,
            &["push", "--set-upstream", "origin", &request.source_branch],
        )
        .await?;

        let remote = self.run(root, &["remote", "get-url", "origin"]).await?;
        let base = normalize_remote_url(&remote).ok_or_else(|| {
            EngineError::Vcs(format!("cannot derive a review URL from remote '{}'", remote))
        })?;
        // A compare URL is stable per branch pair, which is exactly the
        // idempotency the review contract asks for. Opening the actual
        // request is left to the hosting platform the URL points at.
        Ok(ReviewHandle {
            url: format!(
                "{}/compare/{}...{}",
                base, request.target_branch, request.source_branch
            ),
        })
    }
}

/// Turn an origin URL (ssh or https) into a browsable https base URL.
fn normalize_remote_url(remote: &str) -> Option<String> {
    let remote = remote.trim().trim_end_matches(".git");
    if remote.is_empty() {
        return None;
    }
    if let Some(rest) = remote.strip_prefix("git@") {
        let (host, path) = rest.split_once(':')?;
        return Some(format!("https://{}/{}", host, path));
    }
    if remote.starts_with("https://") || remote.starts_with("http://") {
        return Some(remote.to_string());
    }
    if let Some(rest) = remote.strip_prefix("ssh://git@") {
        let (host, path) = rest.split_once('/')?;
        return Some(format!("https://{}/{}", host, path));
    }
    None
}
