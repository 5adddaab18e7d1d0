//! Version-control backend seam.
//!
//! The engine never talks to a VCS binary directly; all mutation of the
//! working tree's branch state goes through this narrow trait so the engine
//! logic is testable against [`InMemoryVcs`] without spawning processes.

mod git;
mod memory;

pub use git::GitCli;
pub use memory::InMemoryVcs;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{RepositoryContext, ReviewHandle, ReviewRequest};

/// Narrow interface over a version-control backend.
///
/// Implementations must be safe to retry: branch creation, commit and review
/// creation are invoked again with identical inputs after transient failures.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Inspect the working copy at `path`. Read-only.
    ///
    /// Trunk resolution order: `trunk_override` when given, then the
    /// conventional defaults (`main`, `master`) when such a branch exists,
    /// then the remote's reported default branch.
    async fn resolve_context(
        &self,
        path: &Path,
        trunk_override: Option<&str>,
    ) -> Result<RepositoryContext>;

    async fn branch_exists(&self, root: &Path, name: &str) -> Result<bool>;

    /// Create `name` pointing at `from` without switching to it.
    async fn create_branch(&self, root: &Path, name: &str, from: &str) -> Result<()>;

    async fn switch_branch(&self, root: &Path, name: &str) -> Result<()>;

    /// Stage exactly `file` and commit it. Returns the new commit reference.
    /// Fails with `NothingToCommit` when the file has no staged difference.
    async fn commit_file(&self, root: &Path, file: &Path, message: &str) -> Result<String>;

    /// Open (or return the already-open) review for the request's branch
    /// pair. Idempotent per (source, target).
    async fn open_review(&self, root: &Path, request: &ReviewRequest) -> Result<ReviewHandle>;
}
