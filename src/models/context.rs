use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Immutable snapshot of a working copy.
///
/// Always recomputed on demand; never cached across sessions. Every
/// commit-affecting engine step re-resolves this before acting, so stale
/// in-memory state degrades to a clear backend error instead of corruption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryContext {
    /// Root of the version-controlled tree.
    pub root_path: PathBuf,
    /// The protected branch writes must never target.
    pub trunk_branch: String,
    /// Branch currently checked out.
    pub current_branch: String,
    /// Whether the working tree has no uncommitted changes.
    pub is_clean: bool,
}
