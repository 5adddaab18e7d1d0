//! Engine error taxonomy.
//!
//! Lower layers (resolver, document model, analyzer, merger) raise these and
//! never recover; the session-facing engine operations are the only layer
//! that decides what is retryable. The HTTP and MCP surfaces map kinds to
//! their own wire representations.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    // -- Caller errors: never retried automatically --
    #[error("no repository found at {0}")]
    RepositoryNotFound(PathBuf),

    #[error("session {0} not found or expired")]
    SessionNotFound(uuid::Uuid),

    #[error("branch '{0}' does not exist")]
    BranchNotFound(String),

    #[error("refusing to write on protected trunk branch '{0}'")]
    ProtectedBranchViolation(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // -- State conflicts: retryable after the caller resolves them --
    #[error("an active session already exists for caller '{caller}' on {repo}")]
    SessionConflict { caller: String, repo: PathBuf },

    #[error("session {0} has another operation in flight")]
    SessionBusy(uuid::Uuid),

    #[error("nothing to commit for {0}")]
    NothingToCommit(PathBuf),

    // -- Backend failures: transient, safe to retry with the same inputs --
    #[error("version-control operation '{operation}' timed out after {seconds}s")]
    VcsTimeout { operation: String, seconds: u64 },

    #[error("version-control backend failed: {0}")]
    Vcs(String),

    // -- Corruption guards: fatal for the affected file, never repaired --
    #[error("malformed marker in {file} at line {line}: {reason}")]
    MalformedMarker {
        file: String,
        line: usize,
        reason: String,
    },

    #[error("duplicate section heading '{0}'")]
    DuplicateHeading(String),

    #[error("no trunk branch could be determined for {0} and none is configured")]
    AmbiguousTrunk(PathBuf),

    #[error("document round trip mismatch for {0}; refusing to write")]
    RoundTripMismatch(PathBuf),
}

impl EngineError {
    /// Whether a caller may retry the same call unchanged (backend failures).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::VcsTimeout { .. } | Self::Vcs(_))
    }

    /// Whether the error is a state conflict the caller can resolve first.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::SessionConflict { .. } | Self::SessionBusy(_) | Self::NothingToCommit(_)
        )
    }
}
