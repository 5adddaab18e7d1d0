use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RepositoryContext;

/// The scoped, single-writer context binding a caller to one repository and
/// branch across a sequence of tool calls.
///
/// Sessions are **ephemeral** and intentionally non-durable: a process restart
/// simply forces callers to start a new session. Exactly one session may be
/// active per (caller, repository) pair; a second `start` is rejected so two
/// branches are never created concurrently for the same logical write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentationSession {
    pub id: Uuid,
    /// Opaque identifier of the tool-invocation host driving this session.
    pub caller_id: String,
    /// Repository snapshot taken when the session started. Commit-affecting
    /// operations re-resolve their own fresh snapshot before acting.
    pub context: RepositoryContext,
    /// The feature branch all writes in this session target. Never the trunk.
    pub active_branch: String,
    /// Documentation file most recently written, if any.
    pub target_file: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub last_touched_at: DateTime<Utc>,
}

/// Input for starting a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionInput {
    pub repo_path: PathBuf,
    pub caller_id: String,
}

/// Result of a branch selection call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchSelection {
    pub active_branch: String,
    /// Whether the branch was created by this call (as opposed to switched to).
    pub created: bool,
}

/// Result of a document write or section update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub committed: bool,
    /// Commit reference reported by the backend, when a commit was made.
    pub commit: Option<String>,
    /// Ids of the sections this write created or replaced.
    pub section_ids: Vec<String>,
}

/// Input for selecting or creating the session's write branch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectBranchInput {
    /// Branch to select. Omitted: a name is derived from the target file and
    /// the date.
    pub name: Option<String>,
    /// Whether a missing `name` may be created from the trunk tip.
    #[serde(default = "default_true")]
    pub create: bool,
}

/// One section of a fresh document write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionContentInput {
    pub heading: String,
    pub content: String,
}

/// Input for writing a fresh machine-authored document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteDocumentInput {
    pub file_path: PathBuf,
    #[serde(default)]
    pub title: Option<String>,
    pub sections: Vec<SectionContentInput>,
    /// Commit subject; defaulted from the file name when omitted.
    #[serde(default)]
    pub message: Option<String>,
}

/// Input for impact analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeImpactInput {
    pub file_path: PathBuf,
    pub changes: Vec<super::ArtifactChange>,
}

/// Input for a surgical section update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSectionsInput {
    pub file_path: PathBuf,
    /// New machine content keyed by section id.
    pub updates: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Input for opening a review against the trunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenReviewInput {
    pub title: String,
    pub body: String,
}

fn default_true() -> bool {
    true
}
