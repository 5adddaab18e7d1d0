//! Request and response types for MCP tools.

use std::collections::HashMap;

use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================
// Request Types
// ============================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StartSessionRequest {
    #[schemars(description = "Absolute path to (or inside) the repository to document")]
    pub repo_path: String,
    #[schemars(
        description = "Stable identifier of the calling agent host; one active session per caller and repository"
    )]
    pub caller_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SelectBranchRequest {
    #[schemars(description = "The UUID of the session")]
    pub session_id: String,
    #[schemars(
        description = "Branch to write on. Omit to derive a name from the target file and date. Requesting the trunk branch always fails."
    )]
    #[serde(default)]
    pub name: Option<String>,
    #[schemars(
        description = "Whether a missing branch may be created from the trunk tip. Defaults to true."
    )]
    #[serde(default = "default_true")]
    pub create: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SectionInput {
    #[schemars(description = "Section heading, e.g. 'API'. Must be unique within the document.")]
    pub heading: String,
    #[schemars(description = "Machine-authored section body (markdown)")]
    pub content: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteDocumentRequest {
    #[schemars(description = "The UUID of the session")]
    pub session_id: String,
    #[schemars(description = "Document path relative to the repository root")]
    pub file_path: String,
    #[schemars(description = "Optional document title, emitted as a top-level heading")]
    #[serde(default)]
    pub title: Option<String>,
    #[schemars(description = "Sections of the fresh document, in order")]
    pub sections: Vec<SectionInput>,
    #[schemars(description = "Commit subject; defaulted from the file name when omitted")]
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadDocumentRequest {
    #[schemars(description = "The UUID of the session")]
    pub session_id: String,
    #[schemars(description = "Document path relative to the repository root")]
    pub file_path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ChangeInput {
    #[schemars(description = "Kind of change: 'added', 'removed', or 'modified'")]
    pub kind: String,
    #[schemars(description = "Name of the declaration that changed, e.g. '/enroll'")]
    pub target_name: String,
    #[schemars(description = "Signature before the change, if any")]
    #[serde(default)]
    pub before_signature: Option<String>,
    #[schemars(description = "Signature after the change, if any")]
    #[serde(default)]
    pub after_signature: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AnalyzeImpactRequest {
    #[schemars(description = "The UUID of the session")]
    pub session_id: String,
    #[schemars(description = "Document path relative to the repository root")]
    pub file_path: String,
    #[schemars(description = "What changed in the documented artifact")]
    pub changes: Vec<ChangeInput>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateSectionsRequest {
    #[schemars(description = "The UUID of the session")]
    pub session_id: String,
    #[schemars(description = "Document path relative to the repository root")]
    pub file_path: String,
    #[schemars(
        description = "New machine content keyed by section id (ids come from analyze_impact or read_document)"
    )]
    pub updates: HashMap<String, String>,
    #[schemars(description = "Commit subject; defaulted from the file name when omitted")]
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct OpenReviewRequest {
    #[schemars(description = "The UUID of the session")]
    pub session_id: String,
    #[schemars(description = "Review title")]
    pub title: String,
    #[schemars(description = "Review body describing the documentation change")]
    pub body: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EndSessionRequest {
    #[schemars(description = "The UUID of the session to end")]
    pub session_id: String,
}

fn default_true() -> bool {
    true
}

// ============================================================
// Response Types
// ============================================================

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SessionResponse {
    pub session_id: String,
    /// Branch currently checked out. Writes are rejected until this differs
    /// from the trunk (call select_branch).
    pub active_branch: String,
    pub trunk_branch: String,
    pub repo_root: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct BranchResponse {
    pub active_branch: String,
    pub created: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct WriteResponse {
    pub committed: bool,
    pub commit: Option<String>,
    pub section_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SectionView {
    pub id: String,
    pub heading: String,
    /// Concatenated machine-authored text, empty for human-only sections.
    pub machine_content: String,
    pub has_human_content: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DocumentResponse {
    pub file_path: String,
    pub sections: Vec<SectionView>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AffectedSectionView {
    pub section_id: String,
    pub reason: String,
    /// 'exact' or 'probable'; weak matches are excluded entirely.
    pub confidence: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ImpactResponse {
    pub affected: Vec<AffectedSectionView>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ReviewResponse {
    pub review_url: String,
}
