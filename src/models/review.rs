use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A request to open a review against the trunk branch.
///
/// Constructed once per `open_review` call. Backends must make creation
/// idempotent per (source, target): a retry with no new commits returns the
/// existing open review rather than a duplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub source_branch: String,
    /// Always the trunk branch.
    pub target_branch: String,
    pub title: String,
    pub body: String,
    pub file_paths: Vec<PathBuf>,
}

/// Handle to an open review, stable across idempotent retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewHandle {
    pub url: String,
}
