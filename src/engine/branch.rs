//! Branch guard helpers: derived branch names and collision avoidance.

use std::path::Path;

use chrono::Utc;

use crate::error::Result;
use crate::vcs::Vcs;

/// Derive a deterministic branch name from the target file and today's date,
/// e.g. `docs/enrollment-api-20260807`.
pub fn derived_branch_base(prefix: &str, target_file: Option<&Path>) -> String {
    let slug = target_file
        .and_then(|p| p.file_stem())
        .map(|stem| slugify(&stem.to_string_lossy()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "session".to_string());
    format!("{}/{}-{}", prefix, slug, Utc::now().format("%Y%m%d"))
}

/// Append a numeric suffix until the name collides with no existing branch.
pub async fn unique_branch_name(vcs: &dyn Vcs, root: &Path, base: &str) -> Result<String> {
    if !vcs.branch_exists(root, base).await? {
        return Ok(base.to_string());
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{}-{}", base, suffix);
        if !vcs.branch_exists(root, &candidate).await? {
            return Ok(candidate);
        }
        suffix += 1;
    }
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
