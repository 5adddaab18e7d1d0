//! The engine: session-facing operations over the document core and the VCS
//! backend.
//!
//! Everything below this layer is a pure function over its inputs; the engine
//! owns the sequencing rules: re-resolve the repository context before every
//! commit-affecting step, never write while the trunk branch is checked out,
//! and hold the per-session busy flag for exactly one operation at a time.

mod branch;

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::doc::{self, SectionedDocument};
use crate::error::{EngineError, Result};
use crate::models::*;
use crate::registry::SessionRegistry;
use crate::vcs::Vcs;

/// Shared handle both external surfaces (HTTP API, MCP server) delegate to.
/// Cheap to clone; the registry is the only shared mutable state.
#[derive(Clone)]
pub struct Engine {
    registry: SessionRegistry,
    vcs: Arc<dyn Vcs>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(vcs: Arc<dyn Vcs>, config: EngineConfig) -> Self {
        Self {
            registry: SessionRegistry::new(config.session_idle),
            vcs,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    // ============================================================
    // Session lifecycle
    // ============================================================

    /// Open a session: resolve the repository, then register the single
    /// writer for this (caller, repository) pair.
    pub async fn start_session(&self, input: StartSessionInput) -> Result<DocumentationSession> {
        let repo_path = std::fs::canonicalize(&input.repo_path)
            .map_err(|_| EngineError::RepositoryNotFound(input.repo_path.clone()))?;
        let context = self.fresh_context(&repo_path).await?;

        let now = Utc::now();
        let session = DocumentationSession {
            id: Uuid::new_v4(),
            caller_id: input.caller_id,
            active_branch: context.current_branch.clone(),
            context,
            target_file: None,
            created_at: now,
            last_touched_at: now,
        };
        self.registry.start(session.clone())?;
        Ok(session)
    }

    pub fn get_session(&self, id: Uuid) -> Result<DocumentationSession> {
        self.registry.get(id)
    }

    /// End a session. Any in-flight operation finishes first; ending while
    /// one is running is rejected rather than interrupted.
    pub fn end_session(&self, id: Uuid) -> Result<()> {
        self.registry.end(id)
    }

    // ============================================================
    // Branch selection
    // ============================================================

    /// Switch the session to a writable branch, creating it from the trunk
    /// tip when needed. Requesting the trunk itself is a hard stop.
    pub async fn select_branch(
        &self,
        id: Uuid,
        requested: Option<String>,
        create: bool,
    ) -> Result<BranchSelection> {
        let _op = self.registry.begin_op(id)?;
        let session = self.registry.get(id)?;
        let root = session.context.root_path.clone();
        let context = self.fresh_context(&root).await?;

        let (name, created) = match requested {
            Some(name) => {
                if name == context.trunk_branch {
                    // Never silently redirected: the violation must be
                    // visible to the caller.
                    return Err(EngineError::ProtectedBranchViolation(name));
                }
                if self.vcs.branch_exists(&root, &name).await? {
                    (name, false)
                } else if create {
                    self.vcs
                        .create_branch(&root, &name, &context.trunk_branch)
                        .await?;
                    (name, true)
                } else {
                    return Err(EngineError::BranchNotFound(name));
                }
            }
            None => {
                let base = branch::derived_branch_base(
                    &self.config.branch_prefix,
                    session.target_file.as_deref(),
                );
                let name = branch::unique_branch_name(self.vcs.as_ref(), &root, &base).await?;
                self.vcs
                    .create_branch(&root, &name, &context.trunk_branch)
                    .await?;
                (name, true)
            }
        };

        self.vcs.switch_branch(&root, &name).await?;
        self.registry
            .update(id, |s| s.active_branch = name.clone())?;
        Ok(BranchSelection {
            active_branch: name,
            created,
        })
    }

    // ============================================================
    // Document operations
    // ============================================================

    /// Write a fresh machine-authored document and commit it.
    pub async fn write_document(
        &self,
        id: Uuid,
        file_path: &Path,
        title: Option<&str>,
        sections: Vec<(String, String)>,
        message: Option<String>,
    ) -> Result<WriteOutcome> {
        let _op = self.registry.begin_op(id)?;
        let session = self.registry.get(id)?;
        let doc = SectionedDocument::assemble(title, sections)?;
        let section_ids = doc.section_ids();

        let target = self
            .checked_out_for_write(&session, file_path)
            .await?;
        self.persist(&doc, &target)?;

        let commit = self
            .commit(&session, &target, message, "write")
            .await?;
        self.registry.update(id, |s| {
            s.target_file = Some(target.clone());
        })?;

        Ok(WriteOutcome {
            committed: true,
            commit: Some(commit),
            section_ids,
        })
    }

    /// Parse the document as it exists on the active branch.
    pub async fn read_document(&self, id: Uuid, file_path: &Path) -> Result<SectionedDocument> {
        let _op = self.registry.begin_op(id)?;
        let session = self.registry.get(id)?;
        self.registry.touch(id)?;
        let target = resolve_file(&session.context.root_path, file_path)?;
        self.load(&target)
    }

    /// Which sections does the described change invalidate?
    pub async fn analyze_impact(
        &self,
        id: Uuid,
        file_path: &Path,
        descriptor: &ChangeDescriptor,
    ) -> Result<ImpactReport> {
        let _op = self.registry.begin_op(id)?;
        let session = self.registry.get(id)?;
        self.registry.touch(id)?;
        let target = resolve_file(&session.context.root_path, file_path)?;
        let doc = self.load(&target)?;
        Ok(doc::analyze(&doc, descriptor, self.config.impact_threshold))
    }

    /// Merge new machine content into the named sections and commit.
    pub async fn update_sections(
        &self,
        id: Uuid,
        file_path: &Path,
        updates: HashMap<String, String>,
        message: Option<String>,
    ) -> Result<WriteOutcome> {
        let _op = self.registry.begin_op(id)?;
        let session = self.registry.get(id)?;

        let target = self
            .checked_out_for_write(&session, file_path)
            .await?;
        let doc = self.load(&target)?;

        for section_id in updates.keys() {
            if doc.section(section_id).is_none() {
                return Err(EngineError::InvalidInput(format!(
                    "no section '{}' in {}",
                    section_id,
                    target.display()
                )));
            }
        }

        // The caller already decided which sections to rewrite (normally from
        // an analyze_impact report); address exactly those.
        let report = ImpactReport {
            affected: doc
                .sections
                .iter()
                .filter(|s| updates.contains_key(&s.id))
                .map(|s| AffectedSection {
                    section_id: s.id.clone(),
                    reason: "update requested by caller".to_string(),
                    confidence: Confidence::Exact,
                })
                .collect(),
        };
        let (merged, updated_ids) = doc::merge(&doc, &report, &updates);
        self.persist(&merged, &target)?;

        let commit = self
            .commit(&session, &target, message, "update")
            .await?;
        self.registry.update(id, |s| {
            s.target_file = Some(target.clone());
        })?;

        Ok(WriteOutcome {
            committed: true,
            commit: Some(commit),
            section_ids: updated_ids,
        })
    }

    /// Open (or return the existing) review for the session branch.
    pub async fn open_review(&self, id: Uuid, title: &str, body: &str) -> Result<ReviewHandle> {
        let _op = self.registry.begin_op(id)?;
        let session = self.registry.get(id)?;
        let root = session.context.root_path.clone();
        let context = self.fresh_context(&root).await?;

        if session.active_branch == context.trunk_branch {
            return Err(EngineError::ProtectedBranchViolation(
                context.trunk_branch,
            ));
        }
        let request = ReviewRequest {
            source_branch: session.active_branch.clone(),
            target_branch: context.trunk_branch,
            title: title.to_string(),
            body: body.to_string(),
            file_paths: session.target_file.iter().cloned().collect(),
        };
        let handle = self.vcs.open_review(&root, &request).await?;
        self.registry.touch(id)?;
        Ok(handle)
    }

    // ============================================================
    // Internals
    // ============================================================

    async fn fresh_context(&self, path: &Path) -> Result<RepositoryContext> {
        self.vcs
            .resolve_context(path, self.config.trunk_override.as_deref())
            .await
    }

    /// Re-resolve the working tree, refuse to act on the trunk, and make sure
    /// the session branch is actually checked out. Runs before any file is
    /// touched, so a violation performs no write.
    async fn checked_out_for_write(
        &self,
        session: &DocumentationSession,
        file_path: &Path,
    ) -> Result<PathBuf> {
        let root = &session.context.root_path;
        let context = self.fresh_context(root).await?;
        if session.active_branch == context.trunk_branch {
            return Err(EngineError::ProtectedBranchViolation(
                context.trunk_branch,
            ));
        }
        if context.current_branch != session.active_branch {
            // Out-of-band checkout since the last call; put the session
            // branch back rather than writing to whatever is checked out.
            self.vcs
                .switch_branch(root, &session.active_branch)
                .await?;
        }
        resolve_file(root, file_path)
    }

    /// Serialize with the round-trip corruption guard, then write the file.
    fn persist(&self, doc: &SectionedDocument, target: &Path) -> Result<()> {
        let text = doc::serialize(doc);
        let reparsed = doc::parse(&text, &target.display().to_string())?;
        if &reparsed != doc {
            return Err(EngineError::RoundTripMismatch(target.to_path_buf()));
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EngineError::Vcs(format!("cannot create {}: {}", parent.display(), e)))?;
        }
        std::fs::write(target, text)
            .map_err(|e| EngineError::Vcs(format!("cannot write {}: {}", target.display(), e)))
    }

    fn load(&self, target: &Path) -> Result<SectionedDocument> {
        let text = std::fs::read_to_string(target).map_err(|e| {
            EngineError::InvalidInput(format!("cannot read {}: {}", target.display(), e))
        })?;
        doc::parse(&text, &target.display().to_string())
    }

    async fn commit(
        &self,
        session: &DocumentationSession,
        target: &Path,
        message: Option<String>,
        verb: &str,
    ) -> Result<String> {
        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| target.display().to_string());
        let subject =
            message.unwrap_or_else(|| format!("docs: {} {}", verb, file_name));
        let full = format!("{}\n\nDocs-Engine: {}", subject, session.id);
        self.vcs
            .commit_file(&session.context.root_path, target, &full)
            .await
    }
}

/// Resolve a document path against the repository root, rejecting escapes.
fn resolve_file(root: &Path, file: &Path) -> Result<PathBuf> {
    if file
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(EngineError::InvalidInput(format!(
            "path '{}' must not contain '..'",
            file.display()
        )));
    }
    let absolute = if file.is_absolute() {
        file.to_path_buf()
    } else {
        root.join(file)
    };
    if !absolute.starts_with(root) {
        return Err(EngineError::InvalidInput(format!(
            "path '{}' is outside the repository at {}",
            file.display(),
            root.display()
        )));
    }
    Ok(absolute)
}
