//! In-memory VCS fake for tests.
//!
//! Models exactly what the engine observes through the [`Vcs`] trait: a set
//! of branches, the checked-out branch, per-file committed content, and open
//! reviews keyed by branch pair. File contents are read from the real
//! filesystem (tests point the fake at a temp directory), so "nothing to
//! commit" behaves like the real backend: an identical rewrite is rejected.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{EngineError, Result};
use crate::models::{RepositoryContext, ReviewHandle, ReviewRequest};

use super::Vcs;

#[derive(Debug)]
struct Inner {
    root: PathBuf,
    trunk: String,
    branches: Vec<String>,
    current: String,
    /// Last committed content per file, used for the no-op commit check.
    committed: HashMap<PathBuf, String>,
    /// Commit log: (branch, file, message, ref).
    commits: Vec<(String, PathBuf, String, String)>,
    /// Open reviews keyed by (source, target).
    reviews: HashMap<(String, String), ReviewHandle>,
}

#[derive(Debug, Clone)]
pub struct InMemoryVcs {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryVcs {
    pub fn new(root: impl Into<PathBuf>, trunk: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                root: root.into(),
                trunk: trunk.to_string(),
                branches: vec![trunk.to_string()],
                current: trunk.to_string(),
                committed: HashMap::new(),
                commits: Vec::new(),
                reviews: HashMap::new(),
            })),
        }
    }

    // -- test observers --

    pub fn current_branch(&self) -> String {
        self.lock().current.clone()
    }

    pub fn branch_names(&self) -> Vec<String> {
        self.lock().branches.clone()
    }

    pub fn commit_count(&self) -> usize {
        self.lock().commits.len()
    }

    pub fn last_commit_message(&self) -> Option<String> {
        self.lock().commits.last().map(|(_, _, m, _)| m.clone())
    }

    pub fn review_count(&self) -> usize {
        self.lock().reviews.len()
    }

    /// Simulate an out-of-band checkout by a human operator.
    pub fn force_checkout(&self, name: &str) {
        let mut inner = self.lock();
        if !inner.branches.iter().any(|b| b == name) {
            inner.branches.push(name.to_string());
        }
        inner.current = name.to_string();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("vcs fake lock poisoned")
    }
}

#[async_trait]
impl Vcs for InMemoryVcs {
    async fn resolve_context(
        &self,
        path: &Path,
        trunk_override: Option<&str>,
    ) -> Result<RepositoryContext> {
        let inner = self.lock();
        if !path.starts_with(&inner.root) {
            return Err(EngineError::RepositoryNotFound(path.to_path_buf()));
        }
        Ok(RepositoryContext {
            root_path: inner.root.clone(),
            trunk_branch: trunk_override.unwrap_or(&inner.trunk).to_string(),
            current_branch: inner.current.clone(),
            is_clean: true,
        })
    }

    async fn branch_exists(&self, _root: &Path, name: &str) -> Result<bool> {
        Ok(self.lock().branches.iter().any(|b| b == name))
    }

    async fn create_branch(&self, _root: &Path, name: &str, from: &str) -> Result<()> {
        let mut inner = self.lock();
        if !inner.branches.iter().any(|b| b == from) {
            return Err(EngineError::BranchNotFound(from.to_string()));
        }
        inner.branches.push(name.to_string());
        Ok(())
    }

    async fn switch_branch(&self, _root: &Path, name: &str) -> Result<()> {
        let mut inner = self.lock();
        if !inner.branches.iter().any(|b| b == name) {
            return Err(EngineError::BranchNotFound(name.to_string()));
        }
        inner.current = name.to_string();
        Ok(())
    }

    async fn commit_file(&self, root: &Path, file: &Path, message: &str) -> Result<String> {
        let absolute = if file.is_absolute() {
            file.to_path_buf()
        } else {
            root.join(file)
        };
        let content = std::fs::read_to_string(&absolute)
            .map_err(|e| EngineError::Vcs(format!("cannot read {}: {}", absolute.display(), e)))?;

        let mut inner = self.lock();
        if inner.committed.get(&absolute) == Some(&content) {
            return Err(EngineError::NothingToCommit(file.to_path_buf()));
        }
        inner.committed.insert(absolute.clone(), content);
        let reference = format!("commit-{}", inner.commits.len() + 1);
        let branch = inner.current.clone();
        inner
            .commits
            .push((branch, absolute, message.to_string(), reference.clone()));
        Ok(reference)
    }

    async fn open_review(&self, _root: &Path, request: &ReviewRequest) -> Result<ReviewHandle> {
        let mut inner = self.lock();
        let key = (
            request.source_branch.clone(),
            request.target_branch.clone(),
        );
        if let Some(existing) = inner.reviews.get(&key) {
            return Ok(existing.clone());
        }
        let handle = ReviewHandle {
            url: format!(
                "memory://reviews/{}...{}",
                request.target_branch, request.source_branch
            ),
        };
        inner.reviews.insert(key, handle.clone());
        Ok(handle)
    }
}
