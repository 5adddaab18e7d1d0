//! Domain models for Scribe.
//!
//! # Core Concepts
//!
//! ## Transient Values
//!
//! Recomputed per call and never cached across calls, because the working
//! copy can change underneath the process:
//!
//! - [`RepositoryContext`]: snapshot of a working copy (trunk, current branch,
//!   dirty state).
//! - [`ImpactReport`]: the set of sections invalidated by a described change.
//!
//! ## Session State
//!
//! - [`DocumentationSession`]: the single-writer context binding a caller to
//!   one repository and branch across a sequence of calls. Owned exclusively
//!   by the session registry and torn down on completion or idle expiry.
//!
//! The document model itself ([`crate::doc::SectionedDocument`]) lives in
//! `doc`, next to the parser and merger that maintain its invariants.

mod change;
mod context;
mod impact;
mod review;
mod session;

pub use change::*;
pub use context::*;
pub use impact::*;
pub use review::*;
pub use session::*;
