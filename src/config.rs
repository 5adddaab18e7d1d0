//! Engine tunables.

use std::time::Duration;

/// Runtime configuration for the engine. Constructed from CLI flags in the
/// binary; tests build one directly with the defaults they need.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Explicit trunk branch name. When set, trunk resolution skips the
    /// conventional and remote-reported fallbacks.
    pub trunk_override: Option<String>,
    /// Prefix for derived feature branch names (`<prefix>/<file-slug>-<date>`).
    pub branch_prefix: String,
    /// Idle duration after which a session expires.
    pub session_idle: Duration,
    /// Bound on every external version-control call.
    pub vcs_timeout: Duration,
    /// Token overlap ratio above which a body match counts as `Probable`.
    pub impact_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trunk_override: None,
            branch_prefix: "docs".to_string(),
            session_idle: Duration::from_secs(30 * 60),
            vcs_timeout: Duration::from_secs(30),
            impact_threshold: 0.5,
        }
    }
}
