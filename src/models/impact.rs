use serde::{Deserialize, Serialize};

/// The set of sections invalidated by a [`super::ChangeDescriptor`].
///
/// Produced fresh on every `analyze_impact` call and never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImpactReport {
    pub affected: Vec<AffectedSection>,
}

impl ImpactReport {
    pub fn is_empty(&self) -> bool {
        self.affected.is_empty()
    }

    pub fn contains(&self, section_id: &str) -> bool {
        self.affected.iter().any(|a| a.section_id == section_id)
    }
}

/// One section flagged as stale, with the change that flagged it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectedSection {
    pub section_id: String,
    /// Human-readable account of why the section was flagged.
    pub reason: String,
    pub confidence: Confidence,
}

/// Match confidence. `Weak` matches (below threshold) are excluded from the
/// report entirely, so only these two levels appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Probable,
    Exact,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Probable => "probable",
            Self::Exact => "exact",
        }
    }
}
