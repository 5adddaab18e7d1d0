use serde::{Deserialize, Serialize};

/// A caller-supplied description of what changed in the documented artifact.
///
/// The engine never derives this from source code; whatever inspects the
/// artifact (a language server, a diff walker, the agent itself) is an
/// external collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeDescriptor {
    pub changes: Vec<ArtifactChange>,
}

/// One declaration-level change in the documented artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactChange {
    pub kind: ChangeKind,
    /// Name of the declaration that changed, e.g. `/enroll` or `UserService.create`.
    pub target_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_signature: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "added" => Some(Self::Added),
            "removed" => Some(Self::Removed),
            "modified" => Some(Self::Modified),
            _ => None,
        }
    }
}
