//! The sectioned document model.
//!
//! A documentation file is an ordered sequence of named sections, each an
//! ordered list of provenance-tagged spans. Provenance is a tagged variant on
//! the span, not a formatting heuristic: the document model is the single
//! source of truth for what is safe to overwrite. Anything not explicitly
//! marked machine-authored is human-authored and is never rewritten.
//!
//! # Invariants
//!
//! - Section headings are unique within a document.
//! - Section order is stable across merges unless a section is added/removed.
//! - A section's raw body is exactly the concatenation of its spans in order.
//! - `parse(serialize(d)) == d` for any document produced by `serialize`.

mod impact;
mod marker;
mod merge;
mod parser;

pub use impact::analyze;
pub use merge::merge;
pub use parser::{parse, serialize};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Who owns a span of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Written by the engine; safe to replace on merge.
    Machine,
    /// Written by a human (or of unknown origin); never overwritten.
    Human,
}

/// A contiguous run of text within a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub provenance: Provenance,
    pub text: String,
}

impl Span {
    pub fn machine(text: impl Into<String>) -> Self {
        Self {
            provenance: Provenance::Machine,
            text: text.into(),
        }
    }

    pub fn human(text: impl Into<String>) -> Self {
        Self {
            provenance: Provenance::Human,
            text: text.into(),
        }
    }

    pub fn is_machine(&self) -> bool {
        self.provenance == Provenance::Machine
    }
}

/// A named, addressable block of a documentation file, the unit of surgical
/// update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Derived from the heading text; stable across edits to the body.
    pub id: String,
    pub heading: String,
    /// Empty for a section with no body.
    pub spans: Vec<Span>,
}

impl Section {
    pub fn new(heading: impl Into<String>) -> Self {
        let heading = heading.into().trim().to_string();
        Self {
            id: section_id(&heading),
            heading,
            spans: Vec::new(),
        }
    }

    /// A section whose whole body is one machine span.
    pub fn machine(heading: impl Into<String>, content: impl Into<String>) -> Self {
        let mut section = Self::new(heading);
        let mut text = content.into();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        section.spans.push(Span::machine(text));
        section
    }

    /// The body as stored: exactly the concatenation of spans in order.
    pub fn raw_body(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    /// Concatenated machine-authored text, for impact matching.
    pub fn machine_text(&self) -> String {
        self.spans
            .iter()
            .filter(|s| s.is_machine())
            .map(|s| s.text.as_str())
            .collect()
    }

    pub fn has_machine_span(&self) -> bool {
        self.spans.iter().any(Span::is_machine)
    }

    pub fn has_human_span(&self) -> bool {
        self.spans.iter().any(|s| !s.is_machine())
    }
}

/// An ordered sequence of sections plus the preserved text (title line etc.)
/// before the first section heading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionedDocument {
    /// Everything before the first `## ` heading, byte-preserved. Not a
    /// section: never matched by the analyzer, never touched by the merger.
    pub preamble: String,
    pub sections: Vec<Section>,
}

impl SectionedDocument {
    /// Build a fresh machine-authored document from an optional title and
    /// `(heading, content)` pairs.
    pub fn assemble(
        title: Option<&str>,
        sections: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self> {
        let mut doc = Self {
            preamble: match title {
                Some(t) => format!("# {}\n\n", t),
                None => String::new(),
            },
            sections: Vec::new(),
        };
        for (heading, content) in sections {
            doc.push_section(Section::machine(heading, content))?;
        }
        Ok(doc)
    }

    /// Append a section, enforcing heading uniqueness.
    pub fn push_section(&mut self, section: Section) -> Result<()> {
        if self.sections.iter().any(|s| s.id == section.id) {
            return Err(EngineError::DuplicateHeading(section.heading));
        }
        self.sections.push(section);
        Ok(())
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn section_ids(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.id.clone()).collect()
    }
}

/// Derive a stable section id from heading text: lowercase, alphanumeric runs
/// joined by single dashes.
pub fn section_id(heading: &str) -> String {
    let mut id = String::with_capacity(heading.len());
    let mut pending_dash = false;
    for c in heading.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !id.is_empty() {
                id.push('-');
            }
            pending_dash = false;
            id.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if id.is_empty() {
        "section".to_string()
    } else {
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_id_normalizes_heading_text() {
        assert_eq!(section_id("API Reference"), "api-reference");
        assert_eq!(section_id("  Errors & Retries  "), "errors-retries");
        assert_eq!(section_id("v2.1 (draft)"), "v2-1-draft");
        assert_eq!(section_id("***"), "section");
    }

    #[test]
    fn raw_body_is_span_concatenation() {
        let mut section = Section::new("Usage");
        section.spans.push(Span::human("Hand-written intro.\n"));
        section.spans.push(Span::machine("Generated table.\n"));
        assert_eq!(section.raw_body(), "Hand-written intro.\nGenerated table.\n");
    }

    #[test]
    fn assemble_rejects_duplicate_headings() {
        let result = SectionedDocument::assemble(
            None,
            vec![
                ("API".to_string(), "a".to_string()),
                ("api!".to_string(), "b".to_string()),
            ],
        );
        assert!(matches!(result, Err(EngineError::DuplicateHeading(_))));
    }
}
