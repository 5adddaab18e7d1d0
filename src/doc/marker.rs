//! The machine-span marker convention.
//!
//! A machine-authored span is delimited by paired HTML comments carrying the
//! owning section id:
//!
//! ```text
//! <!-- scribe:begin api -->
//! `POST /enroll`
//! <!-- scribe:end api -->
//! ```
//!
//! Any line that looks like a scribe marker but does not parse as one is a
//! hard error, never a guess: misclassifying human content as machine content
//! is how human edits get destroyed.

/// Prefix shared by every marker line.
const MARKER_PREFIX: &str = "<!-- scribe:";
const MARKER_SUFFIX: &str = "-->";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Begin(String),
    End(String),
}

/// Outcome of classifying one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Not a marker at all; plain content.
    Text,
    Marker(Marker),
    /// Looks like a marker but is not well formed.
    Malformed(String),
}

/// Classify a single line of input.
pub fn classify(line: &str) -> Line {
    let trimmed = line.trim();
    if !trimmed.starts_with(MARKER_PREFIX) {
        return Line::Text;
    }
    let Some(inner) = trimmed
        .strip_prefix(MARKER_PREFIX)
        .and_then(|rest| rest.strip_suffix(MARKER_SUFFIX))
    else {
        return Line::Malformed("marker comment is not terminated with '-->'".to_string());
    };
    let mut parts = inner.trim().split_whitespace();
    let verb = parts.next().unwrap_or_default();
    let id = parts.next().unwrap_or_default();
    if id.is_empty() || parts.next().is_some() {
        return Line::Malformed(format!(
            "expected '<!-- scribe:<begin|end> <section-id> -->', got '{}'",
            trimmed
        ));
    }
    match verb {
        "begin" => Line::Marker(Marker::Begin(id.to_string())),
        "end" => Line::Marker(Marker::End(id.to_string())),
        other => Line::Malformed(format!("unrecognized marker verb '{}'", other)),
    }
}

pub fn begin(section_id: &str) -> String {
    format!("{}begin {} {}", MARKER_PREFIX, section_id, MARKER_SUFFIX)
}

pub fn end(section_id: &str) -> String {
    format!("{}end {} {}", MARKER_PREFIX, section_id, MARKER_SUFFIX)
}
