//! Parse and serialize sectioned documents.
//!
//! Level-2 markdown headings (`## `) open sections. Within a section,
//! contiguous runs of lines between a begin/end marker pair are one machine
//! span; everything else is human. An unmarked legacy document parses to one
//! human span per section, so nothing in it is ever overwritten.

use super::marker::{self, Line, Marker};
use super::{Section, SectionedDocument, Span};
use crate::error::{EngineError, Result};

const HEADING_PREFIX: &str = "## ";

/// Parse document text. `file` only labels errors.
pub fn parse(input: &str, file: &str) -> Result<SectionedDocument> {
    let mut doc = SectionedDocument::default();
    let mut current: Option<Section> = None;
    // Open machine block: (section id from the begin marker, accumulated text).
    let mut machine: Option<(String, String)> = None;
    let mut human_buf = String::new();

    let malformed = |line_no: usize, reason: String| EngineError::MalformedMarker {
        file: file.to_string(),
        line: line_no,
        reason,
    };

    for (idx, line) in input.split_inclusive('\n').enumerate() {
        let line_no = idx + 1;

        if line.starts_with(HEADING_PREFIX) {
            if machine.is_some() {
                return Err(malformed(
                    line_no,
                    "machine span is not closed before the next section heading".to_string(),
                ));
            }
            flush_section(&mut doc, &mut current, &mut human_buf)?;
            let heading = line[HEADING_PREFIX.len()..].trim_end_matches(['\n', '\r']);
            current = Some(Section::new(heading));
            continue;
        }

        match marker::classify(line) {
            Line::Text => {
                if let Some((_, text)) = machine.as_mut() {
                    text.push_str(line);
                } else if current.is_some() {
                    human_buf.push_str(line);
                } else {
                    doc.preamble.push_str(line);
                }
            }
            Line::Marker(Marker::Begin(id)) => {
                let Some(section) = current.as_ref() else {
                    return Err(malformed(
                        line_no,
                        format!("begin marker for '{}' before any section heading", id),
                    ));
                };
                if machine.is_some() {
                    return Err(malformed(
                        line_no,
                        format!("nested begin marker for '{}'", id),
                    ));
                }
                if id != section.id {
                    return Err(malformed(
                        line_no,
                        format!(
                            "marker owns section '{}' but appears inside section '{}'",
                            id, section.id
                        ),
                    ));
                }
                if !human_buf.is_empty() {
                    current
                        .as_mut()
                        .expect("section checked above")
                        .spans
                        .push(Span::human(std::mem::take(&mut human_buf)));
                }
                machine = Some((id, String::new()));
            }
            Line::Marker(Marker::End(id)) => {
                let Some((open_id, text)) = machine.take() else {
                    return Err(malformed(
                        line_no,
                        format!("end marker for '{}' without a matching begin", id),
                    ));
                };
                if id != open_id {
                    return Err(malformed(
                        line_no,
                        format!("end marker for '{}' closes begin marker for '{}'", id, open_id),
                    ));
                }
                current
                    .as_mut()
                    .expect("machine block only opens inside a section")
                    .spans
                    .push(Span::machine(text));
            }
            Line::Malformed(reason) => return Err(malformed(line_no, reason)),
        }
    }

    if let Some((id, _)) = machine {
        return Err(malformed(
            input.lines().count(),
            format!("machine span for '{}' is never closed", id),
        ));
    }
    flush_section(&mut doc, &mut current, &mut human_buf)?;
    Ok(doc)
}

fn flush_section(
    doc: &mut SectionedDocument,
    current: &mut Option<Section>,
    human_buf: &mut String,
) -> Result<()> {
    if let Some(mut section) = current.take() {
        if !human_buf.is_empty() {
            section.spans.push(Span::human(std::mem::take(human_buf)));
        }
        doc.push_section(section)?;
    }
    Ok(())
}

/// Serialize a document back to text. Inverse of [`parse`] for any document
/// `parse` or the engine produces.
pub fn serialize(doc: &SectionedDocument) -> String {
    let mut out = doc.preamble.clone();
    for section in &doc.sections {
        ensure_line_break(&mut out);
        out.push_str(HEADING_PREFIX);
        out.push_str(&section.heading);
        out.push('\n');
        for span in &section.spans {
            if span.is_machine() {
                ensure_line_break(&mut out);
                out.push_str(&marker::begin(&section.id));
                out.push('\n');
                out.push_str(&span.text);
                ensure_line_break(&mut out);
                out.push_str(&marker::end(&section.id));
                out.push('\n');
            } else {
                out.push_str(&span.text);
            }
        }
    }
    out
}

fn ensure_line_break(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}
