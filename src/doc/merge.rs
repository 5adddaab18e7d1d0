//! The surgical merger.
//!
//! Rewrites only the machine spans of sections named in the impact report
//! that have replacement content. Human spans keep their exact bytes and
//! positions; unaffected sections are untouched. A human-only legacy section
//! gets the machine span appended after the human content, never in place of
//! it. Returns a new document; the input is never mutated.

use std::collections::HashMap;

use crate::models::ImpactReport;

use super::{Section, SectionedDocument, Span};

/// Merge new machine content into the affected sections of `doc`.
///
/// Returns the new document and the ids of the sections actually rewritten
/// (affected sections with no entry in `new_content` are left alone).
pub fn merge(
    doc: &SectionedDocument,
    report: &ImpactReport,
    new_content: &HashMap<String, String>,
) -> (SectionedDocument, Vec<String>) {
    let mut updated = Vec::new();
    let sections = doc
        .sections
        .iter()
        .map(|section| {
            if report.contains(&section.id) {
                if let Some(content) = new_content.get(&section.id) {
                    updated.push(section.id.clone());
                    return rewrite_machine_spans(section, content);
                }
            }
            section.clone()
        })
        .collect();

    (
        SectionedDocument {
            preamble: doc.preamble.clone(),
            sections,
        },
        updated,
    )
}

/// Replace the section's machine spans with one span holding `content`.
///
/// The first machine span is replaced in place so its position among the
/// human spans is preserved; any later machine spans are dropped, so repeated
/// merges converge to a single machine span per section. With no machine span
/// to replace, the new span is appended after the existing human content.
fn rewrite_machine_spans(section: &Section, content: &str) -> Section {
    let mut text = content.to_string();
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }

    let mut spans = Vec::with_capacity(section.spans.len());
    let mut replaced = false;
    for span in &section.spans {
        if span.is_machine() {
            if !replaced {
                spans.push(Span::machine(text.clone()));
                replaced = true;
            }
        } else {
            spans.push(span.clone());
        }
    }
    if !replaced {
        spans.push(Span::machine(text));
    }

    Section {
        id: section.id.clone(),
        heading: section.heading.clone(),
        spans,
    }
}
