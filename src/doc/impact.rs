//! Impact analysis: which sections does a change to the artifact invalidate?
//!
//! Matching is a name-token overlap heuristic. Target names and section text
//! are broken into case-insensitive tokens at delimiters and camelCase
//! boundaries; a full-heading containment is an `Exact` match, a machine-body
//! overlap above the threshold is `Probable`. Removed declarations flag every
//! section still mentioning the name regardless of threshold: a false
//! positive costs a review glance, a false negative leaves misleading docs.

use std::collections::{HashMap, HashSet};

use crate::models::{AffectedSection, ChangeDescriptor, ChangeKind, Confidence, ImpactReport};

use super::SectionedDocument;

/// Analyze a document against a change descriptor. Pure; no side effects.
pub fn analyze(
    doc: &SectionedDocument,
    descriptor: &ChangeDescriptor,
    threshold: f64,
) -> ImpactReport {
    // section id -> best match so far
    let mut best: HashMap<String, AffectedSection> = HashMap::new();

    for change in &descriptor.changes {
        let target = tokenize(&change.target_name);
        if target.is_empty() {
            continue;
        }

        for section in &doc.sections {
            let heading_tokens = tokenize(&section.heading);
            let body_tokens = tokenize(&section.machine_text());
            let overlap = target.intersection(&body_tokens).count() as f64;
            let ratio = overlap / target.len() as f64;
            let mentioned =
                overlap > 0.0 || heading_tokens.intersection(&target).next().is_some();

            // A complete match (every token of the name, in the heading or the
            // machine body) is exact; a partial body overlap above the
            // threshold is probable; below threshold is excluded entirely.
            let candidate = if target.is_subset(&heading_tokens) {
                Some((
                    Confidence::Exact,
                    format!(
                        "heading '{}' names {} '{}'",
                        section.heading,
                        change.kind.as_str(),
                        change.target_name
                    ),
                ))
            } else if target.is_subset(&body_tokens) {
                Some((
                    Confidence::Exact,
                    format!(
                        "section body documents {} '{}'",
                        change.kind.as_str(),
                        change.target_name
                    ),
                ))
            } else if ratio >= threshold {
                Some((
                    Confidence::Probable,
                    format!(
                        "section body mentions {} '{}'",
                        change.kind.as_str(),
                        change.target_name
                    ),
                ))
            } else if change.kind == ChangeKind::Removed && mentioned {
                // Removed names always flag a mention, even a weak one.
                Some((
                    Confidence::Probable,
                    format!("removed '{}' is still mentioned here", change.target_name),
                ))
            } else {
                None
            };
            let candidate = candidate.map(|(confidence, reason)| AffectedSection {
                section_id: section.id.clone(),
                reason,
                confidence,
            });

            if let Some(hit) = candidate {
                match best.get(&hit.section_id) {
                    Some(existing) if existing.confidence >= hit.confidence => {}
                    _ => {
                        best.insert(hit.section_id.clone(), hit);
                    }
                }
            }
        }
    }

    // Report in document order so output is stable across runs.
    let affected = doc
        .sections
        .iter()
        .filter_map(|s| best.remove(&s.id))
        .collect();
    ImpactReport { affected }
}

/// Case-insensitive tokens, split at delimiters and camelCase boundaries.
/// `UserService.createAccount/v2` and `user_service create-account V2`
/// normalize to the same token set.
fn tokenize(text: &str) -> HashSet<String> {
    let mut tokens = HashSet::new();
    for raw in text.split(|c: char| !c.is_alphanumeric()) {
        let mut word = String::new();
        for c in raw.chars() {
            if c.is_uppercase() && !word.is_empty() {
                tokens.insert(word.to_lowercase());
                word.clear();
            }
            word.push(c);
        }
        if !word.is_empty() {
            tokens.insert(word.to_lowercase());
        }
    }
    tokens
}
