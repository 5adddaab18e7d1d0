use std::collections::HashMap;

use scribe::doc::{self, Provenance, SectionedDocument};
use scribe::error::EngineError;
use scribe::models::*;
use speculate2::speculate;

fn change(kind: ChangeKind, target: &str) -> ChangeDescriptor {
    ChangeDescriptor {
        changes: vec![ArtifactChange {
            kind,
            target_name: target.to_string(),
            before_signature: None,
            after_signature: None,
        }],
    }
}

const THRESHOLD: f64 = 0.5;

speculate! {
    describe "parse" {
        it "treats an unmarked legacy document as human-only" {
            let text = "# Enrollment\n\nIntro paragraph.\n\n## Purpose\nTracks enrollment.\n\n## API\n`POST /enroll`\n";
            let doc = doc::parse(text, "doc.md").expect("parse failed");

            assert_eq!(doc.preamble, "# Enrollment\n\nIntro paragraph.\n\n");
            assert_eq!(doc.sections.len(), 2);
            assert_eq!(doc.sections[0].id, "purpose");
            assert_eq!(doc.sections[1].id, "api");
            for section in &doc.sections {
                for span in &section.spans {
                    assert_eq!(span.provenance, Provenance::Human);
                }
            }
        }

        it "classifies marked runs as machine spans" {
            let text = "## API\nhand-written intro\n<!-- scribe:begin api -->\n`POST /enroll`\n<!-- scribe:end api -->\nhand-written trailer\n";
            let doc = doc::parse(text, "doc.md").expect("parse failed");

            let section = doc.section("api").expect("no api section");
            assert_eq!(section.spans.len(), 3);
            assert_eq!(section.spans[0].provenance, Provenance::Human);
            assert_eq!(section.spans[1].provenance, Provenance::Machine);
            assert_eq!(section.spans[1].text, "`POST /enroll`\n");
            assert_eq!(section.spans[2].provenance, Provenance::Human);
        }

        it "keeps a section's raw body equal to its span concatenation" {
            let text = "## API\nintro\n<!-- scribe:begin api -->\nbody\n<!-- scribe:end api -->\ntrailer\n";
            let doc = doc::parse(text, "doc.md").expect("parse failed");
            assert_eq!(doc.sections[0].raw_body(), "intro\nbody\ntrailer\n");
        }

        it "accepts a section with no body" {
            let doc = doc::parse("## Notes\n## API\ncontent\n", "doc.md").expect("parse failed");
            assert_eq!(doc.sections[0].id, "notes");
            assert!(doc.sections[0].spans.is_empty());
        }

        it "rejects duplicate headings" {
            let err = doc::parse("## API\n## API\n", "doc.md").unwrap_err();
            assert!(matches!(err, EngineError::DuplicateHeading(_)));
        }

        it "rejects an unpaired begin marker" {
            let err = doc::parse("## API\n<!-- scribe:begin api -->\ncontent\n", "doc.md").unwrap_err();
            assert!(matches!(err, EngineError::MalformedMarker { .. }));
        }

        it "rejects an end marker without a begin" {
            let err = doc::parse("## API\n<!-- scribe:end api -->\n", "doc.md").unwrap_err();
            assert!(matches!(err, EngineError::MalformedMarker { .. }));
        }

        it "rejects a marker whose id does not match its section" {
            let err = doc::parse("## API\n<!-- scribe:begin purpose -->\nx\n<!-- scribe:end purpose -->\n", "doc.md").unwrap_err();
            assert!(matches!(err, EngineError::MalformedMarker { .. }));
        }

        it "rejects an unrecognized marker verb instead of guessing" {
            let err = doc::parse("## API\n<!-- scribe:replace api -->\n", "doc.md").unwrap_err();
            assert!(matches!(err, EngineError::MalformedMarker { .. }));
        }

        it "rejects a machine span crossing a section boundary" {
            let err = doc::parse("## API\n<!-- scribe:begin api -->\n## Purpose\n", "doc.md").unwrap_err();
            assert!(matches!(err, EngineError::MalformedMarker { .. }));
        }

        it "rejects markers before the first heading" {
            let err = doc::parse("<!-- scribe:begin api -->\nx\n<!-- scribe:end api -->\n", "doc.md").unwrap_err();
            assert!(matches!(err, EngineError::MalformedMarker { .. }));
        }

        it "reports the offending line number" {
            let err = doc::parse("## API\nok\n<!-- scribe:end api -->\n", "doc.md").unwrap_err();
            match err {
                EngineError::MalformedMarker { line, .. } => assert_eq!(line, 3),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    describe "round trip" {
        it "holds for an assembled machine document" {
            let doc = SectionedDocument::assemble(
                Some("Enrollment Service"),
                vec![
                    ("Purpose".to_string(), "Tracks enrollment.".to_string()),
                    ("API".to_string(), "`POST /enroll`".to_string()),
                ],
            ).expect("assemble failed");

            let reparsed = doc::parse(&doc::serialize(&doc), "doc.md").expect("parse failed");
            assert_eq!(doc, reparsed);
        }

        it "holds for a parsed document with mixed provenance" {
            let text = "# T\n\n## Purpose\nhuman text\n## API\n<!-- scribe:begin api -->\nmachine text\n<!-- scribe:end api -->\nmore human text\n";
            let doc = doc::parse(text, "doc.md").expect("parse failed");
            let reparsed = doc::parse(&doc::serialize(&doc), "doc.md").expect("reparse failed");
            assert_eq!(doc, reparsed);
        }

        it "holds for the empty document" {
            let doc = SectionedDocument::default();
            let reparsed = doc::parse(&doc::serialize(&doc), "doc.md").expect("parse failed");
            assert_eq!(doc, reparsed);
        }

        it "holds for sections with empty bodies and empty machine spans" {
            let text = "## Notes\n## API\n<!-- scribe:begin api -->\n<!-- scribe:end api -->\n";
            let doc = doc::parse(text, "doc.md").expect("parse failed");
            assert!(doc.sections[0].spans.is_empty());
            assert_eq!(doc.sections[1].spans[0].text, "");

            let reparsed = doc::parse(&doc::serialize(&doc), "doc.md").expect("reparse failed");
            assert_eq!(doc, reparsed);
        }

        it "serializes back to the exact input text" {
            let text = "# T\n\n## API\nhuman\n<!-- scribe:begin api -->\nmachine\n<!-- scribe:end api -->\n";
            let doc = doc::parse(text, "doc.md").expect("parse failed");
            assert_eq!(doc::serialize(&doc), text);
        }
    }

    describe "impact analysis" {
        it "matches a heading by name tokens" {
            let doc = SectionedDocument::assemble(None, vec![
                ("Enrollment API".to_string(), "details".to_string()),
                ("Configuration".to_string(), "other".to_string()),
            ]).unwrap();

            let report = doc::analyze(&doc, &change(ChangeKind::Modified, "enrollment"), THRESHOLD);
            assert_eq!(report.affected.len(), 1);
            assert_eq!(report.affected[0].section_id, "enrollment-api");
            assert_eq!(report.affected[0].confidence, Confidence::Exact);
        }

        it "reports a complete machine-body match as exact" {
            let doc = doc::parse(
                "## Purpose\nTracks enrollment.\n## API\n<!-- scribe:begin api -->\n`POST /enroll`\n<!-- scribe:end api -->\n",
                "doc.md",
            ).unwrap();

            let report = doc::analyze(&doc, &change(ChangeKind::Modified, "/enroll"), THRESHOLD);
            assert_eq!(report.affected.len(), 1, "only API should be affected: {:?}", report);
            assert_eq!(report.affected[0].section_id, "api");
            assert_eq!(report.affected[0].confidence, Confidence::Exact);
        }

        it "does not match human-authored text below a removal" {
            // "enrollment" and "enroll" are different tokens; the human
            // Purpose section stays out of the report.
            let doc = doc::parse(
                "## Purpose\nTracks enrollment.\n## API\n<!-- scribe:begin api -->\n`POST /enroll`\n<!-- scribe:end api -->\n",
                "doc.md",
            ).unwrap();

            let report = doc::analyze(&doc, &change(ChangeKind::Modified, "enroll"), THRESHOLD);
            assert!(report.contains("api"));
            assert!(!report.contains("purpose"));
        }

        it "reports a partial overlap above the threshold as probable" {
            let doc = doc::parse(
                "## Endpoints\n<!-- scribe:begin endpoints -->\nThe enroll handler validates input.\n<!-- scribe:end endpoints -->\n",
                "doc.md",
            ).unwrap();

            let report = doc::analyze(
                &doc,
                &change(ChangeKind::Modified, "enroll_handler_v2"),
                THRESHOLD,
            );
            assert_eq!(report.affected.len(), 1);
            assert_eq!(report.affected[0].confidence, Confidence::Probable);
        }

        it "excludes weak matches entirely" {
            let doc = doc::parse(
                "## Endpoints\n<!-- scribe:begin endpoints -->\nNothing relevant here.\n<!-- scribe:end endpoints -->\n",
                "doc.md",
            ).unwrap();

            let report = doc::analyze(
                &doc,
                &change(ChangeKind::Modified, "billing_export_worker"),
                THRESHOLD,
            );
            assert!(report.is_empty());
        }

        it "always flags sections mentioning a removed name" {
            let doc = doc::parse(
                "## Endpoints\n<!-- scribe:begin endpoints -->\nThe enroll handler validates input.\n<!-- scribe:end endpoints -->\n",
                "doc.md",
            ).unwrap();

            // One of three tokens present: below threshold, but the change is
            // a removal so the mention is flagged anyway.
            let report = doc::analyze(
                &doc,
                &change(ChangeKind::Removed, "legacy_enroll_shim"),
                THRESHOLD,
            );
            assert_eq!(report.affected.len(), 1);
            assert_eq!(report.affected[0].confidence, Confidence::Probable);
        }

        it "deduplicates by section id keeping the highest confidence" {
            let doc = doc::parse(
                "## Enroll\n<!-- scribe:begin enroll -->\nenroll endpoint details\n<!-- scribe:end enroll -->\n",
                "doc.md",
            ).unwrap();

            let descriptor = ChangeDescriptor {
                changes: vec![
                    ArtifactChange {
                        kind: ChangeKind::Modified,
                        target_name: "enroll endpoint details extra".to_string(),
                        before_signature: None,
                        after_signature: None,
                    },
                    ArtifactChange {
                        kind: ChangeKind::Modified,
                        target_name: "enroll".to_string(),
                        before_signature: None,
                        after_signature: None,
                    },
                ],
            };

            let report = doc::analyze(&doc, &descriptor, THRESHOLD);
            assert_eq!(report.affected.len(), 1);
            assert_eq!(report.affected[0].confidence, Confidence::Exact);
        }

        it "matches names case-insensitively across delimiters" {
            let doc = SectionedDocument::assemble(None, vec![
                ("User Service".to_string(), "x".to_string()),
            ]).unwrap();

            let report = doc::analyze(&doc, &change(ChangeKind::Modified, "UserService"), THRESHOLD);
            assert_eq!(report.affected.len(), 1);
            assert_eq!(report.affected[0].confidence, Confidence::Exact);
        }
    }

    describe "surgical merge" {
        it "rewrites only the machine span named by the report" {
            // The enrollment scenario end to end: modify /enroll -> /v2/enroll.
            let text = "## Purpose\nTracks enrollment.\n## API\n<!-- scribe:begin api -->\n`POST /enroll`\n<!-- scribe:end api -->\n";
            let doc = doc::parse(text, "doc.md").unwrap();

            let report = doc::analyze(&doc, &change(ChangeKind::Modified, "/enroll"), THRESHOLD);
            assert_eq!(report.affected.len(), 1);
            assert_eq!(report.affected[0].section_id, "api");

            let mut content = HashMap::new();
            content.insert("api".to_string(), "`POST /v2/enroll`".to_string());
            let (merged, updated) = doc::merge(&doc, &report, &content);

            assert_eq!(updated, vec!["api"]);
            assert_eq!(merged.sections[0], doc.sections[0], "Purpose must be untouched");
            assert_eq!(merged.section("api").unwrap().machine_text(), "`POST /v2/enroll`\n");

            let out = doc::serialize(&merged);
            assert!(out.contains("Tracks enrollment.\n"));
            assert!(out.contains("`POST /v2/enroll`"));
            assert!(!out.contains("`POST /enroll`\n"));
        }

        it "keeps human spans of an affected section byte-identical" {
            let text = "## API\nkeep this line\n<!-- scribe:begin api -->\nold\n<!-- scribe:end api -->\nand this one\n";
            let doc = doc::parse(text, "doc.md").unwrap();
            let report = doc::analyze(&doc, &change(ChangeKind::Modified, "old"), THRESHOLD);

            let mut content = HashMap::new();
            content.insert("api".to_string(), "new".to_string());
            let (merged, _) = doc::merge(&doc, &report, &content);

            let section = merged.section("api").unwrap();
            assert_eq!(section.spans[0].text, "keep this line\n");
            assert_eq!(section.spans[2].text, "and this one\n");
        }

        it "appends to a human-only section instead of overwriting" {
            let text = "## Purpose\nTracks enrollment.\n";
            let doc = doc::parse(text, "doc.md").unwrap();
            let report = scribe::models::ImpactReport {
                affected: vec![AffectedSection {
                    section_id: "purpose".to_string(),
                    reason: "test".to_string(),
                    confidence: Confidence::Exact,
                }],
            };

            let mut content = HashMap::new();
            content.insert("purpose".to_string(), "Generated overview.".to_string());
            let (merged, _) = doc::merge(&doc, &report, &content);

            let section = merged.section("purpose").unwrap();
            assert_eq!(section.spans[0].text, "Tracks enrollment.\n");
            assert!(section.spans[1].is_machine());
            assert_eq!(section.spans[1].text, "Generated overview.\n");
        }

        it "collapses repeated machine spans into one" {
            let text = "## API\n<!-- scribe:begin api -->\none\n<!-- scribe:end api -->\nhuman\n<!-- scribe:begin api -->\ntwo\n<!-- scribe:end api -->\n";
            let doc = doc::parse(text, "doc.md").unwrap();
            let report = doc::analyze(&doc, &change(ChangeKind::Modified, "one two"), THRESHOLD);

            let mut content = HashMap::new();
            content.insert("api".to_string(), "merged".to_string());
            let (merged, _) = doc::merge(&doc, &report, &content);

            let section = merged.section("api").unwrap();
            assert_eq!(section.spans.len(), 2);
            assert_eq!(section.spans[0].text, "merged\n");
            assert_eq!(section.spans[1].text, "human\n");
        }

        it "does not mutate the input document" {
            let text = "## API\n<!-- scribe:begin api -->\nold\n<!-- scribe:end api -->\n";
            let doc = doc::parse(text, "doc.md").unwrap();
            let before = doc.clone();

            let report = doc::analyze(&doc, &change(ChangeKind::Modified, "old"), THRESHOLD);
            let mut content = HashMap::new();
            content.insert("api".to_string(), "new".to_string());
            let _ = doc::merge(&doc, &report, &content);

            assert_eq!(doc, before);
        }

        it "leaves affected sections without new content alone" {
            let text = "## API\n<!-- scribe:begin api -->\nold\n<!-- scribe:end api -->\n";
            let doc = doc::parse(text, "doc.md").unwrap();
            let report = doc::analyze(&doc, &change(ChangeKind::Modified, "old"), THRESHOLD);

            let (merged, updated) = doc::merge(&doc, &report, &HashMap::new());
            assert!(updated.is_empty());
            assert_eq!(merged, doc);
        }
    }
}
