//! Decryption-key store editing (`config/config.vdf`).
//!
//! The key store is a large, human-edited document owned by the game
//! client. Edits are spliced into the text at brace offsets so that
//! everything outside the edited records stays byte-for-byte intact.

use crate::item::{ItemId, KeyRecord};
use crate::vdf;
use std::fmt::Write as _;
use std::ops::Range;

/// Section holding one child block per depot.
pub const DEPOTS_SECTION: &str = "depots";

/// Field inside a depot block.
pub const KEY_FIELD: &str = "DecryptionKey";

/// Hierarchy enclosing the depots section in a fresh store.
pub const ROOT_PATH: [&str; 4] = ["InstallConfigStore", "Software", "Valve", "Steam"];

/// How an upsert produced its output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertMode {
    /// Records were spliced into an existing section.
    Spliced,
    /// The section did not exist; the document was rebuilt from the
    /// template. `discarded` is set when non-blank content was dropped.
    Synthesized { discarded: bool },
}

/// Result of [`upsert_section`].
#[derive(Clone, Debug)]
pub struct Upsert {
    pub text: String,
    pub mode: UpsertMode,
}

/// Result of [`remove_records`].
#[derive(Clone, Debug, Default)]
pub struct Removal {
    pub text: String,
    pub removed: Vec<ItemId>,
}

/// Byte span of a section's body, between its braces.
fn section_body(text: &str, section: &str) -> crate::Result<Option<(usize, Range<usize>)>> {
    let Some(name_at) = vdf::find_key(text, section, 0) else {
        return Ok(None);
    };
    let open = vdf::find_open_brace(text, name_at + section.len() + 2)
        .ok_or_else(|| crate::Error::MissingSectionBody(section.to_string()))?;
    let close =
        vdf::find_matching_brace(text, name_at).ok_or_else(|| crate::Error::UnbalancedBraces {
            section: section.to_string(),
            offset: name_at,
        })?;
    Ok(Some((name_at, open + 1..close)))
}

/// Line ending used by `text`; CRLF documents keep CRLF.
fn line_ending(text: &str) -> &'static str {
    if text.contains("\r\n") { "\r\n" } else { "\n" }
}

fn render_record(out: &mut String, indent: &str, nl: &str, record: &KeyRecord) {
    let _ = write!(
        out,
        "{indent}\"{depot}\"{nl}{indent}{{{nl}{indent}\t\"{KEY_FIELD}\"\t\t\"{key}\"{nl}{indent}}}{nl}",
        depot = record.depot,
        key = vdf::escape(&record.key),
    );
}

/// Insert `records` into `section`, creating the document if needed.
///
/// Records already present for the same depots are replaced. Fails with
/// [`crate::Error::UnbalancedBraces`] when the section never closes; in
/// that case no text is produced.
pub fn upsert_section(
    existing: &str,
    section: &str,
    records: &[KeyRecord],
) -> crate::Result<Upsert> {
    let depots: Vec<ItemId> = records.iter().map(|r| r.depot.clone()).collect();

    let Some(_) = section_body(existing, section)? else {
        return Ok(Upsert {
            text: synthesize(section, records),
            mode: UpsertMode::Synthesized {
                discarded: !existing.trim().is_empty(),
            },
        });
    };

    let text = remove_records(existing, section, &depots)?.text;
    let Some((name_at, body)) = section_body(&text, section)? else {
        return Err(crate::Error::MissingSectionBody(section.to_string()));
    };
    if records.is_empty() {
        return Ok(Upsert {
            text,
            mode: UpsertMode::Spliced,
        });
    }

    let close = body.end;
    let depth = vdf::depth_at(&text, name_at);
    let child_indent = "\t".repeat(depth + 1);
    let nl = line_ending(&text);

    let mut block = String::new();
    for record in records {
        render_record(&mut block, &child_indent, nl, record);
    }

    let line_start = text[..close].rfind('\n').map_or(0, |i| i + 1);
    let mut out = String::with_capacity(text.len() + block.len() + depth + 1);
    if text[line_start..close].trim().is_empty() {
        // Closing brace on its own line: new records go right above it.
        out.push_str(&text[..line_start]);
        out.push_str(&block);
        out.push_str(&text[line_start..]);
    } else {
        out.push_str(&text[..close]);
        out.push_str(nl);
        out.push_str(&block);
        out.push_str(&"\t".repeat(depth));
        out.push_str(&text[close..]);
    }

    Ok(Upsert {
        text: out,
        mode: UpsertMode::Spliced,
    })
}

/// Build a fresh document containing only `section` and its records.
pub fn synthesize(section: &str, records: &[KeyRecord]) -> String {
    let mut out = String::new();
    let mut depth = 0;
    for name in ROOT_PATH.iter().copied().chain(std::iter::once(section)) {
        let indent = "\t".repeat(depth);
        let _ = write!(out, "{indent}\"{name}\"\n{indent}{{\n");
        depth += 1;
    }
    let child_indent = "\t".repeat(depth);
    for record in records {
        render_record(&mut out, &child_indent, "\n", record);
    }
    while depth > 0 {
        depth -= 1;
        let _ = writeln!(out, "{}}}", "\t".repeat(depth));
    }
    out
}

/// Strip the record blocks of `depots` from `section`.
///
/// Searches the whole document when the section does not exist. Only
/// blocks that hold a key field are removed; ids that are not present are
/// skipped.
pub fn remove_records(
    existing: &str,
    section: &str,
    depots: &[ItemId],
) -> crate::Result<Removal> {
    let mut text = existing.to_string();
    let mut removed = Vec::new();

    let (mut span, record_depth) = match section_body(&text, section)? {
        Some((name_at, body)) => (body, Some(vdf::depth_at(&text, name_at) + 1)),
        None => (0..text.len(), None),
    };

    for depot in depots {
        let mut from = span.start;
        while let Some(at) = vdf::find_key(&text, depot.as_str(), from) {
            if at >= span.end {
                break;
            }
            match record_range(&text, at, depot, record_depth) {
                Some(range) if range.end <= span.end => {
                    span.end -= range.len();
                    from = range.start;
                    text.replace_range(range, "");
                    if !removed.contains(depot) {
                        removed.push(depot.clone());
                    }
                }
                _ => from = at + depot.as_str().len() + 2,
            }
        }
    }

    Ok(Removal { text, removed })
}

/// Byte range of the record block whose name token starts at `at`,
/// widened to whole lines when the block occupies them alone.
fn record_range(
    text: &str,
    at: usize,
    depot: &ItemId,
    record_depth: Option<usize>,
) -> Option<Range<usize>> {
    if let Some(depth) = record_depth
        && vdf::depth_at(text, at) != depth
    {
        return None;
    }

    let after_name = at + depot.as_str().len() + 2;
    let rest = &text[after_name..];
    let open = after_name + (rest.len() - rest.trim_start().len());
    if text.as_bytes().get(open) != Some(&b'{') {
        return None;
    }
    let close = vdf::find_matching_brace(text, open)?;
    vdf::find_key(&text[open..close], KEY_FIELD, 0)?;

    let line_start = text[..at].rfind('\n').map_or(0, |i| i + 1);
    let start = if text[line_start..at].trim().is_empty() {
        line_start
    } else {
        at
    };

    let tail = &text[close + 1..];
    let end = match tail.find('\n') {
        Some(nl) if tail[..nl].trim().is_empty() && start == line_start => close + 1 + nl + 1,
        _ => close + 1,
    };
    Some(start..end)
}

/// Read the key records held by `section`.
pub fn read_records(text: &str, section: &str) -> crate::Result<Vec<KeyRecord>> {
    let Some((name_at, body)) = section_body(text, section)? else {
        return Ok(Vec::new());
    };
    let nodes =
        vdf::parse(&text[name_at..=body.end]).map_err(|e| crate::Error::UnbalancedBraces {
            section: format!("{section}: {e}"),
            offset: name_at,
        })?;

    let mut records = Vec::new();
    for node in nodes.iter().flat_map(|n| n.children()) {
        if let Ok(depot) = ItemId::new(node.key.as_str())
            && let Some(key) = node.get_str(KEY_FIELD)
        {
            records.push(KeyRecord {
                depot,
                key: key.to_string(),
            });
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ItemId {
        ItemId::new(s).unwrap()
    }

    fn record(depot: &str, key: &str) -> KeyRecord {
        KeyRecord::new(id(depot), key).unwrap()
    }

    const EXISTING: &str = "\"InstallConfigStore\"\n{\n\t\"Software\"\n\t{\n\t\t\"Valve\"\n\t\t{\n\t\t\t\"Steam\"\n\t\t\t{\n\t\t\t\t\"CellIDServerOverride\"\t\t\"1\"\n\t\t\t\t\"depots\"\n\t\t\t\t{\n\t\t\t\t\t\"300\"\n\t\t\t\t\t{\n\t\t\t\t\t\t\"DecryptionKey\"\t\t\"cccccccccccccccc\"\n\t\t\t\t\t}\n\t\t\t\t}\n\t\t\t\t\"Accounts\"\n\t\t\t\t{\n\t\t\t\t}\n\t\t\t}\n\t\t}\n\t}\n}\n";

    fn braces(text: &str) -> (usize, usize) {
        (text.matches('{').count(), text.matches('}').count())
    }

    #[test]
    fn test_upsert_splices_before_matching_brace() {
        let records = [record("200", "aaaaaaaaaaaaaaaa"), record("201", "bbbbbbbbbbbbbbbb")];
        let out = upsert_section(EXISTING, DEPOTS_SECTION, &records).unwrap();
        assert_eq!(out.mode, UpsertMode::Spliced);

        let (open, close) = braces(&out.text);
        assert_eq!(open, close);
        assert!(out.text.contains(
            "\t\t\t\t\t\"200\"\n\t\t\t\t\t{\n\t\t\t\t\t\t\"DecryptionKey\"\t\t\"aaaaaaaaaaaaaaaa\"\n\t\t\t\t\t}\n"
        ));

        // Content after the section is untouched.
        let tail = &EXISTING[EXISTING.find("\t\t\t\t\"Accounts\"").unwrap()..];
        assert!(out.text.ends_with(tail));

        let records = read_records(&out.text, DEPOTS_SECTION).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.depot.as_str()).collect();
        assert_eq!(ids, vec!["300", "200", "201"]);
    }

    #[test]
    fn test_insert_then_remove_is_identity() {
        let records = [record("200", "aaaaaaaaaaaaaaaa"), record("201", "bbbbbbbbbbbbbbbb")];
        let inserted = upsert_section(EXISTING, DEPOTS_SECTION, &records).unwrap();
        let removal =
            remove_records(&inserted.text, DEPOTS_SECTION, &[id("200"), id("201")]).unwrap();
        assert_eq!(removal.text, EXISTING);
        assert_eq!(removal.removed, vec![id("200"), id("201")]);
    }

    #[test]
    fn test_upsert_replaces_existing_depot() {
        let out = upsert_section(EXISTING, DEPOTS_SECTION, &[record("300", "dddddddddddddddd")])
            .unwrap();
        let records = read_records(&out.text, DEPOTS_SECTION).unwrap();
        assert_eq!(records, vec![record("300", "dddddddddddddddd")]);
        assert!(!out.text.contains("cccccccccccccccc"));
    }

    #[test]
    fn test_upsert_inline_section() {
        let text = "\"root\" { \"depots\" { } \"other\" \"1\" }";
        let out = upsert_section(text, DEPOTS_SECTION, &[record("5", "eeeeeeeeeeee")]).unwrap();
        let (open, close) = braces(&out.text);
        assert_eq!(open, close);
        assert!(out.text.ends_with("} \"other\" \"1\" }"));
        assert_eq!(read_records(&out.text, DEPOTS_SECTION).unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_synthesizes_when_missing() {
        let out = upsert_section("", DEPOTS_SECTION, &[record("200", "aaaaaaaaaaaaaaaa")]).unwrap();
        assert_eq!(out.mode, UpsertMode::Synthesized { discarded: false });
        assert!(out.text.starts_with("\"InstallConfigStore\"\n{\n\t\"Software\"\n"));
        assert!(out.text.contains("\t\t\t\t\"depots\"\n\t\t\t\t{\n\t\t\t\t\t\"200\"\n"));
        assert!(vdf::is_balanced(&out.text));

        let out = upsert_section("garbage", DEPOTS_SECTION, &[]).unwrap();
        assert_eq!(out.mode, UpsertMode::Synthesized { discarded: true });
        assert!(!out.text.contains("garbage"));
    }

    #[test]
    fn test_upsert_unbalanced_fails() {
        let text = "\"InstallConfigStore\"\n{\n\t\"depots\"\n\t{\n\t\t\"1\"\n\t\t{\n";
        let err = upsert_section(text, DEPOTS_SECTION, &[record("2", "aaaaaaaaaaaa")]).unwrap_err();
        assert!(matches!(err, crate::Error::UnbalancedBraces { .. }));
    }

    #[test]
    fn test_remove_missing_ids_is_noop() {
        let removal = remove_records(EXISTING, DEPOTS_SECTION, &[id("999")]).unwrap();
        assert_eq!(removal.text, EXISTING);
        assert!(removal.removed.is_empty());
    }

    #[test]
    fn test_remove_ignores_non_record_matches() {
        let text = "\"depots\"\n{\n\t\"7\"\t\t\"7\"\n\t\"8\"\n\t{\n\t\t\"DecryptionKey\"\t\t\"kkkkkkkkkkkk\"\n\t}\n}\n";
        let removal = remove_records(text, DEPOTS_SECTION, &[id("7"), id("8")]).unwrap();
        assert_eq!(removal.text, "\"depots\"\n{\n\t\"7\"\t\t\"7\"\n}\n");
        assert_eq!(removal.removed, vec![id("8")]);
    }

    #[test]
    fn test_remove_without_section_scans_document() {
        let text = "\"x\"\n{\n\t\"9\"\n\t{\n\t\t\"DecryptionKey\"\t\t\"kkkkkkkkkkkk\"\n\t}\n}\n";
        let removal = remove_records(text, DEPOTS_SECTION, &[id("9")]).unwrap();
        assert_eq!(removal.text, "\"x\"\n{\n}\n");
    }

    #[test]
    fn test_crlf_document_keeps_line_endings() {
        let crlf = EXISTING.replace('\n', "\r\n");
        let records = [record("200", "aaaaaaaaaaaaaaaa"), record("201", "bbbbbbbbbbbbbbbb")];
        let inserted = upsert_section(&crlf, DEPOTS_SECTION, &records).unwrap();
        assert_eq!(inserted.mode, UpsertMode::Spliced);

        let (open, close) = braces(&inserted.text);
        assert_eq!(open, close);
        assert_eq!(open, braces(&crlf).0 + 2);
        assert!(!inserted.text.replace("\r\n", "").contains('\n'));
        assert!(inserted.text.contains("\t\t\t\t\t\"201\"\r\n\t\t\t\t\t{\r\n"));
        assert_eq!(read_records(&inserted.text, DEPOTS_SECTION).unwrap().len(), 3);

        let removal =
            remove_records(&inserted.text, DEPOTS_SECTION, &[id("200"), id("201")]).unwrap();
        assert_eq!(removal.text, crlf);

        let emptied = remove_records(&crlf, DEPOTS_SECTION, &[id("300")]).unwrap();
        assert_eq!(emptied.removed, vec![id("300")]);
        let (open, close) = braces(&emptied.text);
        assert_eq!(open, close);
        assert!(emptied.text.contains("\t\t\t\t\"depots\"\r\n\t\t\t\t{\r\n\t\t\t\t}\r\n"));
        assert!(read_records(&emptied.text, DEPOTS_SECTION).unwrap().is_empty());
    }

    #[test]
    fn test_synthesize_balanced() {
        let text = synthesize(DEPOTS_SECTION, &[]);
        assert!(vdf::is_balanced(&text));
        assert!(text.ends_with("\t}\n}\n"));
    }
}
