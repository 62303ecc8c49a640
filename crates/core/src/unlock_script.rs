//! Unlock script parsing.
//!
//! Unlock scripts are Lua-style files made of call statements such as
//!
//! ```text
//! addappid(285310)
//! addappid(285311, 1, "1e5f4762efe80ce881ab1267f4aef3bd6dcb98bac938ff35d4eb0ce470d597f7")
//! setManifestid(285311, "7707512373587327394", 0)
//! ```
//!
//! Only the call shapes below are recognized; every other line is ignored.

use crate::item::{ItemId, MIN_KEY_LEN};
use std::collections::BTreeMap;

/// Verb that registers an app or depot, optionally with its key.
pub const ADD_VERB: &str = "addappid";

/// Verb that pins a depot to a manifest gid.
pub const MANIFEST_VERB: &str = "setManifestid";

/// A depot pinned to a manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestPin {
    pub depot: ItemId,
    pub gid: String,
    pub size: Option<u64>,
}

/// Everything recognized in an unlock script.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnlockScript {
    /// Ids introduced by the add verb, in file order, without repeats.
    pub ids: Vec<ItemId>,
    /// Depot decryption keys; a later line overrides an earlier one.
    pub keys: BTreeMap<ItemId, String>,
    /// Manifest pins.
    pub manifests: Vec<ManifestPin>,
}

impl UnlockScript {
    /// Parse a script. Lines that do not match a known call are skipped.
    pub fn parse(text: &str) -> Self {
        let mut script = Self::default();

        for (lineno, line) in text.lines().enumerate() {
            let Some((verb, args)) = split_call(line) else {
                continue;
            };

            if verb == ADD_VERB {
                let Some(id) = args.first().and_then(|a| ItemId::new(a.as_str()).ok()) else {
                    tracing::debug!(line = lineno + 1, "skipping call with non-numeric id");
                    continue;
                };
                if !script.ids.contains(&id) {
                    script.ids.push(id.clone());
                }
                if let Some(key) = args.get(2).and_then(|a| unquote(a))
                    && key.len() > MIN_KEY_LEN
                {
                    script.keys.insert(id, key.to_string());
                }
            } else if verb == MANIFEST_VERB {
                let depot = args.first().and_then(|a| ItemId::new(a.as_str()).ok());
                let gid = args.get(1).and_then(|a| unquote(a).or(Some(a.as_str())));
                if let (Some(depot), Some(gid)) = (depot, gid)
                    && !gid.is_empty()
                {
                    let size = args.get(2).and_then(|a| a.parse().ok());
                    script.manifests.push(ManifestPin {
                        depot,
                        gid: gid.to_string(),
                        size,
                    });
                }
            }
        }

        script
    }

    /// The primary item of the script: the first added id that has no key.
    pub fn primary(&self) -> Option<&ItemId> {
        self.ids.iter().find(|id| !self.keys.contains_key(*id))
    }

    /// Every added id other than `primary`.
    pub fn dependents_of(&self, primary: &ItemId) -> Vec<ItemId> {
        self.ids.iter().filter(|id| *id != primary).cloned().collect()
    }
}

/// Extract the depot → key mapping from an unlock script.
pub fn extract_depot_keys(text: &str) -> BTreeMap<ItemId, String> {
    UnlockScript::parse(text).keys
}

/// Split `verb(a, b, "c") -- comment` into the verb and trimmed arguments.
fn split_call(line: &str) -> Option<(&str, Vec<String>)> {
    let line = strip_comment(line).trim();
    let open = line.find('(')?;
    let verb = line[..open].trim();
    if verb.is_empty() || !verb.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }

    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut closed = false;

    for c in line[open + 1..].chars() {
        match c {
            '"' => {
                in_quote = !in_quote;
                current.push(c);
            }
            ',' if !in_quote => {
                args.push(current.trim().to_string());
                current.clear();
            }
            ')' if !in_quote => {
                closed = true;
                break;
            }
            _ => current.push(c),
        }
    }
    if !closed {
        return None;
    }
    let last = current.trim();
    if !last.is_empty() || !args.is_empty() {
        args.push(last.to_string());
    }
    Some((verb, args))
}

fn strip_comment(line: &str) -> &str {
    let mut in_quote = false;
    let bytes = line.as_bytes();
    for i in 0..bytes.len() {
        match bytes[i] {
            b'"' => in_quote = !in_quote,
            b'-' if !in_quote && bytes.get(i + 1) == Some(&b'-') => return &line[..i],
            _ => {}
        }
    }
    line
}

fn unquote(arg: &str) -> Option<&str> {
    arg.strip_prefix('"')?.strip_suffix('"')
}
