//! Item identifiers and key records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A decimal, unsigned item identifier.
///
/// Apps and their depots share this id space. The textual form is kept as
/// given so that comparisons against slot file contents stay exact.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemId(String);

impl ItemId {
    /// Create from a string, validating format.
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::Error::InvalidItemId("id cannot be empty".to_string()));
        }
        if !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(crate::Error::InvalidItemId(format!(
                "id must be decimal digits: {id:?}"
            )));
        }
        if id.parse::<u64>().is_err() {
            return Err(crate::Error::InvalidItemId(format!("id out of range: {id}")));
        }
        Ok(Self(id))
    }

    /// Get the id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of the id.
    pub fn value(&self) -> u64 {
        // Validated in `new`.
        self.0.parse().unwrap_or_default()
    }
}

impl FromStr for ItemId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::new(s.trim())
    }
}

impl TryFrom<String> for ItemId {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Minimum plausible decryption key length (exclusive).
pub const MIN_KEY_LEN: usize = 10;

/// A depot decryption key as stored in the key store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub depot: ItemId,
    pub key: String,
}

impl KeyRecord {
    /// Create a key record, rejecting keys that cannot be written verbatim.
    pub fn new(depot: ItemId, key: impl Into<String>) -> crate::Result<Self> {
        let key = key.into();
        if key.len() <= MIN_KEY_LEN {
            return Err(crate::Error::InvalidKey {
                depot: depot.to_string(),
                reason: format!("key too short ({} chars)", key.len()),
            });
        }
        if key
            .chars()
            .any(|c| matches!(c, '"' | '{' | '}' | '\\') || c.is_whitespace())
        {
            return Err(crate::Error::InvalidKey {
                depot: depot.to_string(),
                reason: "key contains reserved characters".to_string(),
            });
        }
        Ok(Self { depot, key })
    }
}
