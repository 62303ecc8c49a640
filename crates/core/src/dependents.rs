//! Resolved item → dependents mapping.

use crate::item::ItemId;
use std::collections::BTreeSet;

/// Outcome of the remote metadata lookup for one resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteLookup {
    /// Not attempted (local data sufficed or remote lookups are disabled).
    Skipped,
    /// Attempted but failed, timed out or returned nothing usable.
    Unavailable,
    /// Returned this many dependents.
    Found(usize),
}

/// An item and every dependent known for it.
///
/// Computed per operation and never persisted. The primary id is always a
/// member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependentSet {
    primary: ItemId,
    dependents: BTreeSet<ItemId>,
    /// Whether a local manifest record for the primary was found.
    pub local_record: bool,
    pub remote: RemoteLookup,
}

impl DependentSet {
    pub fn new(primary: ItemId) -> Self {
        Self {
            primary,
            dependents: BTreeSet::new(),
            local_record: false,
            remote: RemoteLookup::Skipped,
        }
    }

    pub fn primary(&self) -> &ItemId {
        &self.primary
    }

    /// Add dependents; the primary id is ignored.
    pub fn extend(&mut self, ids: impl IntoIterator<Item = ItemId>) {
        for id in ids {
            if id != self.primary {
                self.dependents.insert(id);
            }
        }
    }

    /// Dependents, excluding the primary.
    pub fn dependents(&self) -> impl Iterator<Item = &ItemId> {
        self.dependents.iter()
    }

    pub fn dependent_count(&self) -> usize {
        self.dependents.len()
    }

    /// Every id: the primary followed by its dependents.
    pub fn ids(&self) -> Vec<ItemId> {
        std::iter::once(&self.primary)
            .chain(self.dependents.iter())
            .cloned()
            .collect()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        *id == self.primary || self.dependents.contains(id)
    }

    /// True when nothing beyond the bare id was found anywhere.
    pub fn is_unknown(&self) -> bool {
        !self.local_record
            && self.dependents.is_empty()
            && !matches!(self.remote, RemoteLookup::Found(n) if n > 0)
    }
}
