//! Slot store abstraction.
//!
//! The game client whitelists item ids through a directory of small
//! numbered files, one id per file, capped at [`SLOT_CAPACITY`] files.

use crate::error::StorageResult;
use async_trait::async_trait;
use depotkeep_core::ItemId;

pub use depotkeep_core::SLOT_CAPACITY;

/// An occupied slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotEntry {
    /// Slot number, `None` when the file stem is not numeric.
    pub slot: Option<u32>,
    pub id: ItemId,
}

/// Result of [`SlotStore::add`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    /// New slots were written.
    Added(Vec<SlotEntry>),
    /// Every id was already present; nothing was written.
    AlreadyPresent,
}

impl AddOutcome {
    /// Entries written by this call.
    pub fn added(&self) -> &[SlotEntry] {
        match self {
            Self::Added(entries) => entries,
            Self::AlreadyPresent => &[],
        }
    }
}

/// Capped whitelist of item ids.
#[async_trait]
pub trait SlotStore: Send + Sync + 'static {
    /// Maximum number of files the store may hold.
    fn capacity(&self) -> usize;

    /// Add ids not already present.
    ///
    /// Ids are de-duplicated against existing content and among
    /// themselves. Fails with `CapacityExceeded`, without writing anything,
    /// when the new ids do not all fit.
    async fn add(&self, ids: &[ItemId]) -> StorageResult<AddOutcome>;

    /// Remove every slot holding `id`. Returns the number removed.
    async fn remove(&self, id: &ItemId) -> StorageResult<usize> {
        Ok(self.remove_many(std::slice::from_ref(id)).await?.len())
    }

    /// Remove every slot holding any of `ids` in a single pass.
    async fn remove_many(&self, ids: &[ItemId]) -> StorageResult<Vec<SlotEntry>>;

    /// Whether any slot holds `id`.
    async fn contains(&self, id: &ItemId) -> StorageResult<bool> {
        Ok(self.list().await?.iter().any(|entry| entry.id == *id))
    }

    /// Number of files counted against capacity.
    async fn count(&self) -> StorageResult<usize>;

    /// Occupied slots with readable content.
    async fn list(&self) -> StorageResult<Vec<SlotEntry>>;

    /// Free capacity.
    async fn remaining(&self) -> StorageResult<usize> {
        Ok(self.capacity().saturating_sub(self.count().await?))
    }
}
