//! Local filesystem slot store.

use crate::atomic;
use crate::error::{StorageError, StorageResult};
use crate::slots::{AddOutcome, SLOT_CAPACITY, SlotEntry, SlotStore};
use async_trait::async_trait;
use depotkeep_core::ItemId;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::instrument;

/// Slot file extension.
const SLOT_EXT: &str = "txt";

/// One `*.txt` file found in the slot directory.
#[derive(Debug)]
struct SlotFile {
    path: PathBuf,
    slot: Option<u32>,
    id: Option<ItemId>,
}

/// Slot store backed by a directory of `<n>.txt` files.
pub struct FilesystemSlotStore {
    dir: PathBuf,
    capacity: usize,
}

impl FilesystemSlotStore {
    /// Create a store over `dir`. The directory is created on first write.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            capacity: SLOT_CAPACITY,
        }
    }

    /// Override the capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, slot: u32) -> PathBuf {
        self.dir.join(format!("{slot}.{SLOT_EXT}"))
    }

    /// Enumerate slot files in directory order.
    async fn scan(&self) -> StorageResult<Vec<SlotFile>> {
        let mut files = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) if e.kind() == std::io::ErrorKind::NotADirectory => {
                return Err(StorageError::NotADirectory(self.dir.clone()));
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_slot_file = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(SLOT_EXT));
            if !is_slot_file || !entry.file_type().await?.is_file() {
                continue;
            }

            let slot = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u32>().ok());

            let id = match fs::read_to_string(&path).await {
                Ok(content) => {
                    let content = content.trim();
                    match ItemId::new(content) {
                        Ok(id) => Some(id),
                        Err(_) => {
                            if !content.is_empty() {
                                tracing::debug!(
                                    path = %path.display(),
                                    "slot file holds no item id"
                                );
                            }
                            None
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "skipping unreadable slot file"
                    );
                    None
                }
            };

            files.push(SlotFile { path, slot, id });
        }

        Ok(files)
    }
}

#[async_trait]
impl SlotStore for FilesystemSlotStore {
    fn capacity(&self) -> usize {
        self.capacity
    }

    #[instrument(skip(self, ids), fields(store = "slots", requested = ids.len()))]
    async fn add(&self, ids: &[ItemId]) -> StorageResult<AddOutcome> {
        let files = self.scan().await?;
        let existing: HashSet<&ItemId> = files.iter().filter_map(|f| f.id.as_ref()).collect();

        let mut fresh: Vec<&ItemId> = Vec::new();
        for id in ids {
            if !existing.contains(id) && !fresh.contains(&id) {
                fresh.push(id);
            }
        }
        if fresh.is_empty() {
            tracing::debug!("all ids already whitelisted");
            return Ok(AddOutcome::AlreadyPresent);
        }

        if files.len() + fresh.len() > self.capacity {
            return Err(StorageError::CapacityExceeded {
                requested: fresh.len(),
                existing: files.len(),
                capacity: self.capacity,
            });
        }

        atomic::ensure_dir(&self.dir).await?;

        let mut used: BTreeSet<u32> = files.iter().filter_map(|f| f.slot).collect();
        let mut next = 0u32;
        let mut added = Vec::with_capacity(fresh.len());

        for id in fresh {
            while used.contains(&next) {
                next += 1;
            }
            let path = self.slot_path(next);
            if let Err(e) = atomic::write(&path, id.as_str().as_bytes()).await {
                // Undo this call's writes so capacity accounting stays exact.
                for entry in &added {
                    if let SlotEntry { slot: Some(slot), .. } = entry {
                        let path = self.slot_path(*slot);
                        if let Err(undo) = atomic::remove_optional(&path).await {
                            tracing::warn!(
                                path = %path.display(),
                                error = %undo,
                                "failed to roll back slot file"
                            );
                        }
                    }
                }
                return Err(e);
            }
            used.insert(next);
            added.push(SlotEntry {
                slot: Some(next),
                id: id.clone(),
            });
        }

        tracing::info!(added = added.len(), "slots written");
        Ok(AddOutcome::Added(added))
    }

    #[instrument(skip(self, ids), fields(store = "slots", requested = ids.len()))]
    async fn remove_many(&self, ids: &[ItemId]) -> StorageResult<Vec<SlotEntry>> {
        let mut removed = Vec::new();
        for file in self.scan().await? {
            let Some(id) = file.id else { continue };
            if !ids.contains(&id) {
                continue;
            }
            if atomic::remove_optional(&file.path).await? {
                tracing::debug!(path = %file.path.display(), %id, "slot removed");
                removed.push(SlotEntry {
                    slot: file.slot,
                    id,
                });
            }
        }
        if !removed.is_empty() {
            tracing::info!(removed = removed.len(), "slots removed");
        }
        Ok(removed)
    }

    #[instrument(skip(self), fields(store = "slots"))]
    async fn count(&self) -> StorageResult<usize> {
        Ok(self.scan().await?.len())
    }

    #[instrument(skip(self), fields(store = "slots"))]
    async fn list(&self) -> StorageResult<Vec<SlotEntry>> {
        Ok(self
            .scan()
            .await?
            .into_iter()
            .filter_map(|f| f.id.map(|id| SlotEntry { slot: f.slot, id }))
            .collect())
    }
}
