//! Key store file (`config/config.vdf`).

use crate::atomic;
use crate::error::StorageResult;
use depotkeep_core::keystore::{self, DEPOTS_SECTION, UpsertMode};
use depotkeep_core::{ItemId, KeyRecord};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Read-modify-write access to the client's key store.
#[derive(Clone, Debug)]
pub struct KeyStoreFile {
    path: PathBuf,
}

impl KeyStoreFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where discarded content is preserved before a rebuild.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".bak");
        self.path.with_file_name(name)
    }

    /// Key records currently stored.
    #[instrument(skip(self), fields(store = "keystore"))]
    pub async fn records(&self) -> StorageResult<Vec<KeyRecord>> {
        match atomic::read_optional(&self.path).await? {
            Some(text) => Ok(keystore::read_records(&text, DEPOTS_SECTION)?),
            None => Ok(Vec::new()),
        }
    }

    /// Insert or replace `records`. An empty slice is a no-op.
    ///
    /// When the store has no depots section it is rebuilt from the template;
    /// any non-blank previous content is first copied to
    /// [`backup_path`](Self::backup_path).
    #[instrument(skip(self, records), fields(store = "keystore", records = records.len()))]
    pub async fn upsert(&self, records: &[KeyRecord]) -> StorageResult<Option<UpsertMode>> {
        if records.is_empty() {
            return Ok(None);
        }
        let existing = atomic::read_optional(&self.path).await?.unwrap_or_default();
        let upsert = keystore::upsert_section(&existing, DEPOTS_SECTION, records)?;

        if let UpsertMode::Synthesized { discarded: true } = upsert.mode {
            let backup = self.backup_path();
            atomic::write(&backup, existing.as_bytes()).await?;
            tracing::warn!(
                backup = %backup.display(),
                "key store had no depots section, rebuilt from template"
            );
        }

        if let Some(parent) = self.path.parent() {
            atomic::ensure_dir(parent).await?;
        }
        atomic::write(&self.path, upsert.text.as_bytes()).await?;
        tracing::info!(mode = ?upsert.mode, "key store updated");
        Ok(Some(upsert.mode))
    }

    /// Remove the records of `depots`. Returns the depots actually removed;
    /// the file is only rewritten when something changed.
    #[instrument(skip(self, depots), fields(store = "keystore", requested = depots.len()))]
    pub async fn remove(&self, depots: &[ItemId]) -> StorageResult<Vec<ItemId>> {
        let Some(existing) = atomic::read_optional(&self.path).await? else {
            return Ok(Vec::new());
        };
        let removal = keystore::remove_records(&existing, DEPOTS_SECTION, depots)?;
        if !removal.removed.is_empty() {
            atomic::write(&self.path, removal.text.as_bytes()).await?;
            tracing::info!(removed = removal.removed.len(), "key records removed");
        }
        Ok(removal.removed)
    }
}
