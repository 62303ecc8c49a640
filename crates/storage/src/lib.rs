//! On-disk stores for depotkeep.
//!
//! This crate provides:
//! - The capped slot store (trait + filesystem backend)
//! - Manifest records across libraries
//! - The key store file
//! - Depot manifest files in the depot cache

pub mod atomic;
pub mod backends;
pub mod depot_cache;
pub mod error;
pub mod keystore;
pub mod manifests;
pub mod slots;

pub use backends::filesystem::FilesystemSlotStore;
pub use depot_cache::DepotCache;
pub use error::{StorageError, StorageResult};
pub use keystore::KeyStoreFile;
pub use manifests::ManifestStore;
pub use slots::{AddOutcome, SLOT_CAPACITY, SlotEntry, SlotStore};

use depotkeep_core::config::ClientConfig;
use std::sync::Arc;

/// Create the slot store for a client configuration.
pub fn slot_store_from_config(client: &ClientConfig) -> Arc<dyn SlotStore> {
    Arc::new(FilesystemSlotStore::new(client.slot_dir()))
}

/// Create the depot cache for a client configuration.
pub fn depot_cache_from_config(client: &ClientConfig) -> DepotCache {
    DepotCache::new(client.depotcache_dir(), vec![client.steamapps_dir()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use depotkeep_core::ItemId;

    #[tokio::test]
    async fn slot_store_from_config_uses_slot_dir() {
        let temp = tempfile::tempdir().unwrap();
        let client = ClientConfig {
            root: temp.path().to_path_buf(),
            ..ClientConfig::default()
        };

        let store = slot_store_from_config(&client);
        store.add(&[ItemId::new("730").unwrap()]).await.unwrap();
        assert!(temp.path().join("AppList/0.txt").exists());
        assert_eq!(store.capacity(), SLOT_CAPACITY);
    }
}
