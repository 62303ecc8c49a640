//! Dependent-set resolution.
//!
//! Local state is consulted first: the item's manifest record lists its
//! installed depots, and any other id it mentions that is also whitelisted
//! in the slot store is taken as a dependent. The remote source fills in
//! what local state cannot.

use crate::error::MetadataResult;
use crate::remote::RemoteMetadata;
use depotkeep_core::{AppManifest, DependentSet, ItemId, RemoteLookup, ResolveMode, manifest};
use depotkeep_storage::{ManifestStore, SlotStore};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

/// Recovers the dependent set of an item.
pub struct Resolver {
    manifests: ManifestStore,
    slots: Arc<dyn SlotStore>,
    remote: Option<Arc<dyn RemoteMetadata>>,
    mode: ResolveMode,
}

impl Resolver {
    pub fn new(manifests: ManifestStore, slots: Arc<dyn SlotStore>) -> Self {
        Self {
            manifests,
            slots,
            remote: None,
            mode: ResolveMode::default(),
        }
    }

    /// Enable remote lookups.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteMetadata>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_mode(mut self, mode: ResolveMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ResolveMode {
        self.mode
    }

    /// Resolve with the configured mode.
    pub async fn resolve(&self, item: &ItemId) -> MetadataResult<DependentSet> {
        self.resolve_with_mode(item, self.mode).await
    }

    /// Resolve `item`. Remote failures degrade to
    /// [`RemoteLookup::Unavailable`]; local I/O errors are returned.
    #[instrument(skip(self, item), fields(item = %item))]
    pub async fn resolve_with_mode(
        &self,
        item: &ItemId,
        mode: ResolveMode,
    ) -> MetadataResult<DependentSet> {
        let mut set = DependentSet::new(item.clone());
        self.resolve_local(&mut set).await?;

        let wants_remote = match mode {
            ResolveMode::Fallback => set.dependent_count() == 0,
            ResolveMode::Complete => true,
        };
        if let Some(remote) = self.remote.as_ref().filter(|_| wants_remote) {
            match remote.dependents(item).await {
                Ok(ids) => {
                    set.remote = RemoteLookup::Found(ids.len());
                    set.extend(ids);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "remote metadata unavailable");
                    set.remote = RemoteLookup::Unavailable;
                }
            }
        }

        tracing::debug!(
            dependents = set.dependent_count(),
            local_record = set.local_record,
            remote = ?set.remote,
            "dependent set resolved"
        );
        Ok(set)
    }

    async fn resolve_local(&self, set: &mut DependentSet) -> MetadataResult<()> {
        let Some(text) = self.manifests.read_text(set.primary()).await? else {
            return Ok(());
        };
        set.local_record = true;

        match AppManifest::parse(&text) {
            Ok(record) => set.extend(record.depots),
            Err(e) => tracing::warn!(error = %e, "manifest record unparseable, scanning raw text"),
        }

        let referenced = manifest::referenced_ids(&text);
        if !referenced.is_empty() {
            let whitelisted: HashSet<ItemId> =
                self.slots.list().await?.into_iter().map(|e| e.id).collect();
            set.extend(referenced.into_iter().filter(|id| whitelisted.contains(id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetadataError;
    use async_trait::async_trait;
    use depotkeep_storage::FilesystemSlotStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn id(s: &str) -> ItemId {
        ItemId::new(s).unwrap()
    }

    struct FakeRemote {
        reply: Option<Vec<ItemId>>,
        calls: AtomicUsize,
    }

    impl FakeRemote {
        fn new(reply: Option<Vec<ItemId>>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RemoteMetadata for FakeRemote {
        async fn dependents(&self, _item: &ItemId) -> MetadataResult<Vec<ItemId>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .clone()
                .ok_or_else(|| MetadataError::Malformed("offline".to_string()))
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        manifests: ManifestStore,
        slots: Arc<FilesystemSlotStore>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let manifests = ManifestStore::new(dir.path().join("steamapps"), Vec::new());
        let slots = Arc::new(FilesystemSlotStore::new(dir.path().join("AppList")));
        Fixture {
            _dir: dir,
            manifests,
            slots,
        }
    }

    #[tokio::test]
    async fn test_local_record_skips_remote_in_fallback() {
        let fx = fixture();
        fx.manifests
            .write(
                &AppManifest::new(id("100"), "Game", "Game").with_depots([id("200"), id("201")]),
                None,
            )
            .await
            .unwrap();
        let remote = FakeRemote::new(Some(vec![id("999")]));
        let resolver =
            Resolver::new(fx.manifests.clone(), fx.slots.clone()).with_remote(remote.clone());

        let set = resolver.resolve(&id("100")).await.unwrap();
        assert_eq!(set.ids(), vec![id("100"), id("200"), id("201")]);
        assert!(set.local_record);
        assert_eq!(set.remote, RemoteLookup::Skipped);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_complete_mode_unions_remote() {
        let fx = fixture();
        fx.manifests
            .write(&AppManifest::new(id("100"), "Game", "Game").with_depots([id("200")]), None)
            .await
            .unwrap();
        let remote = FakeRemote::new(Some(vec![id("200"), id("202")]));
        let resolver = Resolver::new(fx.manifests.clone(), fx.slots.clone())
            .with_remote(remote)
            .with_mode(ResolveMode::Complete);

        let set = resolver.resolve(&id("100")).await.unwrap();
        assert_eq!(set.ids(), vec![id("100"), id("200"), id("202")]);
        assert_eq!(set.remote, RemoteLookup::Found(2));
    }

    #[tokio::test]
    async fn test_remote_failure_degrades() {
        let fx = fixture();
        let resolver = Resolver::new(fx.manifests.clone(), fx.slots.clone())
            .with_remote(FakeRemote::new(None));

        let set = resolver.resolve(&id("100")).await.unwrap();
        assert_eq!(set.ids(), vec![id("100")]);
        assert_eq!(set.remote, RemoteLookup::Unavailable);
        assert!(set.is_unknown());
    }

    #[tokio::test]
    async fn test_referenced_ids_need_whitelisting() {
        let fx = fixture();
        let steamapps = fx.manifests.dirs().next().unwrap().to_path_buf();
        tokio::fs::create_dir_all(&steamapps).await.unwrap();
        // A client-written record: no InstalledDepots, but mentions ids.
        let text = "\"AppState\"\n{\n\t\"appid\"\t\t\"100\"\n\t\"LastOwner\"\t\t\"76561198000000000\"\n\t\"SharedDepots\"\n\t{\n\t\t\"228988\"\t\t\"228980\"\n\t}\n}\n";
        tokio::fs::write(steamapps.join("appmanifest_100.acf"), text)
            .await
            .unwrap();
        fx.slots.add(&[id("100"), id("228980")]).await.unwrap();

        let resolver = Resolver::new(fx.manifests.clone(), fx.slots.clone());
        let set = resolver.resolve(&id("100")).await.unwrap();
        assert_eq!(set.ids(), vec![id("100"), id("228980")]);
        assert_eq!(set.remote, RemoteLookup::Skipped);
    }
}
