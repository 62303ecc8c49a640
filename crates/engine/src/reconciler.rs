//! Install and uninstall across the slot store, manifest records, depot
//! manifests and the key store.
//!
//! The stores are independent files with no shared transaction. Install
//! refuses to start when the slot store lacks room, then writes each store in
//! turn; uninstall attempts every store even after a failure. Completed
//! steps are never rolled back: the reports say exactly what happened.

use crate::error::{EngineError, EngineResult};
use crate::report::{
    InstallReport, InstalledItem, ItemState, Plan, Presence, Step, StepOutcome, UninstallReport,
};
use crate::request::InstallRequest;
use depotkeep_core::config::{AppConfig, ClientConfig};
use depotkeep_core::{AppManifest, DependentSet, ItemId};
use depotkeep_metadata::{Resolver, resolver_from_config};
use depotkeep_storage::{
    AddOutcome, DepotCache, KeyStoreFile, ManifestStore, SlotStore, depot_cache_from_config,
    slot_store_from_config,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

fn failed(e: impl std::fmt::Display) -> StepOutcome {
    StepOutcome::Failed(e.to_string())
}

fn done_if(changed: bool) -> StepOutcome {
    if changed {
        StepOutcome::Completed
    } else {
        StepOutcome::Skipped
    }
}

/// Reconciliation engine over one client installation.
pub struct Reconciler {
    client: ClientConfig,
    slots: Arc<dyn SlotStore>,
    manifests: ManifestStore,
    keys: KeyStoreFile,
    depot_cache: DepotCache,
    resolver: Resolver,
}

impl Reconciler {
    pub fn new(client: ClientConfig, slots: Arc<dyn SlotStore>, resolver: Resolver) -> Self {
        Self {
            manifests: ManifestStore::from_client(&client),
            keys: KeyStoreFile::new(client.key_store_path()),
            depot_cache: depot_cache_from_config(&client),
            client,
            slots,
            resolver,
        }
    }

    pub fn from_config(config: &AppConfig) -> EngineResult<Self> {
        config
            .validate()
            .map_err(|e| EngineError::Core(depotkeep_core::Error::Config(e)))?;
        let slots = slot_store_from_config(&config.client);
        let resolver = resolver_from_config(config, slots.clone())?;
        Ok(Self::new(config.client.clone(), slots, resolver))
    }

    pub fn slots(&self) -> &Arc<dyn SlotStore> {
        &self.slots
    }

    pub fn manifests(&self) -> &ManifestStore {
        &self.manifests
    }

    pub fn key_store(&self) -> &KeyStoreFile {
        &self.keys
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Capacity available for installing `item` with `dependents`.
    pub async fn plan(&self, item: &ItemId, dependents: &[ItemId]) -> EngineResult<Plan> {
        let capacity = self.slots.capacity();
        let used = self.slots.count().await?;
        let whitelisted: HashSet<ItemId> =
            self.slots.list().await?.into_iter().map(|e| e.id).collect();

        let remaining = capacity.saturating_sub(used);
        let item_cost = usize::from(!whitelisted.contains(item));
        let mut seen = HashSet::new();
        let requested = dependents
            .iter()
            .filter(|id| *id != item && !whitelisted.contains(*id) && seen.insert(*id))
            .count();

        Ok(Plan {
            capacity,
            used,
            remaining,
            requested,
            max_dependents: remaining.saturating_sub(item_cost),
        })
    }

    /// Install an item.
    ///
    /// Returns an error, without touching any store, when the selection is
    /// invalid, the target library is not configured, or the slot store
    /// cannot take the new ids. Later step failures are reported in the
    /// returned [`InstallReport`].
    #[instrument(skip(self, request), fields(item = %request.item))]
    pub async fn install(&self, request: &InstallRequest) -> EngineResult<InstallReport> {
        let item = &request.item;
        let selected = request.selected()?;
        if let Some(library) = &request.library {
            self.manifests.library_dir(library)?;
        }
        tracing::info!(
            from = "absent",
            to = "installing",
            dependents = selected.len(),
            "state transition"
        );

        let mut report = InstallReport::new(item.clone());

        let mut ids = Vec::with_capacity(selected.len() + 1);
        ids.push(item.clone());
        ids.extend(selected.iter().cloned());
        match self.slots.add(&ids).await {
            Ok(AddOutcome::AlreadyPresent) => report.record(Step::Slots, StepOutcome::Skipped),
            Ok(AddOutcome::Added(entries)) => {
                report.slots_added = entries;
                report.record(Step::Slots, StepOutcome::Completed);
            }
            Err(e) => {
                tracing::error!(error = %e, "slot allocation failed, install aborted");
                tracing::info!(from = "installing", to = "absent", "state transition");
                return Err(e.into());
            }
        }

        let record = AppManifest::new(
            item.clone(),
            request.display_name(),
            request.install_dir_name(),
        )
        .with_depots(selected.iter().cloned())
        .with_launcher(self.client.launcher_path().display().to_string())
        .with_language(self.client.language.as_str());
        match self.manifests.write(&record, request.library.as_deref()).await {
            Ok(path) => {
                report.manifest_path = Some(path);
                report.record(Step::Manifest, StepOutcome::Completed);
            }
            Err(e) => report.record(Step::Manifest, failed(e)),
        }

        match &request.depot_manifests {
            Some(source) => {
                let filter: &[ItemId] = if request.selection.is_some() {
                    selected.as_slice()
                } else {
                    &[]
                };
                match self.depot_cache.install_from(source, filter).await {
                    Ok(paths) => {
                        report.record(Step::DepotManifests, done_if(!paths.is_empty()));
                        report.depot_manifests = paths;
                    }
                    Err(e) => report.record(Step::DepotManifests, failed(e)),
                }
            }
            None => report.record(Step::DepotManifests, StepOutcome::Skipped),
        }

        let records = request.key_records(&selected);
        match self.keys.upsert(&records).await {
            Ok(mode) => {
                report.keys_written = if mode.is_some() { records.len() } else { 0 };
                report.keystore_mode = mode;
                report.record(Step::Keys, done_if(mode.is_some()));
            }
            Err(e) => report.record(Step::Keys, failed(e)),
        }

        if report.is_success() {
            tracing::info!(from = "installing", to = "installed", "state transition");
        } else {
            tracing::warn!(
                failed = report.failures().len(),
                "install finished with failed steps"
            );
        }
        Ok(report)
    }

    /// Uninstall an item and everything that depends on it.
    ///
    /// Every store is attempted regardless of earlier failures.
    #[instrument(skip(self, item), fields(item = %item))]
    pub async fn uninstall(&self, item: &ItemId) -> UninstallReport {
        tracing::info!(from = "installed", to = "uninstalling", "state transition");

        let (set, resolved) = match self.resolver.resolve(item).await {
            Ok(set) => (set, StepOutcome::Completed),
            Err(e) => (DependentSet::new(item.clone()), failed(e)),
        };
        if set.is_unknown() {
            tracing::warn!("no local record or remote data, removing the item id only");
        }
        let ids = set.ids();
        let mut report = UninstallReport::new(set);
        report.record(Step::Resolve, resolved);

        match self.slots.remove_many(&ids).await {
            Ok(removed) => {
                report.slots_removed = removed.len();
                report.record(Step::Slots, done_if(!removed.is_empty()));
            }
            Err(e) => report.record(Step::Slots, failed(e)),
        }

        match self.manifests.remove(item).await {
            Ok(removed) => {
                report.manifest_removed = removed;
                report.record(Step::Manifest, done_if(removed));
            }
            Err(e) => report.record(Step::Manifest, failed(e)),
        }

        match self.depot_cache.remove_residuals(&ids).await {
            Ok(paths) => {
                report.record(Step::DepotManifests, done_if(!paths.is_empty()));
                report.residual_manifests = paths;
            }
            Err(e) => report.record(Step::DepotManifests, failed(e)),
        }

        match self.keys.remove(&ids).await {
            Ok(removed) => {
                report.record(Step::Keys, done_if(!removed.is_empty()));
                report.keys_removed = removed;
            }
            Err(e) => report.record(Step::Keys, failed(e)),
        }

        if report.is_success() {
            tracing::info!(from = "uninstalling", to = "absent", "state transition");
        } else {
            tracing::warn!(
                failed = report.failures().len(),
                "uninstall finished with failed steps"
            );
        }
        report
    }

    /// Which stores reference `item`.
    #[instrument(skip(self, item), fields(item = %item))]
    pub async fn inspect(&self, item: &ItemId) -> EngineResult<Presence> {
        let whitelisted: HashSet<ItemId> =
            self.slots.list().await?.into_iter().map(|e| e.id).collect();

        let text = self.manifests.read_text(item).await?;
        let manifest = text.as_deref().and_then(|text| match AppManifest::parse(text) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(error = %e, "manifest record unparseable");
                None
            }
        });

        let keyed: HashSet<ItemId> = self
            .keys
            .records()
            .await?
            .into_iter()
            .map(|r| r.depot)
            .collect();
        let dependents = manifest
            .as_ref()
            .map(|m| m.depots.as_slice())
            .unwrap_or_default();

        let is_whitelisted = whitelisted.contains(item);
        let has_record = text.is_some();
        let keyed_dependents: Vec<ItemId> = dependents
            .iter()
            .filter(|id| keyed.contains(*id))
            .cloned()
            .collect();
        let whitelisted_dependents: Vec<ItemId> = dependents
            .iter()
            .filter(|id| whitelisted.contains(*id))
            .cloned()
            .collect();

        let state = match (is_whitelisted, has_record) {
            (true, true) => ItemState::Installed,
            (false, false) if !keyed.contains(item) => ItemState::Absent,
            _ => ItemState::Inconsistent,
        };

        Ok(Presence {
            item: item.clone(),
            whitelisted: is_whitelisted,
            whitelisted_dependents,
            keyed_dependents,
            manifest,
            state,
        })
    }

    /// Items holding both a manifest record and a slot entry.
    #[instrument(skip(self))]
    pub async fn installed(&self) -> EngineResult<Vec<InstalledItem>> {
        let whitelisted: HashSet<ItemId> =
            self.slots.list().await?.into_iter().map(|e| e.id).collect();

        Ok(self
            .manifests
            .list()
            .await?
            .into_iter()
            .filter(|m| whitelisted.contains(&m.appid))
            .map(|manifest| {
                let dependents = manifest
                    .depots
                    .iter()
                    .filter(|id| whitelisted.contains(*id))
                    .cloned()
                    .collect();
                InstalledItem {
                    manifest,
                    dependents,
                }
            })
            .collect())
    }
}
