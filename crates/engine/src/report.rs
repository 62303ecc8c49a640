//! Per-step operation reports.

use depotkeep_core::keystore::UpsertMode;
use depotkeep_core::{AppManifest, DependentSet, ItemId};
use depotkeep_storage::SlotEntry;
use std::fmt;
use std::path::PathBuf;

/// A store-touching step of an install or uninstall.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Resolve,
    Slots,
    Manifest,
    DepotManifests,
    Keys,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Resolve => "resolve",
            Self::Slots => "slots",
            Self::Manifest => "manifest",
            Self::DepotManifests => "depot manifests",
            Self::Keys => "keys",
        })
    }
}

/// How a step ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    /// Nothing to do.
    Skipped,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepReport {
    pub step: Step,
    pub outcome: StepOutcome,
}

fn record(steps: &mut Vec<StepReport>, step: Step, outcome: StepOutcome) {
    if let StepOutcome::Failed(reason) = &outcome {
        tracing::warn!(%step, %reason, "step failed");
    }
    steps.push(StepReport { step, outcome });
}

fn failures(steps: &[StepReport]) -> Vec<&StepReport> {
    steps
        .iter()
        .filter(|s| matches!(s.outcome, StepOutcome::Failed(_)))
        .collect()
}

/// Result of an install.
#[derive(Clone, Debug)]
pub struct InstallReport {
    pub item: ItemId,
    pub slots_added: Vec<SlotEntry>,
    pub manifest_path: Option<PathBuf>,
    pub depot_manifests: Vec<PathBuf>,
    pub keys_written: usize,
    pub keystore_mode: Option<UpsertMode>,
    pub steps: Vec<StepReport>,
}

impl InstallReport {
    pub(crate) fn new(item: ItemId) -> Self {
        Self {
            item,
            slots_added: Vec::new(),
            manifest_path: None,
            depot_manifests: Vec::new(),
            keys_written: 0,
            keystore_mode: None,
            steps: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, step: Step, outcome: StepOutcome) {
        record(&mut self.steps, step, outcome);
    }

    pub fn failures(&self) -> Vec<&StepReport> {
        failures(&self.steps)
    }

    pub fn is_success(&self) -> bool {
        self.failures().is_empty()
    }
}

/// Result of an uninstall.
#[derive(Clone, Debug)]
pub struct UninstallReport {
    pub dependents: DependentSet,
    pub slots_removed: usize,
    pub manifest_removed: bool,
    pub residual_manifests: Vec<PathBuf>,
    pub keys_removed: Vec<ItemId>,
    pub steps: Vec<StepReport>,
}

impl UninstallReport {
    pub(crate) fn new(dependents: DependentSet) -> Self {
        Self {
            dependents,
            slots_removed: 0,
            manifest_removed: false,
            residual_manifests: Vec::new(),
            keys_removed: Vec::new(),
            steps: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, step: Step, outcome: StepOutcome) {
        record(&mut self.steps, step, outcome);
    }

    pub fn failures(&self) -> Vec<&StepReport> {
        failures(&self.steps)
    }

    pub fn is_success(&self) -> bool {
        self.failures().is_empty()
    }

    /// Whether anything at all was removed.
    pub fn removed_anything(&self) -> bool {
        self.slots_removed > 0
            || self.manifest_removed
            || !self.residual_manifests.is_empty()
            || !self.keys_removed.is_empty()
    }
}

/// Inferred lifecycle state of an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemState {
    Absent,
    Installed,
    /// Some stores reference the item and others do not.
    Inconsistent,
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Absent => "absent",
            Self::Installed => "installed",
            Self::Inconsistent => "inconsistent",
        })
    }
}

/// Which stores reference an item.
#[derive(Clone, Debug)]
pub struct Presence {
    pub item: ItemId,
    pub whitelisted: bool,
    pub manifest: Option<AppManifest>,
    /// Dependents (from the manifest record) that are whitelisted.
    pub whitelisted_dependents: Vec<ItemId>,
    /// Dependents (from the manifest record) holding a key record.
    pub keyed_dependents: Vec<ItemId>,
    pub state: ItemState,
}

/// Slot capacity available for a prospective install.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Plan {
    pub capacity: usize,
    pub used: usize,
    pub remaining: usize,
    /// Dependents requested.
    pub requested: usize,
    /// How many dependents fit next to the item itself.
    pub max_dependents: usize,
}

impl Plan {
    pub fn fits(&self) -> bool {
        self.requested <= self.max_dependents
    }
}

/// An item with both a manifest record and a slot entry.
#[derive(Clone, Debug)]
pub struct InstalledItem {
    pub manifest: AppManifest,
    /// Dependents referenced by the record and whitelisted.
    pub dependents: Vec<ItemId>,
}
