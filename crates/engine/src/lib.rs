//! Install/uninstall reconciliation for depotkeep.
//!
//! The [`Reconciler`] drives the slot store, manifest records, depot
//! manifests and the key store through an item's lifecycle:
//! `absent → installing → installed → uninstalling → absent`. The state is
//! never persisted; [`Reconciler::inspect`] infers it from the stores.

pub mod error;
pub mod reconciler;
pub mod report;
pub mod request;

pub use error::{EngineError, EngineResult};
pub use reconciler::Reconciler;
pub use report::{
    InstallReport, InstalledItem, ItemState, Plan, Presence, Step, StepOutcome, StepReport,
    UninstallReport,
};
pub use request::InstallRequest;
