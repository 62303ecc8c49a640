//! Core domain types and shared logic for depotkeep.
//!
//! This crate defines the data model used across all other crates:
//! - Item identifiers and decryption key records
//! - Unlock script parsing
//! - App manifest records
//! - Key store text editing
//! - Configuration

pub mod config;
pub mod dependents;
pub mod depot_names;
pub mod error;
pub mod item;
pub mod keystore;
pub mod manifest;
pub mod unlock_script;
pub mod vdf;

pub use config::{AppConfig, ResolveMode};
pub use dependents::{DependentSet, RemoteLookup};
pub use depot_names::DepotNames;
pub use error::{Error, Result};
pub use item::{ItemId, KeyRecord};
pub use manifest::AppManifest;
pub use unlock_script::{UnlockScript, extract_depot_keys};

/// Maximum number of slot files the game client honours.
pub const SLOT_CAPACITY: usize = 128;
