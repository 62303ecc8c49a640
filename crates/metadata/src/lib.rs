//! Dependent-set resolution for depotkeep.
//!
//! This crate provides:
//! - The resolver combining local records with remote metadata
//! - The HTTP metadata client

pub mod error;
pub mod remote;
pub mod resolver;

pub use error::{MetadataError, MetadataResult};
pub use remote::{HttpMetadataSource, MetadataSession, RemoteMetadata};
pub use resolver::Resolver;

use depotkeep_core::config::AppConfig;
use depotkeep_storage::{ManifestStore, SlotStore};
use std::sync::Arc;

/// Create a resolver from configuration.
pub fn resolver_from_config(
    config: &AppConfig,
    slots: Arc<dyn SlotStore>,
) -> MetadataResult<Resolver> {
    let resolver = Resolver::new(ManifestStore::from_client(&config.client), slots)
        .with_mode(config.remote.mode);
    if !config.remote.enabled {
        return Ok(resolver);
    }
    config.remote.validate().map_err(MetadataError::Config)?;
    let remote = HttpMetadataSource::from_config(&config.remote)?;
    Ok(resolver.with_remote(Arc::new(remote)))
}
