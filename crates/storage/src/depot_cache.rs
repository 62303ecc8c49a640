//! Depot manifest files (`<depot>_<gid>.manifest`).
//!
//! The client keeps downloaded depot manifests in its depot cache; stale
//! copies can also sit in the default library.

use crate::atomic;
use crate::error::{StorageError, StorageResult};
use depotkeep_core::ItemId;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::instrument;

const MANIFEST_EXT: &str = ".manifest";

/// Whether `file_name` is a depot manifest belonging to `depot`.
///
/// Requires the exact id followed by `_`, so depot `12` never matches
/// `123_456.manifest`.
pub fn belongs_to(file_name: &str, depot: &ItemId) -> bool {
    file_name
        .strip_prefix(depot.as_str())
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|rest| rest.len() > MANIFEST_EXT.len() && rest.ends_with(MANIFEST_EXT))
}

/// Depot manifest housekeeping.
#[derive(Clone, Debug)]
pub struct DepotCache {
    cache_dir: PathBuf,
    residual_dirs: Vec<PathBuf>,
}

impl DepotCache {
    /// `cache_dir` receives installed manifests; residuals are purged from
    /// it and from every directory in `residual_dirs`.
    pub fn new(cache_dir: impl Into<PathBuf>, residual_dirs: Vec<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            residual_dirs,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Copy depot manifests found under `source` into the cache.
    ///
    /// With a non-empty `selected`, only manifests of those depots are
    /// copied. Existing files are replaced.
    #[instrument(skip(self, selected), fields(store = "depotcache", source = %source.display()))]
    pub async fn install_from(
        &self,
        source: &Path,
        selected: &[ItemId],
    ) -> StorageResult<Vec<PathBuf>> {
        let files = find_manifests(source).await?;
        if files.is_empty() {
            return Ok(Vec::new());
        }
        atomic::ensure_dir(&self.cache_dir).await?;

        let mut installed = Vec::new();
        for file in files {
            let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !selected.is_empty() && !selected.iter().any(|depot| belongs_to(name, depot)) {
                tracing::debug!(file = name, "skipping unselected depot manifest");
                continue;
            }
            let data = fs::read(&file).await?;
            let dest = self.cache_dir.join(name);
            atomic::write(&dest, &data).await?;
            installed.push(dest);
        }

        tracing::info!(installed = installed.len(), "depot manifests installed");
        Ok(installed)
    }

    /// Remove every depot manifest belonging to any of `depots`.
    #[instrument(skip(self, depots), fields(store = "depotcache", requested = depots.len()))]
    pub async fn remove_residuals(&self, depots: &[ItemId]) -> StorageResult<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for dir in std::iter::once(&self.cache_dir).chain(self.residual_dirs.iter()) {
            let mut entries = match fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::Io(e)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                if depots.iter().any(|depot| belongs_to(name, depot))
                    && atomic::remove_optional(&entry.path()).await?
                {
                    removed.push(entry.path());
                }
            }
        }
        if !removed.is_empty() {
            tracing::info!(removed = removed.len(), "residual depot manifests removed");
        }
        Ok(removed)
    }
}

/// Every `*.manifest` file under `root`, recursively.
async fn find_manifests(root: &Path) -> StorageResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(StorageError::Io(e)),
        };
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let path = entry.path();
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(MANIFEST_EXT))
            {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ItemId {
        ItemId::new(s).unwrap()
    }

    #[test]
    fn test_belongs_to_exact_prefix() {
        assert!(belongs_to("200_123456.manifest", &id("200")));
        assert!(!belongs_to("2001_123456.manifest", &id("200")));
        assert!(!belongs_to("20_123456.manifest", &id("200")));
        assert!(!belongs_to("200_123456.acf", &id("200")));
        assert!(!belongs_to("200_.manifest", &id("200")));
        assert!(!belongs_to("x200_1.manifest", &id("200")));
    }

    #[tokio::test]
    async fn test_install_selected_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("pkg/nested");
        fs::create_dir_all(&source).await.unwrap();
        for name in ["200_1.manifest", "201_2.manifest", "300_3.manifest", "notes.txt"] {
            fs::write(source.join(name), name).await.unwrap();
        }

        let steamapps = dir.path().join("steamapps");
        fs::create_dir_all(&steamapps).await.unwrap();
        fs::write(steamapps.join("201_9.manifest"), "old").await.unwrap();
        fs::write(steamapps.join("2010_9.manifest"), "other").await.unwrap();

        let cache = DepotCache::new(dir.path().join("depotcache"), vec![steamapps.clone()]);
        let installed = cache
            .install_from(&dir.path().join("pkg"), &[id("200"), id("201")])
            .await
            .unwrap();
        assert_eq!(installed.len(), 2);
        assert!(cache.cache_dir().join("200_1.manifest").exists());
        assert!(!cache.cache_dir().join("300_3.manifest").exists());

        let removed = cache.remove_residuals(&[id("200"), id("201")]).await.unwrap();
        assert_eq!(removed.len(), 3);
        assert!(steamapps.join("2010_9.manifest").exists());
        assert!(!steamapps.join("201_9.manifest").exists());
    }

    #[tokio::test]
    async fn test_install_without_selection_copies_all() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("5_1.manifest"), "x").await.unwrap();
        let cache = DepotCache::new(dir.path().join("cache"), Vec::new());
        let installed = cache.install_from(dir.path(), &[]).await.unwrap();
        assert_eq!(installed.len(), 1);
    }
}
