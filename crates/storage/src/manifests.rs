//! Manifest record store (`appmanifest_<id>.acf`).

use crate::atomic;
use crate::error::{StorageError, StorageResult};
use depotkeep_core::config::{ClientConfig, library_manifest_dir};
use depotkeep_core::{AppManifest, ItemId, manifest};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::instrument;

/// Reads and writes manifest records across the default library and any
/// extra libraries.
#[derive(Clone, Debug)]
pub struct ManifestStore {
    default_dir: PathBuf,
    libraries: Vec<PathBuf>,
}

impl ManifestStore {
    pub fn new(default_dir: impl Into<PathBuf>, libraries: Vec<PathBuf>) -> Self {
        Self {
            default_dir: default_dir.into(),
            libraries,
        }
    }

    pub fn from_client(client: &ClientConfig) -> Self {
        let mut dirs = client.manifest_dirs();
        let default_dir = dirs.remove(0);
        Self::new(default_dir, dirs)
    }

    /// Every searched directory, default first.
    pub fn dirs(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.default_dir.as_path())
            .chain(self.libraries.iter().map(PathBuf::as_path))
    }

    /// Record directory of `library`, given as a library root or its
    /// `steamapps` directory. Only searched directories are accepted, so
    /// every record written can be found again.
    pub fn library_dir(&self, library: &Path) -> StorageResult<PathBuf> {
        let dir = library_manifest_dir(library);
        if self.dirs().any(|known| known == dir.as_path()) {
            Ok(dir)
        } else {
            Err(StorageError::UnknownLibrary(library.to_path_buf()))
        }
    }

    /// Write `record` into `library`, or the default directory.
    ///
    /// Fails with `UnknownLibrary` for a library outside the configured
    /// set and `NotADirectory` when the target exists as a file.
    #[instrument(skip(self, record), fields(store = "manifests", appid = %record.appid))]
    pub async fn write(
        &self,
        record: &AppManifest,
        library: Option<&Path>,
    ) -> StorageResult<PathBuf> {
        let dir = match library {
            Some(library) => self.library_dir(library)?,
            None => self.default_dir.clone(),
        };
        atomic::ensure_dir(&dir).await?;

        let path = dir.join(manifest::file_name(&record.appid));
        atomic::write(&path, record.to_acf_text().as_bytes()).await?;
        tracing::info!(path = %path.display(), "manifest record written");
        Ok(path)
    }

    /// Delete the record for `id` from every directory. Returns whether any
    /// record existed.
    #[instrument(skip(self), fields(store = "manifests"))]
    pub async fn remove(&self, id: &ItemId) -> StorageResult<bool> {
        let name = manifest::file_name(id);
        let mut removed = false;
        for dir in self.dirs() {
            let path = dir.join(&name);
            if atomic::remove_optional(&path).await? {
                tracing::info!(path = %path.display(), "manifest record removed");
                removed = true;
            }
        }
        Ok(removed)
    }

    /// Raw text of the first record found for `id`.
    #[instrument(skip(self), fields(store = "manifests"))]
    pub async fn read_text(&self, id: &ItemId) -> StorageResult<Option<String>> {
        let name = manifest::file_name(id);
        for dir in self.dirs() {
            if let Some(text) = atomic::read_optional(&dir.join(&name)).await? {
                return Ok(Some(text));
            }
        }
        Ok(None)
    }

    /// Parsed record for `id`.
    pub async fn read(&self, id: &ItemId) -> StorageResult<Option<AppManifest>> {
        match self.read_text(id).await? {
            Some(text) => Ok(Some(AppManifest::parse(&text)?)),
            None => Ok(None),
        }
    }

    /// Every parseable record in every directory. The first record wins when
    /// an id appears in several libraries.
    #[instrument(skip(self), fields(store = "manifests"))]
    pub async fn list(&self) -> StorageResult<Vec<AppManifest>> {
        let mut records: Vec<AppManifest> = Vec::new();
        for dir in self.dirs() {
            let mut entries = match fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) if e.kind() == std::io::ErrorKind::NotADirectory => {
                    return Err(StorageError::NotADirectory(dir.to_path_buf()));
                }
                Err(e) => return Err(StorageError::Io(e)),
            };

            while let Some(entry) = entries.next_entry().await? {
                let file_name = entry.file_name();
                let Some(id) = file_name.to_str().and_then(manifest::id_from_file_name) else {
                    continue;
                };
                if records.iter().any(|r| r.appid == id) {
                    continue;
                }
                let text = match fs::read_to_string(entry.path()).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(
                            path = %entry.path().display(),
                            error = %e,
                            "skipping unreadable manifest"
                        );
                        continue;
                    }
                };
                match AppManifest::parse(&text) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        tracing::warn!(
                            path = %entry.path().display(),
                            error = %e,
                            "skipping malformed manifest"
                        );
                    }
                }
            }
        }
        records.sort_by_key(|r| r.appid.value());
        Ok(records)
    }
}
