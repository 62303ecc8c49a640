//! Atomic file replacement.

use crate::error::{StorageError, StorageResult};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Write `data` to `path` through a uniquely named temp file, fsync, then
/// rename over the target. Readers see either the old or the new content.
pub async fn write(path: &Path, data: &[u8]) -> StorageResult<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| StorageError::InvalidPath(path.display().to_string()))?;
    let temp_path = path.with_file_name(format!(
        "{}.tmp.{}",
        file_name.to_string_lossy(),
        Uuid::new_v4()
    ));

    let result = async {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp_path, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path).await;
        return Err(StorageError::Io(e));
    }
    Ok(())
}

/// Ensure `dir` exists and is a directory.
pub async fn ensure_dir(dir: &Path) -> StorageResult<()> {
    match fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(StorageError::NotADirectory(dir.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).await?;
            Ok(())
        }
        Err(e) => Err(StorageError::Io(e)),
    }
}

/// Read a file to a string, mapping "not found" to `None`.
pub async fn read_optional(path: &Path) -> StorageResult<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::Io(e)),
    }
}

/// Remove a file, returning whether it existed.
pub async fn remove_optional(path: &Path) -> StorageResult<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::Io(e)),
    }
}
