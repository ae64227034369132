//! Filesystem storage backend.
//!
//! Layout: `<root>/<provider>/passes/<pass id>.json`, one pretty-printed
//! JSON document per record. Writes go to a temporary sibling that is
//! renamed into place, so readers never observe a partial record.

use super::{not_found, StorageBackend};
use crate::locks::KeyLocks;
use crate::validation::{validate_identifier, validate_pass_id};
use crate::{PassRecord, Result, WalletError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// JSON-file-per-record store.
#[derive(Debug)]
pub struct FilesystemStorage {
    root: PathBuf,
    key_locks: KeyLocks,
}

impl FilesystemStorage {
    /// Creates a store rooted at `root`. Directories are created lazily.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            key_locks: KeyLocks::new(),
        }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn provider_dir(&self, provider: &str) -> Result<PathBuf> {
        validate_identifier("provider name", provider)?;
        Ok(self.root.join(provider).join("passes"))
    }

    fn record_path(&self, provider: &str, pass_id: &str) -> Result<PathBuf> {
        validate_pass_id(pass_id)?;
        Ok(self.provider_dir(provider)?.join(format!("{}.json", pass_id)))
    }
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> WalletError {
    WalletError::Storage(format!("{} {}: {}", action, path.display(), err))
}

#[async_trait]
impl StorageBackend for FilesystemStorage {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn store(&self, provider: &str, pass_id: &str, record: &PassRecord) -> Result<()> {
        let path = self.record_path(provider, pass_id)?;
        let dir = self.provider_dir(provider)?;
        let json = serde_json::to_vec_pretty(record)?;

        let _guard = self.key_locks.lock(provider, pass_id).await;

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error("cannot create", &dir, e))?;

        let tmp = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        fs::write(&tmp, &json)
            .await
            .map_err(|e| io_error("cannot write", &tmp, e))?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(io_error("cannot replace", &path, e));
        }

        debug!(provider = %provider, pass_id = %pass_id, path = %path.display(), "Stored pass record");
        Ok(())
    }

    async fn retrieve(&self, provider: &str, pass_id: &str) -> Result<PassRecord> {
        let path = self.record_path(provider, pass_id)?;
        let data = match fs::read(&path).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(not_found(provider, pass_id))
            }
            Err(e) => return Err(io_error("cannot read", &path, e)),
        };

        serde_json::from_slice(&data).map_err(|e| {
            WalletError::Storage(format!("corrupt record {}: {}", path.display(), e))
        })
    }

    async fn delete(&self, provider: &str, pass_id: &str) -> Result<bool> {
        let path = self.record_path(provider, pass_id)?;
        let _guard = self.key_locks.lock(provider, pass_id).await;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(provider = %provider, pass_id = %pass_id, "Deleted pass record");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error("cannot delete", &path, e)),
        }
    }

    async fn list(&self, provider: &str) -> Result<Vec<String>> {
        let dir = self.provider_dir(provider)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("cannot list", &dir, e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("cannot list", &dir, e))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            match name.strip_suffix(".json") {
                Some(id) => ids.push(id.to_string()),
                None => warn!(path = %entry.path().display(), "Ignoring unexpected file in pass store"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::contract;
    use crate::validation::MAX_PASS_ID_LENGTH;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_round_trip() {
        let dir = tempdir().unwrap();
        contract::round_trip(&FilesystemStorage::new(dir.path())).await;
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let dir = tempdir().unwrap();
        contract::last_write_wins(&FilesystemStorage::new(dir.path())).await;
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let dir = tempdir().unwrap();
        contract::delete_and_list(&FilesystemStorage::new(dir.path())).await;
    }

    #[tokio::test]
    async fn test_layout_on_disk() {
        let dir = tempdir().unwrap();
        let storage = FilesystemStorage::new(dir.path());
        let record = contract::record("apple", "S1");
        storage.store("apple", &record.pass_id, &record).await.unwrap();

        let path = dir
            .path()
            .join("apple")
            .join("passes")
            .join("pass.com.example.S1.json");
        assert!(path.exists());

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_traversal_keys() {
        let dir = tempdir().unwrap();
        let storage = FilesystemStorage::new(dir.path());
        let record = contract::record("apple", "S1");

        let result = storage.store("apple", "../escape", &record).await;
        assert!(matches!(result, Err(WalletError::Validation(_))));
        assert!(storage.retrieve("../apple", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_storage_error() {
        let dir = tempdir().unwrap();
        let passes = dir.path().join("apple").join("passes");
        std::fs::create_dir_all(&passes).unwrap();
        std::fs::write(passes.join("broken.json"), b"{not json").unwrap();

        let storage = FilesystemStorage::new(dir.path());
        let result = storage.retrieve("apple", "broken").await;
        assert!(matches!(result, Err(WalletError::Storage(_))));
    }

    #[tokio::test]
    async fn test_concurrent_writes_to_distinct_keys() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(FilesystemStorage::new(dir.path()));

        let mut handles = Vec::new();
        for i in 0..16 {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move {
                let record = contract::record("google", &format!("S{}", i));
                storage.store("google", &record.pass_id, &record).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(storage.list("google").await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_longest_pass_id_fits_on_disk() {
        let dir = tempdir().unwrap();
        let storage = FilesystemStorage::new(dir.path());
        let pass_id = "P".repeat(MAX_PASS_ID_LENGTH);
        let mut record = contract::record("apple", "S1");
        record.pass_id = pass_id.clone();

        storage.store("apple", &pass_id, &record).await.unwrap();
        assert_eq!(storage.retrieve("apple", &pass_id).await.unwrap(), record);
        assert_eq!(storage.list("apple").await.unwrap(), vec![pass_id]);

        let too_long = "P".repeat(MAX_PASS_ID_LENGTH + 1);
        let result = storage.store("apple", &too_long, &record).await;
        assert!(matches!(result, Err(WalletError::Validation(_))));
    }

    #[tokio::test]
    async fn test_key_locks_are_released() {
        let dir = tempdir().unwrap();
        let storage = FilesystemStorage::new(dir.path());
        for i in 0..8 {
            let record = contract::record("google", &format!("S{}", i));
            storage.store("google", &record.pass_id, &record).await.unwrap();
            storage.delete("google", &record.pass_id).await.unwrap();
        }
        assert_eq!(storage.key_locks.len(), 0);
    }
}
