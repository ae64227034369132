//! Pluggable persistence for [`PassRecord`]s.
//!
//! Records are keyed by `(provider, pass id)`. Two backends ship with the
//! crate: [`MemoryStorage`] and [`FilesystemStorage`]. Custom backends
//! implement [`StorageBackend`].

mod filesystem;
mod memory;

pub use filesystem::FilesystemStorage;
pub use memory::MemoryStorage;

use crate::config::StorageConfig;
use crate::{PassRecord, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Persistence capability set.
///
/// Implementations must be safe for concurrent use on distinct keys and
/// must not interleave partial writes to the same key. `store` is
/// last-write-wins; read-modify-write ordering is the caller's job (the
/// [`PassManager`](crate::PassManager) serializes it per key).
#[async_trait]
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Backend name for logging (e.g., "memory", "filesystem").
    fn name(&self) -> &str;

    /// Stores a record, overwriting any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Storage`](crate::WalletError::Storage) on I/O
    /// failure.
    async fn store(&self, provider: &str, pass_id: &str, record: &PassRecord) -> Result<()>;

    /// Retrieves a record.
    ///
    /// # Errors
    ///
    /// - [`WalletError::NotFound`](crate::WalletError::NotFound): no record
    ///   for the key
    /// - [`WalletError::Storage`](crate::WalletError::Storage): I/O failure or
    ///   unreadable record
    async fn retrieve(&self, provider: &str, pass_id: &str) -> Result<PassRecord>;

    /// Deletes a record. Returns whether one existed.
    async fn delete(&self, provider: &str, pass_id: &str) -> Result<bool>;

    /// Snapshot of the provider's pass ids, sorted.
    async fn list(&self, provider: &str) -> Result<Vec<String>>;
}

/// Creates the storage backend selected by configuration.
///
/// # Example
///
/// ```
/// use walletmux::config::StorageConfig;
/// use walletmux::storage::new_storage;
///
/// let storage = new_storage(&StorageConfig::Memory);
/// assert_eq!(storage.name(), "memory");
/// ```
pub fn new_storage(config: &StorageConfig) -> Arc<dyn StorageBackend> {
    match config {
        StorageConfig::Memory => Arc::new(MemoryStorage::new()),
        StorageConfig::Filesystem { path } => Arc::new(FilesystemStorage::new(path)),
    }
}

fn not_found(provider: &str, pass_id: &str) -> crate::WalletError {
    crate::WalletError::NotFound(format!("no {} record for pass {}", provider, pass_id))
}
