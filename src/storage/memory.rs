//! In-memory storage backend.
//!
//! Records live in a process-local map and are lost on exit. Suitable for
//! tests, dry runs and single-shot tools.

use super::{not_found, StorageBackend};
use crate::{PassRecord, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory record store.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: RwLock<HashMap<String, BTreeMap<String, PassRecord>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn store(&self, provider: &str, pass_id: &str, record: &PassRecord) -> Result<()> {
        let mut records = self.records.write().await;
        debug!(provider = %provider, pass_id = %pass_id, revision = record.revision, "Storing pass record");
        records
            .entry(provider.to_string())
            .or_default()
            .insert(pass_id.to_string(), record.clone());
        Ok(())
    }

    async fn retrieve(&self, provider: &str, pass_id: &str) -> Result<PassRecord> {
        let records = self.records.read().await;
        records
            .get(provider)
            .and_then(|passes| passes.get(pass_id))
            .cloned()
            .ok_or_else(|| not_found(provider, pass_id))
    }

    async fn delete(&self, provider: &str, pass_id: &str) -> Result<bool> {
        let mut records = self.records.write().await;
        let removed = records
            .get_mut(provider)
            .map(|passes| passes.remove(pass_id).is_some())
            .unwrap_or(false);
        if removed {
            debug!(provider = %provider, pass_id = %pass_id, "Deleted pass record");
        }
        Ok(removed)
    }

    async fn list(&self, provider: &str) -> Result<Vec<String>> {
        let records = self.records.read().await;
        Ok(records
            .get(provider)
            .map(|passes| passes.keys().cloned().collect())
            .unwrap_or_default())
    }
}
