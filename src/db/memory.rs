use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::error::DbError;
use super::store::EntityStore;
use crate::types::entities::{EntityKind, Record};

/// In-process [`EntityStore`]. Backs `--dry-run` and the test suite.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<(EntityKind, String), Record>>,
    checkpoints: Mutex<HashMap<u64, u64>>,
    gets: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record directly, bypassing `commit`.
    pub fn insert(&self, record: Record) {
        let key = (record.kind(), record.id().to_string());
        self.lock_records().insert(key, record);
    }

    /// Number of `get` calls served so far.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.lock_records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_records().is_empty()
    }

    fn lock_records(&self) -> std::sync::MutexGuard<'_, HashMap<(EntityKind, String), Record>> {
        // A poisoned map still holds whole records; keep serving it.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_checkpoints(&self) -> std::sync::MutexGuard<'_, HashMap<u64, u64>> {
        self.checkpoints.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Record>, DbError> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        Ok(self.lock_records().get(&(kind, id.to_string())).cloned())
    }

    async fn upsert_many(&self, kind: EntityKind, records: Vec<Record>) -> Result<(), DbError> {
        let mut map = self.lock_records();
        for record in records {
            debug_assert_eq!(record.kind(), kind);
            map.insert((kind, record.id().to_string()), record);
        }
        Ok(())
    }

    async fn save_checkpoint(&self, chain_id: u64, block: u64) -> Result<(), DbError> {
        self.lock_checkpoints().insert(chain_id, block);
        Ok(())
    }

    async fn load_checkpoint(&self, chain_id: u64) -> Result<Option<u64>, DbError> {
        Ok(self.lock_checkpoints().get(&chain_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformations::EntityChanges;
    use crate::types::entities::{Authority, Chain, Entity};
    use alloy_primitives::Address;

    fn authority(id: &str, byte: u8) -> Record {
        Authority {
            id: id.to_string(),
            address: Address::repeat_byte(byte),
        }
        .into_record()
    }

    #[tokio::test]
    async fn test_get_counts_hits_and_misses() {
        let store = MemoryStore::new();
        store.insert(authority("a", 1));

        assert!(store.get(EntityKind::Authority, "a").await.unwrap().is_some());
        assert!(store.get(EntityKind::Authority, "b").await.unwrap().is_none());
        // Same id under another kind is a different key.
        assert!(store.get(EntityKind::Chain, "a").await.unwrap().is_none());
        assert_eq!(store.get_count(), 3);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = MemoryStore::new();
        store
            .upsert_many(EntityKind::Authority, vec![authority("a", 1)])
            .await
            .unwrap();
        store
            .upsert_many(EntityKind::Authority, vec![authority("a", 2)])
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        let stored = store.get(EntityKind::Authority, "a").await.unwrap();
        assert_eq!(stored, Some(authority("a", 2)));
    }

    #[tokio::test]
    async fn test_commit_writes_changes_and_checkpoint_per_chain() {
        let store = MemoryStore::new();
        let changes: EntityChanges = vec![
            authority("a", 1),
            Chain {
                id: "10".to_string(),
            }
            .into_record(),
        ]
        .into_iter()
        .collect();

        store.commit(10, changes, 500).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.load_checkpoint(10).await.unwrap(), Some(500));
        assert_eq!(store.load_checkpoint(1).await.unwrap(), None);
    }
}
