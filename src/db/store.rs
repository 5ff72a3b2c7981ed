//! Durable store boundary.

use async_trait::async_trait;

use super::error::DbError;
use crate::transformations::EntityChanges;
use crate::types::entities::{EntityKind, Record};

/// Where entities live between batches.
///
/// Reads happen on cache misses only; writes happen once per batch through
/// [`EntityStore::commit`].
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Record>, DbError>;

    /// Replaces by id. Calling it twice with the same records is a no-op.
    async fn upsert_many(&self, kind: EntityKind, records: Vec<Record>) -> Result<(), DbError>;

    /// Records that `chain_id` is indexed through `block`.
    async fn save_checkpoint(&self, chain_id: u64, block: u64) -> Result<(), DbError>;

    /// Last block committed for `chain_id`.
    async fn load_checkpoint(&self, chain_id: u64) -> Result<Option<u64>, DbError>;

    /// Persists a batch's changes, referenced kinds first, then moves the
    /// checkpoint. Implementations backed by a transactional store override
    /// this so the batch lands atomically.
    async fn commit(
        &self,
        chain_id: u64,
        changes: EntityChanges,
        checkpoint: u64,
    ) -> Result<(), DbError> {
        for (kind, records) in changes.into_inner() {
            self.upsert_many(kind, records).await?;
        }
        self.save_checkpoint(chain_id, checkpoint).await
    }
}
