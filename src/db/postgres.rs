use std::sync::Arc;

use async_trait::async_trait;

use super::entities::{checkpoint_upsert, from_row, select_sql, to_upsert, PROGRESS_TABLE};
use super::error::DbError;
use super::pool::DbPool;
use super::store::EntityStore;
use crate::transformations::EntityChanges;
use crate::types::entities::{EntityKind, Record};

/// [`EntityStore`] over PostgreSQL. A batch commit is a single transaction:
/// every changed row and the checkpoint land together or not at all.
pub struct PgEntityStore {
    pool: Arc<DbPool>,
}

impl PgEntityStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Record>, DbError> {
        let rows = self.pool.query(&select_sql(kind), &[&id]).await?;
        rows.first().map(|row| from_row(kind, row)).transpose()
    }

    async fn upsert_many(&self, _kind: EntityKind, records: Vec<Record>) -> Result<(), DbError> {
        let ops = records.iter().map(to_upsert).collect::<Result<Vec<_>, _>>()?;
        self.pool.execute_transaction(ops, None).await
    }

    async fn save_checkpoint(&self, chain_id: u64, block: u64) -> Result<(), DbError> {
        self.pool
            .execute_transaction(Vec::new(), Some(checkpoint_upsert(chain_id, block)?))
            .await
    }

    async fn load_checkpoint(&self, chain_id: u64) -> Result<Option<u64>, DbError> {
        let chain_id = i64::try_from(chain_id).map_err(|_| DbError::OutOfRange(chain_id))?;
        let sql = format!("SELECT last_block FROM {} WHERE chain_id = $1", PROGRESS_TABLE);
        let rows = self.pool.query(&sql, &[&chain_id]).await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let block: i64 = row.try_get(0)?;
        u64::try_from(block)
            .map(Some)
            .map_err(|e| DbError::row(PROGRESS_TABLE, "last_block", &chain_id.to_string(), e))
    }

    async fn commit(
        &self,
        chain_id: u64,
        changes: EntityChanges,
        checkpoint: u64,
    ) -> Result<(), DbError> {
        let total = changes.total();
        let ops = changes
            .into_inner()
            .into_iter()
            .flat_map(|(_, records)| records)
            .map(|record| to_upsert(&record))
            .collect::<Result<Vec<_>, _>>()?;

        self.pool
            .execute_transaction(ops, Some(checkpoint_upsert(chain_id, checkpoint)?))
            .await?;

        tracing::debug!(
            "Committed {} entities for chain {} through block {}",
            total,
            chain_id,
            checkpoint
        );
        Ok(())
    }
}
