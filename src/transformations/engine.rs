//! Batch driver.
//!
//! Pulls batches from a [`LogSource`], dispatches every log through a fresh
//! [`BatchContext`] and commits the written entities together with the
//! batch's last block as the chain checkpoint. A batch is persisted whole or
//! not at all.
//!
//! Engines for different chains share one store, and some ids (v1
//! applications, authorities, legacy tokens) are not chain-scoped. Engines
//! that share a store must share one write lock too, held from the first
//! cache read of a batch through its commit, so batches apply one at a time.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use super::context::{BatchContext, BatchSummary, EntityChanges};
use super::dispatcher::{DispatchStats, Dispatcher};
use super::error::TransformationError;
use super::registry::TransformationRegistry;
use super::util::metadata::TokenMetadataSource;
use crate::db::EntityStore;
use crate::raw_data::LogSource;
use crate::types::config::contract::Contracts;
use crate::types::log::LogBatch;

/// Result of dispatching one batch, before it is committed.
#[derive(Debug)]
pub struct BatchOutcome {
    pub changes: EntityChanges,
    pub summary: BatchSummary,
    pub stats: DispatchStats,
}

pub struct IndexingEngine {
    chain_name: String,
    chain_id: u64,
    dispatcher: Dispatcher,
    store: Arc<dyn EntityStore>,
    metadata: Arc<dyn TokenMetadataSource>,
    contracts: Arc<Contracts>,
    write_lock: Arc<Mutex<()>>,
}

impl IndexingEngine {
    pub fn new(
        chain_name: String,
        chain_id: u64,
        registry: Arc<TransformationRegistry>,
        store: Arc<dyn EntityStore>,
        metadata: Arc<dyn TokenMetadataSource>,
        contracts: Arc<Contracts>,
    ) -> Self {
        Self {
            chain_name,
            chain_id,
            dispatcher: Dispatcher::new(registry),
            store,
            metadata,
            contracts,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_write_lock(mut self, write_lock: Arc<Mutex<()>>) -> Self {
        self.write_lock = write_lock;
        self
    }

    /// First block to index: one past the last committed batch, or
    /// `configured_start` on a fresh database.
    pub async fn resume_block(&self, configured_start: u64) -> Result<u64, TransformationError> {
        match self.store.load_checkpoint(self.chain_id).await? {
            Some(last) => {
                tracing::info!(
                    "Chain {} resuming after checkpoint at block {}",
                    self.chain_name,
                    last
                );
                Ok((last + 1).max(configured_start))
            }
            None => Ok(configured_start),
        }
    }

    /// Dispatch one batch into a fresh context. Nothing is persisted.
    pub async fn process_batch(&self, batch: &LogBatch) -> Result<BatchOutcome, TransformationError> {
        let mut ctx = BatchContext::new(
            self.store.clone(),
            self.metadata.clone(),
            self.contracts.clone(),
        );

        let stats = self.dispatcher.dispatch_batch(batch, &mut ctx).await?;
        let summary = ctx.summary();
        let changes = ctx.into_changes();

        Ok(BatchOutcome {
            changes,
            summary,
            stats,
        })
    }

    /// Dispatch and commit one batch under the write lock.
    pub async fn index_batch(
        &self,
        batch: &LogBatch,
    ) -> Result<(BatchSummary, DispatchStats), TransformationError> {
        let _guard = self.write_lock.lock().await;
        let outcome = self.process_batch(batch).await?;
        self.store
            .commit(self.chain_id, outcome.changes, batch.to_block)
            .await?;
        Ok((outcome.summary, outcome.stats))
    }

    /// Process batches until the source is exhausted, a fatal error occurs or
    /// `shutdown` flips to `true`. Returns the last committed block.
    pub async fn run(
        &self,
        source: &mut dyn LogSource,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<Option<u64>, TransformationError> {
        tracing::info!("Indexing engine started for chain {}", self.chain_name);

        let mut last_committed = None;
        loop {
            let next = tokio::select! {
                biased;

                _ = shutdown_requested(&mut shutdown) => {
                    tracing::info!("Shutdown requested, stopping chain {}", self.chain_name);
                    break;
                }
                next = source.next_batch() => next?,
            };

            let Some(batch) = next else {
                tracing::info!("Chain {} reached its end block", self.chain_name);
                break;
            };

            let (summary, stats) = self.index_batch(&batch).await?;
            last_committed = Some(batch.to_block);

            tracing::info!(
                "Chain {} blocks {}-{}: {} logs ({}), {}",
                self.chain_name,
                batch.from_block,
                batch.to_block,
                batch.log_count(),
                stats,
                summary
            );
        }

        Ok(last_committed)
    }
}

/// Resolves once `true` is sent. A dropped sender never requests shutdown.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use alloy::sol_types::SolEvent;
    use alloy_primitives::{Address, U256};
    use async_trait::async_trait;

    use super::*;
    use crate::db::{DbError, MemoryStore};
    use crate::decoding::events::v1;
    use crate::raw_data::SourceError;
    use crate::transformations::event::fixtures::{block, contracts, log, v1_input_box};
    use crate::transformations::registry::build_registry;
    use crate::transformations::util::metadata::tests::CountingMetadata;
    use crate::types::entities::{Application, Entity, EntityKind, Input, Record};
    use crate::types::log::{BlockLogs, RawLog};

    struct VecSource(VecDeque<LogBatch>);

    #[async_trait]
    impl LogSource for VecSource {
        async fn next_batch(&mut self) -> Result<Option<LogBatch>, SourceError> {
            Ok(self.0.pop_front())
        }
    }

    /// Yields to the scheduler before every store access, so concurrent
    /// engines interleave at each suspension point.
    struct YieldingStore(Arc<MemoryStore>);

    #[async_trait]
    impl EntityStore for YieldingStore {
        async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Record>, DbError> {
            tokio::task::yield_now().await;
            self.0.get(kind, id).await
        }

        async fn upsert_many(&self, kind: EntityKind, records: Vec<Record>) -> Result<(), DbError> {
            tokio::task::yield_now().await;
            self.0.upsert_many(kind, records).await
        }

        async fn save_checkpoint(&self, chain_id: u64, block: u64) -> Result<(), DbError> {
            self.0.save_checkpoint(chain_id, block).await
        }

        async fn load_checkpoint(&self, chain_id: u64) -> Result<Option<u64>, DbError> {
            self.0.load_checkpoint(chain_id).await
        }
    }

    fn chain_engine(chain_id: u64, store: Arc<dyn EntityStore>) -> IndexingEngine {
        IndexingEngine::new(
            format!("chain-{chain_id}"),
            chain_id,
            Arc::new(build_registry()),
            store,
            Arc::new(CountingMetadata::default()),
            Arc::new(contracts()),
        )
    }

    fn engine(store: Arc<MemoryStore>) -> IndexingEngine {
        chain_engine(1, store)
    }

    fn input_log<E: SolEvent>(event: &E) -> RawLog {
        log(v1_input_box(), event, None)
    }

    fn input_batch(height: u64, dapp: Address, index: u64) -> LogBatch {
        let event = v1::InputAdded {
            dapp,
            inputIndex: U256::from(index),
            sender: Address::repeat_byte(5),
            input: vec![index as u8].into(),
        };
        LogBatch {
            from_block: height,
            to_block: height,
            blocks: vec![BlockLogs {
                block: block(height, height * 10),
                logs: vec![input_log(&event)],
            }],
        }
    }

    #[tokio::test]
    async fn test_process_batch_does_not_persist() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        let outcome = engine
            .process_batch(&input_batch(1, Address::repeat_byte(0xab), 0))
            .await
            .unwrap();
        assert_eq!(outcome.stats.handled, 1);
        assert_eq!(outcome.summary.count(EntityKind::Application), 1);
        assert_eq!(outcome.summary.count(EntityKind::Input), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_run_commits_each_batch_and_checkpoints() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());
        let dapp = Address::repeat_byte(0xab);
        let mut source = VecSource(
            vec![input_batch(1, dapp, 0), input_batch(2, dapp, 1)].into(),
        );
        let (_tx, rx) = watch::channel(false);

        let last = engine.run(&mut source, rx).await.unwrap();
        assert_eq!(last, Some(2));
        assert_eq!(store.load_checkpoint(1).await.unwrap(), Some(2));
        assert_eq!(engine.resume_block(0).await.unwrap(), 3);

        // The second batch found the application in the store, not a cache.
        let app_id = crate::transformations::id::legacy_id(dapp);
        let app = store
            .get(EntityKind::Application, &app_id)
            .await
            .unwrap()
            .and_then(Application::from_record)
            .unwrap();
        assert_eq!(app.input_count, 2);
        assert_eq!(app.activity_timestamp, Some(20));

        let input = store
            .get(EntityKind::Input, &format!("{app_id}-1"))
            .await
            .unwrap()
            .and_then(Input::from_record)
            .unwrap();
        assert_eq!(input.payload, vec![1]);
    }

    #[tokio::test]
    async fn test_chains_sharing_a_store_apply_batches_one_at_a_time() {
        let memory = Arc::new(MemoryStore::new());
        let store: Arc<dyn EntityStore> = Arc::new(YieldingStore(memory.clone()));
        let lock = Arc::new(Mutex::new(()));
        let first = chain_engine(1, store.clone()).with_write_lock(lock.clone());
        let second = chain_engine(10, store).with_write_lock(lock);

        // v1 application ids carry no chain, so both chains update one row.
        let dapp = Address::repeat_byte(0xab);
        let batch_a = input_batch(1, dapp, 0);
        let batch_b = input_batch(2, dapp, 1);
        let (a, b) = tokio::join!(
            first.index_batch(&batch_a),
            second.index_batch(&batch_b),
        );
        a.unwrap();
        b.unwrap();

        let app_id = crate::transformations::id::legacy_id(dapp);
        let app = memory
            .get(EntityKind::Application, &app_id)
            .await
            .unwrap()
            .and_then(Application::from_record)
            .unwrap();
        assert_eq!(app.input_count, 2);
        assert_eq!(app.activity_timestamp, Some(20));
        assert_eq!(memory.load_checkpoint(1).await.unwrap(), Some(1));
        assert_eq!(memory.load_checkpoint(10).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_shutdown_before_first_batch() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());
        let mut source = VecSource(vec![input_batch(1, Address::repeat_byte(0xab), 0)].into());
        let (_tx, rx) = watch::channel(true);

        let last = engine.run(&mut source, rx).await.unwrap();
        assert_eq!(last, None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_fatal_error_commits_nothing() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());

        let event = crate::decoding::events::v2::InputAdded {
            appContract: Address::repeat_byte(0xab),
            index: U256::ZERO,
            input: Default::default(),
        };
        let mut batch = input_batch(1, Address::repeat_byte(0xab), 0);
        batch.blocks[0].logs.push(log(
            crate::transformations::event::fixtures::v2_input_box(),
            &event,
            None,
        ));

        let mut source = VecSource(vec![batch].into());
        let (_tx, rx) = watch::channel(false);

        let err = engine.run(&mut source, rx).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(store.is_empty());
        assert_eq!(store.load_checkpoint(1).await.unwrap(), None);
    }
}
