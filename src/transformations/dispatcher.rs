//! Event dispatcher.
//!
//! Walks a batch block by block and log by log, classifies each log into an
//! [`EventKind`] and hands it to the registered handler. Logs are applied
//! strictly in order; the next log is not touched until the previous handler
//! has finished.

use std::fmt;
use std::sync::Arc;

use super::context::BatchContext;
use super::error::TransformationError;
use super::registry::TransformationRegistry;
use crate::decoding::events::EventKind;
use crate::types::log::{BlockInfo, LogBatch, RawLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    /// Not an event this indexer tracks.
    Ignored,
    /// Recognised but undecodable; dropped with a warning.
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub handled: usize,
    pub ignored: usize,
    pub skipped: usize,
}

impl DispatchStats {
    fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Handled => self.handled += 1,
            DispatchOutcome::Ignored => self.ignored += 1,
            DispatchOutcome::Skipped => self.skipped += 1,
        }
    }
}

impl fmt::Display for DispatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} handled, {} ignored, {} skipped",
            self.handled, self.ignored, self.skipped
        )
    }
}

pub struct Dispatcher {
    registry: Arc<TransformationRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<TransformationRegistry>) -> Self {
        Self { registry }
    }

    pub async fn dispatch_log(
        &self,
        log: &RawLog,
        block: &BlockInfo,
        ctx: &mut BatchContext,
    ) -> Result<DispatchOutcome, TransformationError> {
        let Some(kind) = EventKind::classify(log, ctx.contracts()) else {
            return Ok(DispatchOutcome::Ignored);
        };
        let Some(handler) = self.registry.handler_for(kind) else {
            return Ok(DispatchOutcome::Ignored);
        };

        match handler.handle(log, block, ctx).await {
            Ok(()) => Ok(DispatchOutcome::Handled),
            Err(e) if !e.is_fatal() => {
                tracing::warn!(
                    "Skipping {:?} log {} in block {} ({}): {}",
                    kind,
                    log.log_index,
                    block.height,
                    handler.name(),
                    e
                );
                Ok(DispatchOutcome::Skipped)
            }
            Err(e) => {
                tracing::error!(
                    "Handler {} failed on log {} in block {}: {}",
                    handler.name(),
                    log.log_index,
                    block.height,
                    e
                );
                Err(e)
            }
        }
    }

    /// Apply every log of the batch in block then log order.
    pub async fn dispatch_batch(
        &self,
        batch: &LogBatch,
        ctx: &mut BatchContext,
    ) -> Result<DispatchStats, TransformationError> {
        let mut stats = DispatchStats::default();
        for block_logs in &batch.blocks {
            for log in &block_logs.logs {
                let outcome = self.dispatch_log(log, &block_logs.block, ctx).await?;
                stats.record(outcome);
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, B256, U256};

    use super::*;
    use crate::decoding::events::{v1, v2, OwnershipTransferred};
    use crate::transformations::event::fixtures::*;
    use crate::transformations::registry::build_registry;
    use crate::types::entities::{Application, EntityKind};
    use crate::types::log::BlockLogs;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(build_registry()))
    }

    fn v1_input(dapp: Address, index: u64, sender: Address, input: Vec<u8>) -> RawLog {
        let event = v1::InputAdded {
            dapp,
            inputIndex: U256::from(index),
            sender,
            input: input.into(),
        };
        log(v1_input_box(), &event, None)
    }

    fn batch(blocks: Vec<(BlockInfo, Vec<RawLog>)>) -> LogBatch {
        LogBatch {
            from_block: blocks.first().map(|(b, _)| b.height).unwrap_or(0),
            to_block: blocks.last().map(|(b, _)| b.height).unwrap_or(0),
            blocks: blocks
                .into_iter()
                .map(|(block, logs)| BlockLogs { block, logs })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_malformed_log_skipped_batch_continues() {
        let mut h = Harness::new();
        let dapp = Address::repeat_byte(0xab);
        let logs = vec![
            v1_input(dapp, 0, Address::repeat_byte(5), vec![]),
            // Portal sender with a truncated deposit payload.
            v1_input(dapp, 1, v1_erc20_portal(), vec![1, 2, 3]),
            v1_input(dapp, 2, Address::repeat_byte(5), vec![]),
        ];

        let stats = dispatcher()
            .dispatch_batch(&batch(vec![(block(1, 100), logs)]), &mut h.ctx)
            .await
            .unwrap();
        assert_eq!(
            stats,
            DispatchStats {
                handled: 2,
                ignored: 0,
                skipped: 1,
            }
        );

        let changes = h.ctx.into_changes();
        let apps: Vec<Application> = changes.entities();
        assert_eq!(apps[0].input_count, 2);
        assert_eq!(changes.records(EntityKind::Input).len(), 2);
    }

    #[tokio::test]
    async fn test_missing_chain_id_aborts_batch() {
        let mut h = Harness::new();
        let event = v2::ApplicationCreated {
            consensus: Address::ZERO,
            appOwner: Address::repeat_byte(1),
            templateHash: B256::ZERO,
            appContract: Address::repeat_byte(2),
        };
        let logs = vec![log(v2_factory(), &event, None)];

        let err = dispatcher()
            .dispatch_batch(&batch(vec![(block(1, 100), logs)]), &mut h.ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, TransformationError::MissingChainId { .. }));
    }

    #[tokio::test]
    async fn test_unrelated_logs_ignored() {
        let mut h = Harness::new();
        let mut unknown = log(
            Address::repeat_byte(0x99),
            &OwnershipTransferred {
                previousOwner: Address::ZERO,
                newOwner: Address::ZERO,
            },
            None,
        );
        unknown.topics[0] = B256::repeat_byte(0x42);

        // InputAdded from an address that is not the input box.
        let mut foreign = v1_input(Address::repeat_byte(0xab), 0, Address::ZERO, vec![]);
        foreign.address = Address::repeat_byte(0x98);

        let stats = dispatcher()
            .dispatch_batch(&batch(vec![(block(1, 100), vec![unknown, foreign])]), &mut h.ctx)
            .await
            .unwrap();
        assert_eq!(stats.ignored, 2);
        assert!(h.ctx.into_changes().is_empty());
    }

    #[tokio::test]
    async fn test_order_preserved_across_blocks() {
        let mut h = Harness::new();
        let dapp = Address::repeat_byte(0xab);
        let blocks = vec![
            (block(1, 100), vec![v1_input(dapp, 0, Address::ZERO, vec![])]),
            (block(2, 200), vec![v1_input(dapp, 1, Address::ZERO, vec![])]),
            (block(3, 300), vec![v1_input(dapp, 2, Address::ZERO, vec![])]),
        ];

        dispatcher()
            .dispatch_batch(&batch(blocks), &mut h.ctx)
            .await
            .unwrap();

        let apps: Vec<Application> = h.ctx.into_changes().entities();
        assert_eq!(apps[0].input_count, 3);
        assert_eq!(apps[0].activity_timestamp, Some(300));
        assert_eq!(apps[0].timestamp, 100);
    }

    #[test]
    fn test_stats_display() {
        let stats = DispatchStats {
            handled: 3,
            ignored: 1,
            skipped: 0,
        };
        assert_eq!(stats.to_string(), "3 handled, 1 ignored, 0 skipped");
    }
}
