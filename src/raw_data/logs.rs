//! Block-range log source over JSON-RPC.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use alloy::consensus::Transaction as _;
use alloy::primitives::B256;
use alloy::rpc::types::{Filter, Log, Transaction};
use async_trait::async_trait;

use super::{LogSource, SourceError};
use crate::decoding::events::EventKind;
use crate::rpc::RpcClient;
use crate::types::log::{BlockInfo, BlockLogs, LogBatch, RawLog, TransactionInfo};

pub struct RpcLogSource {
    client: Arc<RpcClient>,
    chain_name: String,
    topics: Vec<B256>,
    next_block: u64,
    end_block: Option<u64>,
    batch_size: u64,
    poll_interval: Duration,
}

impl RpcLogSource {
    pub fn new(
        client: Arc<RpcClient>,
        chain_name: String,
        start_block: u64,
        end_block: Option<u64>,
        batch_size: u64,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            chain_name,
            topics: EventKind::all_topics(),
            next_block: start_block,
            end_block,
            batch_size: batch_size.max(1),
            poll_interval,
        }
    }

    /// Wait until the chain head reaches `next_block`.
    async fn wait_for_head(&self) -> Result<u64, SourceError> {
        loop {
            let head = self.client.head().await?;
            if head >= self.next_block {
                return Ok(head);
            }
            tracing::debug!(
                "Chain {} head at {}, waiting for block {}",
                self.chain_name,
                head,
                self.next_block
            );
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn fetch_blocks(
        &self,
        numbers: &[u64],
    ) -> Result<HashMap<u64, BlockInfo>, SourceError> {
        let blocks = self.client.blocks(numbers).await?;

        let mut infos = HashMap::with_capacity(blocks.len());
        for (number, block) in blocks {
            let block = block.ok_or(SourceError::BlockNotFound(number))?;
            infos.insert(
                number,
                BlockInfo {
                    height: block.header.number,
                    hash: block.header.hash,
                    timestamp: block.header.timestamp,
                },
            );
        }
        Ok(infos)
    }

    async fn fetch_transactions(
        &self,
        hashes: &[B256],
    ) -> Result<HashMap<B256, TransactionInfo>, SourceError> {
        let transactions = self.client.transactions(hashes).await?;

        let mut infos = HashMap::with_capacity(transactions.len());
        for (hash, tx) in transactions {
            let tx = tx.ok_or(SourceError::TransactionNotFound(hash))?;
            infos.insert(hash, transaction_info(hash, &tx));
        }
        Ok(infos)
    }
}

#[async_trait]
impl LogSource for RpcLogSource {
    async fn next_batch(&mut self) -> Result<Option<LogBatch>, SourceError> {
        if self.end_block.is_some_and(|end| self.next_block > end) {
            return Ok(None);
        }

        let head = self.wait_for_head().await?;
        let from_block = self.next_block;
        let mut to_block = (from_block + self.batch_size - 1).min(head);
        if let Some(end) = self.end_block {
            to_block = to_block.min(end);
        }

        let filter = Filter::new()
            .from_block(from_block)
            .to_block(to_block)
            .event_signature(self.topics.clone());
        let logs: Vec<Log> = self
            .client
            .logs(&filter)
            .await?
            .into_iter()
            .filter(|log| !log.removed)
            .collect();

        let block_numbers: Vec<u64> = logs
            .iter()
            .filter_map(|log| log.block_number)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let tx_hashes: Vec<B256> = logs
            .iter()
            .filter_map(|log| log.transaction_hash)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let blocks = self.fetch_blocks(&block_numbers).await?;
        let transactions = self.fetch_transactions(&tx_hashes).await?;
        let batch = assemble_batch(from_block, to_block, logs, &blocks, &transactions)?;

        tracing::debug!(
            "Fetched {} logs in {} blocks for chain {} (blocks {}-{})",
            batch.log_count(),
            batch.blocks.len(),
            self.chain_name,
            from_block,
            to_block
        );

        self.next_block = to_block + 1;
        Ok(Some(batch))
    }
}

/// Pre-EIP-155 transactions carry no chain id; handlers that need one treat
/// its absence as fatal.
fn transaction_info(hash: B256, tx: &Transaction) -> TransactionInfo {
    TransactionInfo {
        hash,
        from: tx.inner.signer(),
        to: tx.to(),
        chain_id: tx.chain_id(),
    }
}

/// Group logs by block, ordered by block number then log index.
fn assemble_batch(
    from_block: u64,
    to_block: u64,
    logs: Vec<Log>,
    blocks: &HashMap<u64, BlockInfo>,
    transactions: &HashMap<B256, TransactionInfo>,
) -> Result<LogBatch, SourceError> {
    let mut by_block: BTreeMap<u64, Vec<RawLog>> = BTreeMap::new();

    for log in logs {
        let block_number = log.block_number.ok_or(SourceError::IncompleteLog {
            block: None,
            field: "block number",
        })?;
        let log_index = log.log_index.ok_or(SourceError::IncompleteLog {
            block: Some(block_number),
            field: "log index",
        })?;
        let transaction = log
            .transaction_hash
            .and_then(|hash| transactions.get(&hash).copied());

        by_block.entry(block_number).or_default().push(RawLog {
            address: log.inner.address,
            topics: log.inner.data.topics().to_vec(),
            data: log.inner.data.data.clone(),
            log_index,
            transaction,
        });
    }

    let mut out = Vec::with_capacity(by_block.len());
    for (number, mut logs) in by_block {
        let block = *blocks.get(&number).ok_or(SourceError::BlockNotFound(number))?;
        logs.sort_by_key(|log| log.log_index);
        out.push(BlockLogs { block, logs });
    }

    Ok(LogBatch {
        from_block,
        to_block,
        blocks: out,
    })
}
