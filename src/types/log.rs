//! Log source boundary types: ordered batches of blocks and their logs.

use alloy_primitives::{Address, Bytes, B256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub height: u64,
    pub hash: B256,
    /// Block timestamp in seconds.
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionInfo {
    pub hash: B256,
    pub from: Address,
    pub to: Option<Address>,
    pub chain_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub log_index: u64,
    pub transaction: Option<TransactionInfo>,
}

impl RawLog {
    pub fn topic0(&self) -> Option<&B256> {
        self.topics.first()
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.transaction.as_ref().and_then(|tx| tx.chain_id)
    }

    pub fn transaction_hash(&self) -> Option<B256> {
        self.transaction.as_ref().map(|tx| tx.hash)
    }
}

/// One block and its logs, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLogs {
    pub block: BlockInfo,
    pub logs: Vec<RawLog>,
}

/// Blocks `[from_block, to_block]` in ascending height. Blocks without any
/// matching log are omitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBatch {
    pub from_block: u64,
    pub to_block: u64,
    pub blocks: Vec<BlockLogs>,
}

impl LogBatch {
    pub fn log_count(&self) -> usize {
        self.blocks.iter().map(|b| b.logs.len()).sum()
    }
}
