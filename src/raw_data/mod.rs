//! Raw log acquisition.

pub mod logs;

use alloy::primitives::B256;
use async_trait::async_trait;
use thiserror::Error;

use crate::rpc::RpcError;
use crate::types::log::LogBatch;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Block not found: {0}")]
    BlockNotFound(u64),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(B256),

    #[error("Log at block {block:?} is missing its {field}")]
    IncompleteLog {
        block: Option<u64>,
        field: &'static str,
    },
}

/// Ordered stream of log batches.
///
/// Batches cover consecutive, non-overlapping block ranges in ascending
/// order. `Ok(None)` means the source is exhausted.
#[async_trait]
pub trait LogSource: Send {
    async fn next_batch(&mut self) -> Result<Option<LogBatch>, SourceError>;
}
