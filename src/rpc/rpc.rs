//! JSON-RPC access used by the log source and the token metadata lookups.
//!
//! Every request goes through [`RpcClient::request`]: it waits on the
//! optional rate limiter, then retries transient failures with a capped,
//! doubling backoff. Block and transaction lookups for one batch fan out
//! with at most `concurrency` requests in flight.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;

use alloy::network::Ethereum;
use alloy::primitives::{Bytes, B256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{
    Block, BlockId, BlockNumberOrTag, Filter, Log, Transaction, TransactionRequest,
};
use futures::stream::{self, StreamExt, TryStreamExt};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Invalid RPC URL: {0}")]
    InvalidUrl(String),

    #[error("{method} failed: {message}")]
    Request {
        method: &'static str,
        message: String,
    },

    #[error("Unusable response: {0}")]
    BadResponse(String),
}

/// Substrings of node or transport errors that are worth another attempt.
const TRANSIENT_MARKERS: &[&str] = &[
    "connection",
    "timeout",
    "timed out",
    "reset",
    "broken pipe",
    "network",
    "eof",
    "sending request",
    "rate limit",
    "too many requests",
    "429",
    "502",
    "503",
    "504",
    "internal server error",
    "service unavailable",
    "bad gateway",
    "temporarily",
    "try again",
];

impl RpcError {
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Request { message, .. } => {
                let message = message.to_lowercase();
                TRANSIENT_MARKERS.iter().any(|m| message.contains(m))
            }
            RpcError::InvalidUrl(_) | RpcError::BadResponse(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Delay before retry number `retry` (1-based): `base_delay * 2^(retry-1)`,
    /// capped at `max_delay`.
    fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    pub url: Url,
    /// Block and transaction lookups in flight at once.
    pub concurrency: usize,
    pub requests_per_second: Option<NonZeroU32>,
    pub retry: RetryPolicy,
}

impl RpcClientConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            concurrency: 16,
            requests_per_second: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_rate_limit(mut self, requests_per_second: NonZeroU32) -> Self {
        self.requests_per_second = Some(requests_per_second);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

pub struct RpcClient {
    provider: RootProvider<Ethereum>,
    limiter: Option<DefaultDirectRateLimiter>,
    concurrency: usize,
    retry: RetryPolicy,
}

impl RpcClient {
    pub fn new(config: RpcClientConfig) -> Self {
        Self {
            provider: RootProvider::<Ethereum>::new_http(config.url),
            limiter: config
                .requests_per_second
                .map(|rps| RateLimiter::direct(Quota::per_second(rps))),
            concurrency: config.concurrency.max(1),
            retry: config.retry,
        }
    }

    async fn request<T, E, F, Fut>(
        &self,
        method: &'static str,
        mut call: F,
    ) -> Result<T, RpcError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut retry = 0;
        loop {
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }

            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(e) => RpcError::Request {
                    method,
                    message: e.to_string(),
                },
            };

            if retry >= self.retry.max_retries || !err.is_retryable() {
                if retry > 0 {
                    tracing::error!("{} gave up after {} retries: {}", method, retry, err);
                }
                return Err(err);
            }

            retry += 1;
            let delay = self.retry.delay(retry);
            tracing::warn!(
                "{} failed ({}), retry {}/{} in {:?}",
                method,
                err,
                retry,
                self.retry.max_retries,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    pub async fn head(&self) -> Result<u64, RpcError> {
        let provider = &self.provider;
        self.request("eth_blockNumber", || async move {
            provider.get_block_number().await
        })
        .await
    }

    pub async fn logs(&self, filter: &Filter) -> Result<Vec<Log>, RpcError> {
        let provider = &self.provider;
        self.request("eth_getLogs", || async move { provider.get_logs(filter).await })
            .await
    }

    /// Headers of `numbers`, keyed by block number. Missing blocks map to `None`.
    pub async fn blocks(
        &self,
        numbers: &[u64],
    ) -> Result<HashMap<u64, Option<Block>>, RpcError> {
        let provider = &self.provider;
        stream::iter(numbers.iter().copied())
            .map(|number| async move {
                let block = self
                    .request("eth_getBlockByNumber", || async move {
                        provider
                            .get_block_by_number(BlockNumberOrTag::Number(number))
                            .await
                    })
                    .await?;
                Ok::<_, RpcError>((number, block))
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await
    }

    /// Transactions by hash. Unknown hashes map to `None`.
    pub async fn transactions(
        &self,
        hashes: &[B256],
    ) -> Result<HashMap<B256, Option<Transaction>>, RpcError> {
        let provider = &self.provider;
        stream::iter(hashes.iter().copied())
            .map(|hash| async move {
                let tx = self
                    .request("eth_getTransactionByHash", || async move {
                        provider.get_transaction_by_hash(hash).await
                    })
                    .await?;
                Ok::<_, RpcError>((hash, tx))
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await
    }

    /// `eth_call` against the state at `block`.
    pub async fn call(&self, tx: &TransactionRequest, block: u64) -> Result<Bytes, RpcError> {
        let provider = &self.provider;
        let at = BlockId::Number(BlockNumberOrTag::Number(block));
        self.request("eth_call", || async move {
            provider.call(tx.clone()).block(at).await
        })
        .await
    }
}
