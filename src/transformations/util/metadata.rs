//! Token contract metadata.
//!
//! Tokens, NFTs and multi-tokens are created the first time a deposit or
//! provider references them. Their `name`/`symbol`/`decimals` are read from the
//! contract at that block; each call may fail independently and a failure
//! only leaves that field empty.

use alloy_primitives::Address;
use async_trait::async_trait;

use crate::db::DbError;
use crate::rpc::RpcError;
use crate::transformations::context::{BatchContext, CachedEntity};
use crate::types::entities::{MultiToken, Nft, Token};
use crate::types::shared::metadata::TokenMetadata;

/// Read-only ERC-20/721/1155 metadata calls.
#[async_trait]
pub trait TokenMetadataSource: Send + Sync {
    async fn name(&self, token: Address, block: u64) -> Result<String, RpcError>;

    async fn symbol(&self, token: Address, block: u64) -> Result<String, RpcError>;

    async fn decimals(&self, token: Address, block: u64) -> Result<u8, RpcError>;
}

fn tolerate<T>(token: Address, field: &str, result: Result<T, RpcError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Token {} has no readable {}: {}", token, field, e);
            None
        }
    }
}

/// Issue the metadata calls concurrently, keeping whatever succeeds.
pub async fn fetch_metadata(
    source: &dyn TokenMetadataSource,
    token: Address,
    block: u64,
    with_decimals: bool,
) -> TokenMetadata {
    let decimals = async {
        if with_decimals {
            Some(source.decimals(token, block).await)
        } else {
            None
        }
    };
    let (name, symbol, decimals) =
        tokio::join!(source.name(token, block), source.symbol(token, block), decimals);

    TokenMetadata {
        name: tolerate(token, "name", name),
        symbol: tolerate(token, "symbol", symbol),
        decimals: decimals.and_then(|d| tolerate(token, "decimals", d)),
    }
}

/// An entity whose first sighting triggers a metadata fetch.
trait MetadataEntity: CachedEntity {
    const WITH_DECIMALS: bool;

    fn build(id: String, address: Address, chain: Option<String>, meta: TokenMetadata) -> Self;
}

impl MetadataEntity for Token {
    const WITH_DECIMALS: bool = true;

    fn build(id: String, address: Address, chain: Option<String>, meta: TokenMetadata) -> Self {
        Token {
            id,
            address,
            chain,
            name: meta.name,
            symbol: meta.symbol,
            decimals: meta.decimals,
        }
    }
}

impl MetadataEntity for Nft {
    const WITH_DECIMALS: bool = false;

    fn build(id: String, address: Address, chain: Option<String>, meta: TokenMetadata) -> Self {
        Nft {
            id,
            address,
            chain,
            name: meta.name,
            symbol: meta.symbol,
        }
    }
}

impl MetadataEntity for MultiToken {
    const WITH_DECIMALS: bool = false;

    fn build(id: String, address: Address, chain: Option<String>, meta: TokenMetadata) -> Self {
        MultiToken {
            id,
            address,
            chain,
            name: meta.name,
            symbol: meta.symbol,
        }
    }
}

async fn resolve_or_fetch<E: MetadataEntity>(
    ctx: &mut BatchContext,
    id: String,
    address: Address,
    chain: Option<String>,
    block: u64,
) -> Result<E, DbError> {
    if let Some(existing) = ctx.resolve::<E>(&id).await? {
        return Ok(existing);
    }

    let meta = fetch_metadata(ctx.metadata(), address, block, E::WITH_DECIMALS).await;
    tracing::debug!(
        "New {} {} ({:?}/{:?})",
        E::KIND,
        id,
        meta.name,
        meta.symbol
    );
    let entity = E::build(id, address, chain, meta);
    ctx.put(entity.clone());
    Ok(entity)
}

pub async fn resolve_token(
    ctx: &mut BatchContext,
    id: String,
    address: Address,
    chain: Option<String>,
    block: u64,
) -> Result<Token, DbError> {
    resolve_or_fetch(ctx, id, address, chain, block).await
}

pub async fn resolve_nft(
    ctx: &mut BatchContext,
    id: String,
    address: Address,
    chain: Option<String>,
    block: u64,
) -> Result<Nft, DbError> {
    resolve_or_fetch(ctx, id, address, chain, block).await
}

pub async fn resolve_multi_token(
    ctx: &mut BatchContext,
    id: String,
    address: Address,
    chain: Option<String>,
    block: u64,
) -> Result<MultiToken, DbError> {
    resolve_or_fetch(ctx, id, address, chain, block).await
}
