//! Token metadata over `eth_call`.

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::{keccak256, Address, Bytes};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;

use super::rpc::{RpcClient, RpcError};
use crate::transformations::util::metadata::TokenMetadataSource;

/// Selector of a no-argument function signature such as `"name()"`.
fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn decode_output(output: &[u8], ty: &DynSolType) -> Result<DynSolValue, RpcError> {
    ty.abi_decode(output)
        .map_err(|e| RpcError::BadResponse(format!("undecodable return data: {}", e)))
}

/// Some early tokens return `bytes32` instead of `string` for name/symbol.
fn decode_text(output: &[u8]) -> Result<String, RpcError> {
    if let Ok(DynSolValue::String(s)) = decode_output(output, &DynSolType::String) {
        return Ok(s);
    }
    match decode_output(output, &DynSolType::FixedBytes(32))? {
        DynSolValue::FixedBytes(word, _) => {
            let end = word.iter().position(|b| *b == 0).unwrap_or(32);
            String::from_utf8(word[..end].to_vec())
                .map_err(|e| RpcError::BadResponse(format!("non-utf8 bytes32 text: {}", e)))
        }
        other => Err(RpcError::BadResponse(format!(
            "unexpected return value {:?}",
            other
        ))),
    }
}

impl RpcClient {
    async fn call_view(
        &self,
        token: Address,
        signature: &str,
        block: u64,
    ) -> Result<Bytes, RpcError> {
        let tx = TransactionRequest::default()
            .to(token)
            .input(Bytes::from(selector(signature).to_vec()).into());
        let output = self.call(&tx, block).await?;
        if output.is_empty() {
            return Err(RpcError::BadResponse(format!(
                "{} returned no data at {}",
                signature, token
            )));
        }
        Ok(output)
    }
}

#[async_trait]
impl TokenMetadataSource for RpcClient {
    async fn name(&self, token: Address, block: u64) -> Result<String, RpcError> {
        let output = self.call_view(token, "name()", block).await?;
        decode_text(&output)
    }

    async fn symbol(&self, token: Address, block: u64) -> Result<String, RpcError> {
        let output = self.call_view(token, "symbol()", block).await?;
        decode_text(&output)
    }

    async fn decimals(&self, token: Address, block: u64) -> Result<u8, RpcError> {
        let output = self.call_view(token, "decimals()", block).await?;
        match decode_output(&output, &DynSolType::Uint(8))? {
            DynSolValue::Uint(value, _) => value
                .try_into()
                .map_err(|_| RpcError::BadResponse(format!("decimals out of range: {}", value))),
            other => Err(RpcError::BadResponse(format!(
                "unexpected return value {:?}",
                other
            ))),
        }
    }
}
