//! The `EvmAdvance` envelope wrapped around every v2 input.

use alloy::sol;
use alloy::sol_types::SolCall;
use alloy_primitives::{Address, Bytes, U256};

use super::{to_u64, DecodeError};

sol! {
    function EvmAdvance(
        uint256 chainId,
        address appContract,
        address msgSender,
        uint256 blockNumber,
        uint256 blockTimestamp,
        uint256 prevRandao,
        uint256 index,
        bytes payload
    );
}

/// A decoded advance request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceEnvelope {
    pub chain_id: u64,
    pub app_contract: Address,
    pub msg_sender: Address,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub prev_randao: U256,
    pub index: u64,
    pub payload: Bytes,
}

/// Decode the selector-prefixed envelope carried in the `input` field of a
/// v2 `InputAdded` log.
pub fn decode_advance(input: &[u8]) -> Result<AdvanceEnvelope, DecodeError> {
    let call = EvmAdvanceCall::abi_decode(input)
        .map_err(|e| DecodeError::abi("EvmAdvance", e))?;

    Ok(AdvanceEnvelope {
        chain_id: to_u64("chainId", call.chainId)?,
        app_contract: call.appContract,
        msg_sender: call.msgSender,
        block_number: to_u64("blockNumber", call.blockNumber)?,
        block_timestamp: to_u64("blockTimestamp", call.blockTimestamp)?,
        prev_randao: call.prevRandao,
        index: to_u64("index", call.index)?,
        payload: call.payload,
    })
}

#[cfg(test)]
pub(crate) fn encode_advance(envelope: &AdvanceEnvelope) -> Bytes {
    EvmAdvanceCall {
        chainId: U256::from(envelope.chain_id),
        appContract: envelope.app_contract,
        msgSender: envelope.msg_sender,
        blockNumber: U256::from(envelope.block_number),
        blockTimestamp: U256::from(envelope.block_timestamp),
        prevRandao: envelope.prev_randao,
        index: U256::from(envelope.index),
        payload: envelope.payload.clone(),
    }
    .abi_encode()
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> AdvanceEnvelope {
        AdvanceEnvelope {
            chain_id: 11155111,
            app_contract: Address::repeat_byte(0xaa),
            msg_sender: Address::repeat_byte(0xbb),
            block_number: 5_000_000,
            block_timestamp: 1_700_000_000,
            prev_randao: U256::from(42u64),
            index: 7,
            payload: Bytes::from_static(b"hello"),
        }
    }

    #[test]
    fn test_decode_advance() {
        let expected = envelope();
        let encoded = encode_advance(&expected);
        assert_eq!(&encoded[..4], EvmAdvanceCall::SELECTOR.as_slice());

        let decoded = decode_advance(&encoded).unwrap();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_wrong_selector_rejected() {
        let mut encoded = encode_advance(&envelope()).to_vec();
        encoded[0] ^= 0xff;
        assert!(matches!(
            decode_advance(&encoded),
            Err(DecodeError::Abi { .. })
        ));
    }

    #[test]
    fn test_truncated_envelope_rejected() {
        let encoded = encode_advance(&envelope());
        assert!(decode_advance(&encoded[..100]).is_err());
        assert!(decode_advance(&[]).is_err());
    }

    #[test]
    fn test_oversized_index_rejected() {
        let encoded: Bytes = EvmAdvanceCall {
            chainId: U256::from(1u64),
            appContract: Address::ZERO,
            msgSender: Address::ZERO,
            blockNumber: U256::ZERO,
            blockTimestamp: U256::ZERO,
            prevRandao: U256::ZERO,
            index: U256::MAX,
            payload: Bytes::new(),
        }
        .abi_encode()
        .into();

        assert!(matches!(
            decode_advance(&encoded),
            Err(DecodeError::Overflow { field: "index", .. })
        ));
    }
}
