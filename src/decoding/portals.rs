//! Portal payload layouts.
//!
//! Portals prefix the forwarded payload with packed token and sender
//! addresses followed by kind-specific fields. Which layout applies is decided
//! only by the input's `msgSender`.

use alloy::sol_types::SolValue;
use alloy_primitives::{Address, U256};

use super::DecodeError;
use crate::types::entities::TokenTransfer;

const ADDRESS_LEN: usize = 20;
const WORD_LEN: usize = 32;

/// A fungible transfer forwarded by an ERC-20 portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FungibleDeposit {
    pub token: Address,
    pub from: Address,
    pub amount: U256,
}

/// A single NFT forwarded by an ERC-721 portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonFungibleDeposit {
    pub token: Address,
    pub from: Address,
    pub token_index: U256,
}

/// One or more ERC-1155 transfers, from either the single or batch portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiTokenDeposit {
    pub token: Address,
    pub from: Address,
    pub transfers: Vec<TokenTransfer>,
}

/// Portal addresses of one v2 deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortalSet {
    pub erc20: Address,
    pub erc721: Address,
    pub erc1155_single: Address,
    pub erc1155_batch: Address,
}

impl PortalSet {
    pub fn decode_erc20(
        &self,
        sender: &Address,
        payload: &[u8],
    ) -> Result<Option<FungibleDeposit>, DecodeError> {
        if *sender != self.erc20 {
            return Ok(None);
        }
        decode_fungible(payload).map(Some)
    }

    pub fn decode_erc721(
        &self,
        sender: &Address,
        payload: &[u8],
    ) -> Result<Option<NonFungibleDeposit>, DecodeError> {
        if *sender != self.erc721 {
            return Ok(None);
        }
        decode_non_fungible(payload).map(Some)
    }

    pub fn decode_erc1155(
        &self,
        sender: &Address,
        payload: &[u8],
    ) -> Result<Option<MultiTokenDeposit>, DecodeError> {
        if *sender == self.erc1155_single {
            decode_multi_token_single(payload).map(Some)
        } else if *sender == self.erc1155_batch {
            decode_multi_token_batch(payload).map(Some)
        } else {
            Ok(None)
        }
    }
}

fn ensure_len(kind: &'static str, payload: &[u8], expected: usize) -> Result<(), DecodeError> {
    if payload.len() < expected {
        return Err(DecodeError::Truncated {
            kind,
            expected,
            actual: payload.len(),
        });
    }
    Ok(())
}

fn address_at(payload: &[u8], offset: usize) -> Address {
    Address::from_slice(&payload[offset..offset + ADDRESS_LEN])
}

fn word_at(payload: &[u8], offset: usize) -> U256 {
    U256::from_be_slice(&payload[offset..offset + WORD_LEN])
}

/// `[token:20][from:20][amount:32]`
pub fn decode_fungible(payload: &[u8]) -> Result<FungibleDeposit, DecodeError> {
    ensure_len("erc20", payload, 2 * ADDRESS_LEN + WORD_LEN)?;
    Ok(FungibleDeposit {
        token: address_at(payload, 0),
        from: address_at(payload, ADDRESS_LEN),
        amount: word_at(payload, 2 * ADDRESS_LEN),
    })
}

/// v1 portals emit a leading success flag before the v2 fungible layout.
pub fn decode_fungible_v1(payload: &[u8]) -> Result<FungibleDeposit, DecodeError> {
    ensure_len("erc20 (v1)", payload, 1 + 2 * ADDRESS_LEN + WORD_LEN)?;
    decode_fungible(&payload[1..])
}

/// `[token:20][from:20][tokenIndex:32]`
pub fn decode_non_fungible(payload: &[u8]) -> Result<NonFungibleDeposit, DecodeError> {
    ensure_len("erc721", payload, 2 * ADDRESS_LEN + WORD_LEN)?;
    Ok(NonFungibleDeposit {
        token: address_at(payload, 0),
        from: address_at(payload, ADDRESS_LEN),
        token_index: word_at(payload, 2 * ADDRESS_LEN),
    })
}

/// `[token:20][from:20][tokenIndex:32][amount:32]`
pub fn decode_multi_token_single(payload: &[u8]) -> Result<MultiTokenDeposit, DecodeError> {
    let start = 2 * ADDRESS_LEN;
    ensure_len("erc1155 single", payload, start + 2 * WORD_LEN)?;
    Ok(MultiTokenDeposit {
        token: address_at(payload, 0),
        from: address_at(payload, ADDRESS_LEN),
        transfers: vec![TokenTransfer {
            token_index: word_at(payload, start),
            amount: word_at(payload, start + WORD_LEN),
        }],
    })
}

/// `[token:20][from:20]` followed by `abi.encode(uint256[] ids, uint256[] amounts, ...)`.
pub fn decode_multi_token_batch(payload: &[u8]) -> Result<MultiTokenDeposit, DecodeError> {
    let start = 2 * ADDRESS_LEN;
    ensure_len("erc1155 batch", payload, start)?;

    let (ids, amounts) = <(Vec<U256>, Vec<U256>)>::abi_decode_params(&payload[start..])
        .map_err(|e| DecodeError::abi("erc1155 batch", e))?;

    if ids.len() != amounts.len() {
        return Err(DecodeError::LengthMismatch {
            ids: ids.len(),
            amounts: amounts.len(),
        });
    }

    Ok(MultiTokenDeposit {
        token: address_at(payload, 0),
        from: address_at(payload, ADDRESS_LEN),
        transfers: ids
            .into_iter()
            .zip(amounts)
            .map(|(token_index, amount)| TokenTransfer {
                token_index,
                amount,
            })
            .collect(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::transformations::util::format_address;

    pub(crate) fn packed(token: Address, from: Address, words: &[U256]) -> Vec<u8> {
        let mut out = Vec::with_capacity(40 + 32 * words.len());
        out.extend_from_slice(token.as_slice());
        out.extend_from_slice(from.as_slice());
        for word in words {
            out.extend_from_slice(&word.to_be_bytes::<32>());
        }
        out
    }

    pub(crate) fn batch_payload(
        token: Address,
        from: Address,
        ids: Vec<U256>,
        amounts: Vec<U256>,
    ) -> Vec<u8> {
        let mut out = packed(token, from, &[]);
        out.extend_from_slice(&(ids, amounts).abi_encode_params());
        out
    }

    fn portals() -> PortalSet {
        PortalSet {
            erc20: Address::repeat_byte(0x01),
            erc721: Address::repeat_byte(0x02),
            erc1155_single: Address::repeat_byte(0x03),
            erc1155_batch: Address::repeat_byte(0x04),
        }
    }

    #[test]
    fn test_fungible_round_trip_lowercases_addresses() {
        let token: Address = "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01".parse().unwrap();
        let from: Address = "0x00000000000000000000000000000000DeaDBeef".parse().unwrap();
        let amount = U256::from(1_000_000_000_000_000_000u128);

        let deposit = decode_fungible(&packed(token, from, &[amount])).unwrap();
        assert_eq!(deposit.amount, amount);
        assert_eq!(
            format_address(deposit.token),
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
        assert_eq!(
            format_address(deposit.from),
            "0x00000000000000000000000000000000deadbeef"
        );
    }

    #[test]
    fn test_fungible_v1_skips_success_flag() {
        let token = Address::repeat_byte(0x10);
        let from = Address::repeat_byte(0x20);
        let mut payload = vec![1u8];
        payload.extend(packed(token, from, &[U256::from(5u64)]));

        let deposit = decode_fungible_v1(&payload).unwrap();
        assert_eq!(deposit.token, token);
        assert_eq!(deposit.from, from);
        assert_eq!(deposit.amount, U256::from(5u64));
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let payload = packed(Address::ZERO, Address::ZERO, &[U256::ZERO]);
        let err = decode_fungible(&payload[..71]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Truncated {
                expected: 72,
                actual: 71,
                ..
            }
        ));
        assert!(decode_non_fungible(&payload[..40]).is_err());
        assert!(decode_multi_token_single(&payload).is_err());
    }

    #[test]
    fn test_multi_token_single_is_one_transfer() {
        let payload = packed(
            Address::repeat_byte(7),
            Address::repeat_byte(8),
            &[U256::from(3u64), U256::from(50u64)],
        );
        let deposit = decode_multi_token_single(&payload).unwrap();
        assert_eq!(
            deposit.transfers,
            vec![TokenTransfer {
                token_index: U256::from(3u64),
                amount: U256::from(50u64),
            }]
        );
    }

    #[test]
    fn test_multi_token_batch_zips_arrays() {
        let payload = batch_payload(
            Address::repeat_byte(7),
            Address::repeat_byte(8),
            vec![U256::from(1u64), U256::from(2u64)],
            vec![U256::from(100u64), U256::from(200u64)],
        );
        let deposit = decode_multi_token_batch(&payload).unwrap();
        assert_eq!(deposit.token, Address::repeat_byte(7));
        assert_eq!(
            deposit.transfers,
            vec![
                TokenTransfer {
                    token_index: U256::from(1u64),
                    amount: U256::from(100u64),
                },
                TokenTransfer {
                    token_index: U256::from(2u64),
                    amount: U256::from(200u64),
                },
            ]
        );
    }

    #[test]
    fn test_multi_token_batch_length_mismatch() {
        let payload = batch_payload(
            Address::repeat_byte(7),
            Address::repeat_byte(8),
            vec![U256::from(1u64), U256::from(2u64)],
            vec![U256::from(100u64)],
        );
        assert!(matches!(
            decode_multi_token_batch(&payload),
            Err(DecodeError::LengthMismatch { ids: 2, amounts: 1 })
        ));
    }

    #[test]
    fn test_portal_set_selects_by_sender() {
        let portals = portals();
        let payload = packed(Address::repeat_byte(9), Address::repeat_byte(9), &[
            U256::from(1u64),
            U256::from(1u64),
        ]);

        assert!(portals
            .decode_erc20(&portals.erc20, &payload)
            .unwrap()
            .is_some());
        assert!(portals
            .decode_erc721(&portals.erc20, &payload)
            .unwrap()
            .is_none());
        assert!(portals
            .decode_erc1155(&portals.erc1155_single, &payload)
            .unwrap()
            .is_some());
        assert!(portals
            .decode_erc1155(&Address::repeat_byte(0x55), &payload)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_non_portal_sender_ignores_malformed_payload() {
        let portals = portals();
        let sender = Address::repeat_byte(0x99);
        assert!(portals.decode_erc20(&sender, &[1, 2]).unwrap().is_none());
        assert!(portals.decode_erc721(&sender, &[]).unwrap().is_none());
    }
}
