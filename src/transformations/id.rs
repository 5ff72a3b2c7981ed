//! Deterministic entity identifiers.
//!
//! Ids are the persisted join key between every table and any query layer
//! built on top, so their format must never change.

use std::fmt::Display;

use alloy_primitives::Address;

use super::util::format_address;
use crate::types::entities::RollupVersion;

pub const SEPARATOR: &str = "-";

/// Join the string form of each part with `-`.
///
/// Parts are not escaped. Every caller passes addresses, integers or version
/// tags, none of which can contain the separator.
pub fn generate_id(parts: &[&dyn Display]) -> String {
    parts
        .iter()
        .map(|part| part.to_string())
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

pub fn chain_id(chain_id: u64) -> String {
    chain_id.to_string()
}

/// v1 entities are keyed by address alone.
pub fn legacy_id(address: Address) -> String {
    format_address(address)
}

pub fn application_v2_id(chain_id: u64, address: Address) -> String {
    generate_id(&[&chain_id, &format_address(address), &RollupVersion::V2])
}

/// Factory, token, NFT and multi-token ids on v2.
pub fn scoped_id(chain_id: u64, address: Address) -> String {
    generate_id(&[&chain_id, &format_address(address)])
}

/// Inputs and the deposits they carry share this id.
pub fn input_id(application_id: &str, index: u64) -> String {
    generate_id(&[&application_id, &index])
}

pub fn validator_node_id(provider: Address, application_id: &str) -> String {
    generate_id(&[&format_address(provider), &application_id])
}
