//! Utility functions for transformations.

pub mod metadata;

use alloy::primitives::Address;

/// Format an address as lowercase hex with a 0x prefix.
pub fn format_address(addr: Address) -> String {
    format!("0x{}", hex::encode(addr))
}
