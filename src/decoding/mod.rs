//! Decoding of raw rollup logs and the payloads they carry.
//!
//! Nothing in here touches the network or the store: every function works on
//! bytes already fetched by the log source.

pub mod advance;
pub mod events;
pub mod portals;

use alloy_primitives::U256;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{kind} payload too short: expected at least {expected} bytes, got {actual}")]
    Truncated {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("ABI decode failed for {context}: {message}")]
    Abi {
        context: &'static str,
        message: String,
    },

    #[error("Batch transfer has {ids} token ids but {amounts} amounts")]
    LengthMismatch { ids: usize, amounts: usize },

    #[error("{field} does not fit in 64 bits: {value}")]
    Overflow { field: &'static str, value: U256 },
}

impl DecodeError {
    pub(crate) fn abi(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Abi {
            context,
            message: err.to_string(),
        }
    }
}

/// Narrow a 256-bit ABI value to `u64`.
pub(crate) fn to_u64(field: &'static str, value: U256) -> Result<u64, DecodeError> {
    value
        .try_into()
        .map_err(|_| DecodeError::Overflow { field, value })
}
