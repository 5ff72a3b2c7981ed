use alloy_primitives::{Address, B256, U256};
use serde_json::Value as JsonValue;

use super::error::DbError;

/// A value bound to a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    /// NULL value
    Null,
    /// Boolean
    Bool(bool),
    /// Signed 64-bit integer
    Int64(i64),
    /// Unsigned 8-bit integer (stored as SMALLINT/INT2)
    Int2(u8),
    /// Text (unlimited length)
    Text(String),
    /// Raw bytes (stored as BYTEA)
    Bytes(Vec<u8>),
    /// Ethereum address (20 bytes, stored as BYTEA)
    Address([u8; 20]),
    /// 32-byte hash (stored as BYTEA)
    Bytes32([u8; 32]),
    /// Numeric string for uint256 (stored as NUMERIC)
    Numeric(String),
    /// JSONB value
    JsonB(JsonValue),
}

impl DbValue {
    pub fn address(address: Address) -> Self {
        DbValue::Address(address.into_array())
    }

    pub fn bytes32(hash: B256) -> Self {
        DbValue::Bytes32(hash.0)
    }

    pub fn numeric(value: U256) -> Self {
        DbValue::Numeric(value.to_string())
    }

    /// `BIGINT` is signed, so values above `i64::MAX` are rejected.
    pub fn uint64(value: u64) -> Result<Self, DbError> {
        i64::try_from(value)
            .map(DbValue::Int64)
            .map_err(|_| DbError::OutOfRange(value))
    }

    pub fn optional_uint64(value: Option<u64>) -> Result<Self, DbError> {
        value.map_or(Ok(DbValue::Null), DbValue::uint64)
    }

    pub fn text(value: impl Into<String>) -> Self {
        DbValue::Text(value.into())
    }

    pub fn optional<T>(value: Option<T>, f: impl FnOnce(T) -> DbValue) -> Self {
        value.map(f).unwrap_or(DbValue::Null)
    }
}

/// INSERT with ON CONFLICT DO UPDATE on the given key columns.
#[derive(Debug, Clone)]
pub struct Upsert {
    pub table: &'static str,
    pub columns: Vec<&'static str>,
    pub values: Vec<DbValue>,
    /// Columns that form the unique constraint
    pub conflict_columns: Vec<&'static str>,
}

impl Upsert {
    /// Every non-key column is replaced on conflict.
    pub fn update_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns
            .iter()
            .copied()
            .filter(|c| !self.conflict_columns.contains(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint64_rejects_values_above_bigint() {
        assert_eq!(DbValue::uint64(42).unwrap(), DbValue::Int64(42));
        assert_eq!(
            DbValue::uint64(i64::MAX as u64).unwrap(),
            DbValue::Int64(i64::MAX)
        );
        assert!(matches!(
            DbValue::uint64(u64::MAX),
            Err(DbError::OutOfRange(u64::MAX))
        ));
        assert_eq!(DbValue::optional_uint64(None).unwrap(), DbValue::Null);
        assert!(DbValue::optional_uint64(Some(1 << 63)).is_err());
    }
}
