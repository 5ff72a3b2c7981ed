//! Transformation error types.

use thiserror::Error;

use crate::db::DbError;
use crate::decoding::DecodeError;
use crate::raw_data::SourceError;

#[derive(Debug, Error)]
pub enum TransformationError {
    #[error("Handler '{handler}' requires a chain id but the log carries none")]
    MissingChainId { handler: &'static str },

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Log source error: {0}")]
    Source(#[from] SourceError),
}

impl TransformationError {
    /// Whether the current batch must be abandoned. Decode errors only
    /// invalidate the log that produced them.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransformationError::Decode(_))
    }
}
