//! Core traits for transformation handlers.
//!
//! Handlers receive one classified log at a time together with the batch
//! context, and record their effects by writing entities into it.

use async_trait::async_trait;

use super::context::BatchContext;
use super::error::TransformationError;
use crate::decoding::events::EventKind;
use crate::types::log::{BlockInfo, RawLog};

/// Core trait that all transformation handlers must implement.
#[async_trait]
pub trait TransformationHandler: Send + Sync + 'static {
    /// Unique name for this handler (used in logging).
    fn name(&self) -> &'static str;

    /// Apply one log to the batch.
    ///
    /// A handler must finish all decoding before its first write to `ctx`, so
    /// a decode error leaves the batch untouched.
    async fn handle(
        &self,
        log: &RawLog,
        block: &BlockInfo,
        ctx: &mut BatchContext,
    ) -> Result<(), TransformationError>;
}

/// Handler bound to one or more classified events.
pub trait EventHandler: TransformationHandler {
    /// Event kinds this handler responds to.
    fn triggers(&self) -> Vec<EventKind>;
}
