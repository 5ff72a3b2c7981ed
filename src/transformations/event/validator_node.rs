use alloy_primitives::Address;
use async_trait::async_trait;

use crate::decoding::events::{decode_event, EventKind, FinancialRunway, MachineLocation};
use crate::transformations::context::BatchContext;
use crate::transformations::error::TransformationError;
use crate::transformations::id;
use crate::transformations::registry::TransformationRegistry;
use crate::transformations::traits::{EventHandler, TransformationHandler};
use crate::types::entities::{Application, ValidatorNode, ValidatorNodeProvider};
use crate::types::log::{BlockInfo, RawLog};

/// Load or create the node that `provider` runs for `dapp`.
///
/// Returns `None` when the emitting contract is not a known provider.
async fn resolve_node(
    ctx: &mut BatchContext,
    provider: Address,
    dapp: Address,
) -> Result<Option<ValidatorNode>, TransformationError> {
    let provider_id = id::legacy_id(provider);
    let Some(provider) = ctx.resolve::<ValidatorNodeProvider>(&provider_id).await? else {
        tracing::debug!("Node update from unknown provider {}", provider_id);
        return Ok(None);
    };

    let app_id = id::legacy_id(dapp);
    let node_id = id::validator_node_id(provider.address, &app_id);
    if let Some(node) = ctx.resolve::<ValidatorNode>(&node_id).await? {
        return Ok(Some(node));
    }

    let application = ctx
        .resolve::<Application>(&app_id)
        .await?
        .map(|app| app.id);

    Ok(Some(ValidatorNode {
        id: node_id,
        provider: provider.id,
        application,
        location: None,
        runway: None,
    }))
}

pub struct FinancialRunwayHandler;

#[async_trait]
impl TransformationHandler for FinancialRunwayHandler {
    fn name(&self) -> &'static str {
        "FinancialRunwayHandler"
    }

    async fn handle(
        &self,
        log: &RawLog,
        _block: &BlockInfo,
        ctx: &mut BatchContext,
    ) -> Result<(), TransformationError> {
        let event: FinancialRunway = decode_event(log)?;

        if let Some(mut node) = resolve_node(ctx, log.address, event.dapp).await? {
            node.runway = Some(event.until);
            ctx.put(node);
        }
        Ok(())
    }
}

impl EventHandler for FinancialRunwayHandler {
    fn triggers(&self) -> Vec<EventKind> {
        vec![EventKind::ValidatorNodeFinancialRunway]
    }
}

pub struct MachineLocationHandler;

#[async_trait]
impl TransformationHandler for MachineLocationHandler {
    fn name(&self) -> &'static str {
        "MachineLocationHandler"
    }

    async fn handle(
        &self,
        log: &RawLog,
        _block: &BlockInfo,
        ctx: &mut BatchContext,
    ) -> Result<(), TransformationError> {
        let event: MachineLocation = decode_event(log)?;

        if let Some(mut node) = resolve_node(ctx, log.address, event.dapp).await? {
            node.location = Some(event.location);
            ctx.put(node);
        }
        Ok(())
    }
}

impl EventHandler for MachineLocationHandler {
    fn triggers(&self) -> Vec<EventKind> {
        vec![EventKind::ValidatorNodeMachineLocation]
    }
}

pub fn register_handlers(registry: &mut TransformationRegistry) {
    registry.register_event_handler(FinancialRunwayHandler);
    registry.register_event_handler(MachineLocationHandler);
}
