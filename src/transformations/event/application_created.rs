use async_trait::async_trait;

use crate::decoding::events::{decode_event, v1, v2, EventKind};
use crate::transformations::context::BatchContext;
use crate::transformations::error::TransformationError;
use crate::transformations::id;
use crate::transformations::registry::TransformationRegistry;
use crate::transformations::traits::{EventHandler, TransformationHandler};
use crate::types::entities::{
    Application, ApplicationFactory, ApplicationState, RollupVersion,
};
use crate::types::log::{BlockInfo, RawLog};

use super::require_chain_id;

/// First-generation factory. Completes applications that inputs created
/// ahead of their creation event.
pub struct ApplicationCreatedV1Handler;

#[async_trait]
impl TransformationHandler for ApplicationCreatedV1Handler {
    fn name(&self) -> &'static str {
        "ApplicationCreatedV1Handler"
    }

    async fn handle(
        &self,
        log: &RawLog,
        block: &BlockInfo,
        ctx: &mut BatchContext,
    ) -> Result<(), TransformationError> {
        let event: v1::ApplicationCreated = decode_event(log)?;

        let chain = log.chain_id().map(|chain_id| ctx.touch_chain(chain_id));

        let factory_id = id::legacy_id(log.address);
        ctx.put(ApplicationFactory {
            id: factory_id.clone(),
            address: log.address,
            chain: chain.clone(),
        });

        let app_id = id::legacy_id(event.application);
        match ctx.resolve::<Application>(&app_id).await? {
            Some(mut app) if app.state() == ApplicationState::Phantom => {
                app.complete(factory_id, event.dappOwner);
                tracing::debug!("Completed phantom application {}", app_id);
                ctx.put(app);
            }
            Some(_) => {
                tracing::debug!("Application {} already created, skipping", app_id);
            }
            None => {
                ctx.put(Application {
                    id: app_id,
                    address: event.application,
                    owner: Some(event.dappOwner),
                    factory: Some(factory_id),
                    chain,
                    timestamp: block.timestamp,
                    deployment_timestamp: Some(block.timestamp),
                    activity_timestamp: Some(block.timestamp),
                    input_count: 0,
                    rollup_version: RollupVersion::V1,
                });
            }
        }

        Ok(())
    }
}

impl EventHandler for ApplicationCreatedV1Handler {
    fn triggers(&self) -> Vec<EventKind> {
        vec![EventKind::ApplicationCreatedV1]
    }
}

/// Second-generation factories. Creation always overwrites.
pub struct ApplicationCreatedV2Handler;

#[async_trait]
impl TransformationHandler for ApplicationCreatedV2Handler {
    fn name(&self) -> &'static str {
        "ApplicationCreatedV2Handler"
    }

    async fn handle(
        &self,
        log: &RawLog,
        block: &BlockInfo,
        ctx: &mut BatchContext,
    ) -> Result<(), TransformationError> {
        let chain_id = require_chain_id(log, self.name())?;
        let event: v2::ApplicationCreated = decode_event(log)?;

        let chain = ctx.touch_chain(chain_id);

        let factory_id = id::scoped_id(chain_id, log.address);
        ctx.put(ApplicationFactory {
            id: factory_id.clone(),
            address: log.address,
            chain: Some(chain.clone()),
        });

        let app_id = id::application_v2_id(chain_id, event.appContract);
        tracing::debug!("Created application {}", app_id);
        ctx.put(Application {
            id: app_id,
            address: event.appContract,
            owner: Some(event.appOwner),
            factory: Some(factory_id),
            chain: Some(chain),
            timestamp: block.timestamp,
            deployment_timestamp: Some(block.timestamp),
            activity_timestamp: None,
            input_count: 0,
            rollup_version: RollupVersion::V2,
        });

        Ok(())
    }
}

impl EventHandler for ApplicationCreatedV2Handler {
    fn triggers(&self) -> Vec<EventKind> {
        vec![EventKind::ApplicationCreatedV2]
    }
}

pub fn register_handlers(registry: &mut TransformationRegistry) {
    registry.register_event_handler(ApplicationCreatedV1Handler);
    registry.register_event_handler(ApplicationCreatedV2Handler);
}
