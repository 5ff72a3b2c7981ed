use async_trait::async_trait;

use crate::decoding::events::{decode_event, EventKind, OwnershipTransferred};
use crate::transformations::context::BatchContext;
use crate::transformations::error::TransformationError;
use crate::transformations::id;
use crate::transformations::registry::TransformationRegistry;
use crate::transformations::traits::{EventHandler, TransformationHandler};
use crate::types::entities::{Application, ApplicationState};
use crate::types::log::{BlockInfo, RawLog};

/// `Ownable` transfers on application contracts of either generation.
///
/// The application is the transaction's target. Both the v1 and the v2 id are
/// tried; only applications whose creation was observed are updated.
pub struct OwnershipTransferredHandler;

#[async_trait]
impl TransformationHandler for OwnershipTransferredHandler {
    fn name(&self) -> &'static str {
        "OwnershipTransferredHandler"
    }

    async fn handle(
        &self,
        log: &RawLog,
        _block: &BlockInfo,
        ctx: &mut BatchContext,
    ) -> Result<(), TransformationError> {
        let event: OwnershipTransferred = decode_event(log)?;

        let target = log
            .transaction
            .as_ref()
            .and_then(|tx| tx.to)
            .unwrap_or(log.address);

        let mut candidates = vec![id::legacy_id(target)];
        if let Some(chain_id) = log.chain_id() {
            candidates.push(id::application_v2_id(chain_id, target));
        }

        for app_id in candidates {
            let Some(mut app) = ctx.resolve::<Application>(&app_id).await? else {
                continue;
            };
            if app.state() == ApplicationState::Phantom {
                tracing::debug!("Ignoring ownership transfer on phantom application {}", app_id);
                continue;
            }

            app.owner = Some(event.newOwner);
            if let Some(chain_id) = log.chain_id() {
                ctx.touch_chain(chain_id);
            }
            ctx.put(app);
        }

        Ok(())
    }
}

impl EventHandler for OwnershipTransferredHandler {
    fn triggers(&self) -> Vec<EventKind> {
        vec![EventKind::OwnershipTransferred]
    }
}

pub fn register_handlers(registry: &mut TransformationRegistry) {
    registry.register_event_handler(OwnershipTransferredHandler);
}
