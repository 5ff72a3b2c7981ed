use async_trait::async_trait;

use crate::decoding::events::{
    decode_event, EventKind, Paused, Unpaused, ValidatorNodeProviderCreated,
};
use crate::transformations::context::BatchContext;
use crate::transformations::error::TransformationError;
use crate::transformations::id;
use crate::transformations::registry::TransformationRegistry;
use crate::transformations::traits::{EventHandler, TransformationHandler};
use crate::transformations::util::metadata::resolve_token;
use crate::types::entities::{Authority, ValidatorNodeProvider};
use crate::types::log::{BlockInfo, RawLog};

pub struct ProviderCreatedHandler;

#[async_trait]
impl TransformationHandler for ProviderCreatedHandler {
    fn name(&self) -> &'static str {
        "ProviderCreatedHandler"
    }

    async fn handle(
        &self,
        log: &RawLog,
        block: &BlockInfo,
        ctx: &mut BatchContext,
    ) -> Result<(), TransformationError> {
        let event: ValidatorNodeProviderCreated = decode_event(log)?;

        let chain = log.chain_id().map(|chain_id| ctx.touch_chain(chain_id));

        let authority_id = id::legacy_id(event.authority);
        if ctx.resolve::<Authority>(&authority_id).await?.is_none() {
            ctx.put(Authority {
                id: authority_id.clone(),
                address: event.authority,
            });
        }

        let token = resolve_token(
            ctx,
            id::legacy_id(event.token),
            event.token,
            chain,
            block.height,
        )
        .await?;

        let provider_id = id::legacy_id(event.provider);
        tracing::debug!("Created validator node provider {}", provider_id);
        ctx.put(ValidatorNodeProvider {
            id: provider_id,
            address: event.provider,
            authority: authority_id,
            token: token.id,
            payee: event.payee,
            price: event.price,
            paused: false,
            timestamp: block.timestamp,
        });

        Ok(())
    }
}

impl EventHandler for ProviderCreatedHandler {
    fn triggers(&self) -> Vec<EventKind> {
        vec![EventKind::ValidatorNodeProviderCreated]
    }
}

/// Flip the pause flag of the provider that emitted the log, if it is known.
async fn set_paused(
    log: &RawLog,
    ctx: &mut BatchContext,
    paused: bool,
) -> Result<(), TransformationError> {
    let provider_id = id::legacy_id(log.address);
    match ctx.resolve::<ValidatorNodeProvider>(&provider_id).await? {
        Some(mut provider) => {
            provider.paused = paused;
            ctx.put(provider);
        }
        None => {
            tracing::debug!("Pause state change for unknown provider {}", provider_id);
        }
    }
    Ok(())
}

pub struct ProviderPausedHandler;

#[async_trait]
impl TransformationHandler for ProviderPausedHandler {
    fn name(&self) -> &'static str {
        "ProviderPausedHandler"
    }

    async fn handle(
        &self,
        log: &RawLog,
        _block: &BlockInfo,
        ctx: &mut BatchContext,
    ) -> Result<(), TransformationError> {
        decode_event::<Paused>(log)?;
        set_paused(log, ctx, true).await
    }
}

impl EventHandler for ProviderPausedHandler {
    fn triggers(&self) -> Vec<EventKind> {
        vec![EventKind::ValidatorNodeProviderPaused]
    }
}

pub struct ProviderUnpausedHandler;

#[async_trait]
impl TransformationHandler for ProviderUnpausedHandler {
    fn name(&self) -> &'static str {
        "ProviderUnpausedHandler"
    }

    async fn handle(
        &self,
        log: &RawLog,
        _block: &BlockInfo,
        ctx: &mut BatchContext,
    ) -> Result<(), TransformationError> {
        decode_event::<Unpaused>(log)?;
        set_paused(log, ctx, false).await
    }
}

impl EventHandler for ProviderUnpausedHandler {
    fn triggers(&self) -> Vec<EventKind> {
        vec![EventKind::ValidatorNodeProviderUnpaused]
    }
}

pub fn register_handlers(registry: &mut TransformationRegistry) {
    registry.register_event_handler(ProviderCreatedHandler);
    registry.register_event_handler(ProviderPausedHandler);
    registry.register_event_handler(ProviderUnpausedHandler);
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, U256};

    use super::*;
    use crate::transformations::event::fixtures::*;
    use crate::types::entities::{EntityKind, Token};

    fn created(provider: Address) -> ValidatorNodeProviderCreated {
        ValidatorNodeProviderCreated {
            provider,
            authority: Address::repeat_byte(0x41),
            token: Address::repeat_byte(0x42),
            payee: Address::repeat_byte(0x43),
            price: U256::from(1_000u64),
        }
    }

    #[tokio::test]
    async fn test_created_registers_authority_and_token() {
        let mut h = Harness::new();
        let provider = Address::repeat_byte(0x40);
        let log = log(provider_factory(), &created(provider), Some(CHAIN_ID));

        ProviderCreatedHandler
            .handle(&log, &block(5, 500), &mut h.ctx)
            .await
            .unwrap();

        let changes = h.ctx.into_changes();
        let providers: Vec<ValidatorNodeProvider> = changes.entities();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].id, id::legacy_id(provider));
        assert_eq!(providers[0].authority, id::legacy_id(Address::repeat_byte(0x41)));
        assert_eq!(providers[0].price, U256::from(1_000u64));
        assert!(!providers[0].paused);

        let tokens: Vec<Token> = changes.entities();
        assert_eq!(tokens[0].id, id::legacy_id(Address::repeat_byte(0x42)));
        assert_eq!(tokens[0].chain.as_deref(), Some("11155111"));
        assert_eq!(changes.records(EntityKind::Authority).len(), 1);
    }

    #[tokio::test]
    async fn test_pause_and_unpause_known_provider() {
        let mut h = Harness::new();
        let provider = Address::repeat_byte(0x40);
        let log_created = log(provider_factory(), &created(provider), None);
        ProviderCreatedHandler
            .handle(&log_created, &block(5, 500), &mut h.ctx)
            .await
            .unwrap();

        let paused = log(provider, &Paused { account: Address::ZERO }, None);
        ProviderPausedHandler
            .handle(&paused, &block(6, 600), &mut h.ctx)
            .await
            .unwrap();
        let stored = h
            .ctx
            .resolve::<ValidatorNodeProvider>(&id::legacy_id(provider))
            .await
            .unwrap()
            .unwrap();
        assert!(stored.paused);

        let unpaused = log(provider, &Unpaused { account: Address::ZERO }, None);
        ProviderUnpausedHandler
            .handle(&unpaused, &block(7, 700), &mut h.ctx)
            .await
            .unwrap();
        let stored = h
            .ctx
            .resolve::<ValidatorNodeProvider>(&id::legacy_id(provider))
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.paused);
    }

    #[tokio::test]
    async fn test_repeated_creation_replaces_provider() {
        let mut h = Harness::new();
        let provider = Address::repeat_byte(0x40);

        let first = log(provider_factory(), &created(provider), None);
        ProviderCreatedHandler
            .handle(&first, &block(5, 500), &mut h.ctx)
            .await
            .unwrap();
        let paused = log(provider, &Paused { account: Address::ZERO }, None);
        ProviderPausedHandler
            .handle(&paused, &block(6, 600), &mut h.ctx)
            .await
            .unwrap();

        let again = ValidatorNodeProviderCreated {
            payee: Address::repeat_byte(0x44),
            price: U256::from(2_500u64),
            ..created(provider)
        };
        let second = log(provider_factory(), &again, None);
        ProviderCreatedHandler
            .handle(&second, &block(7, 700), &mut h.ctx)
            .await
            .unwrap();

        let providers: Vec<ValidatorNodeProvider> = h.ctx.into_changes().entities();
        assert_eq!(providers.len(), 1);
        assert!(!providers[0].paused);
        assert_eq!(providers[0].payee, Address::repeat_byte(0x44));
        assert_eq!(providers[0].price, U256::from(2_500u64));
        assert_eq!(providers[0].timestamp, 700);
    }

    #[tokio::test]
    async fn test_pause_unknown_provider_is_noop() {
        let mut h = Harness::new();
        let log = log(Address::repeat_byte(0x99), &Paused { account: Address::ZERO }, None);

        ProviderPausedHandler
            .handle(&log, &block(6, 600), &mut h.ctx)
            .await
            .unwrap();
        assert!(h.ctx.into_changes().is_empty());
    }
}
