use alloy_primitives::Address;
use async_trait::async_trait;

use crate::decoding::advance::decode_advance;
use crate::decoding::events::{decode_event, v1, v2, EventKind};
use crate::decoding::portals::{
    decode_fungible_v1, FungibleDeposit, MultiTokenDeposit, NonFungibleDeposit,
};
use crate::decoding::to_u64;
use crate::transformations::context::BatchContext;
use crate::transformations::error::TransformationError;
use crate::transformations::id;
use crate::transformations::registry::TransformationRegistry;
use crate::transformations::traits::{EventHandler, TransformationHandler};
use crate::transformations::util::metadata::{resolve_multi_token, resolve_nft, resolve_token};
use crate::types::entities::{
    Application, DepositRef, Erc1155Deposit, Erc20Deposit, Erc721Deposit, Input, RollupVersion,
};
use crate::types::log::{BlockInfo, RawLog};

use super::require_chain_id;

/// First-generation input box. Inputs may precede their application's
/// creation event, in which case a phantom application is created.
pub struct InputAddedV1Handler;

#[async_trait]
impl TransformationHandler for InputAddedV1Handler {
    fn name(&self) -> &'static str {
        "InputAddedV1Handler"
    }

    async fn handle(
        &self,
        log: &RawLog,
        block: &BlockInfo,
        ctx: &mut BatchContext,
    ) -> Result<(), TransformationError> {
        let event: v1::InputAdded = decode_event(log)?;
        let index = to_u64("inputIndex", event.inputIndex)?;

        let deposit = match ctx.contracts().v1_erc20_portal() {
            Some(portal) if portal == event.sender => Some(decode_fungible_v1(&event.input)?),
            _ => None,
        };

        let chain = log.chain_id().map(|chain_id| ctx.touch_chain(chain_id));

        let app_id = id::legacy_id(event.dapp);
        let mut app = match ctx.resolve::<Application>(&app_id).await? {
            Some(app) => app,
            None => {
                tracing::debug!("Input for unknown application {}, creating phantom", app_id);
                Application::phantom(
                    app_id.clone(),
                    event.dapp,
                    chain.clone(),
                    block.timestamp,
                    RollupVersion::V1,
                )
            }
        };
        app.record_input(block.timestamp);
        ctx.put(app);

        let input_id = id::input_id(&app_id, index);

        let deposit = match deposit {
            Some(deposit) => {
                let token = resolve_token(
                    ctx,
                    id::legacy_id(deposit.token),
                    deposit.token,
                    chain.clone(),
                    block.height,
                )
                .await?;
                ctx.put(Erc20Deposit {
                    id: input_id.clone(),
                    from: deposit.from,
                    token: token.id,
                    amount: deposit.amount,
                });
                Some(DepositRef::Erc20(input_id.clone()))
            }
            None => None,
        };

        ctx.put(Input {
            id: input_id,
            application: app_id,
            index,
            msg_sender: event.sender,
            payload: event.input.to_vec(),
            timestamp: block.timestamp,
            block_number: block.height,
            block_hash: block.hash,
            transaction_hash: log.transaction_hash(),
            chain,
            deposit,
        });

        Ok(())
    }
}

impl EventHandler for InputAddedV1Handler {
    fn triggers(&self) -> Vec<EventKind> {
        vec![EventKind::InputAddedV1]
    }
}

/// Deposit carried by a v2 input, if any.
enum PortalDeposit {
    Erc20(FungibleDeposit),
    Erc721(NonFungibleDeposit),
    Erc1155(MultiTokenDeposit),
}

/// Second-generation input box. The log carries an `EvmAdvance` envelope.
pub struct InputAddedV2Handler;

impl InputAddedV2Handler {
    /// Try every portal layout. Only the portal matching `sender` decodes.
    fn decode_deposit(
        ctx: &BatchContext,
        sender: &Address,
        payload: &[u8],
    ) -> Result<Option<PortalDeposit>, TransformationError> {
        let Some(portals) = ctx.contracts().v2_portals() else {
            return Ok(None);
        };

        let erc20 = portals.decode_erc20(sender, payload)?.map(PortalDeposit::Erc20);
        let erc721 = portals.decode_erc721(sender, payload)?.map(PortalDeposit::Erc721);
        let erc1155 = portals.decode_erc1155(sender, payload)?.map(PortalDeposit::Erc1155);

        Ok(erc20.or(erc721).or(erc1155))
    }

    async fn store_deposit(
        ctx: &mut BatchContext,
        deposit: PortalDeposit,
        input_id: &str,
        chain_id: u64,
        chain: &str,
        block: u64,
    ) -> Result<DepositRef, TransformationError> {
        let chain = Some(chain.to_string());
        let deposit_ref = match deposit {
            PortalDeposit::Erc20(deposit) => {
                let token_id = id::scoped_id(chain_id, deposit.token);
                let token = resolve_token(ctx, token_id, deposit.token, chain, block).await?;
                ctx.put(Erc20Deposit {
                    id: input_id.to_string(),
                    from: deposit.from,
                    token: token.id,
                    amount: deposit.amount,
                });
                DepositRef::Erc20(input_id.to_string())
            }
            PortalDeposit::Erc721(deposit) => {
                let nft_id = id::scoped_id(chain_id, deposit.token);
                let nft = resolve_nft(ctx, nft_id, deposit.token, chain, block).await?;
                ctx.put(Erc721Deposit {
                    id: input_id.to_string(),
                    from: deposit.from,
                    token: nft.id,
                    token_index: deposit.token_index,
                });
                DepositRef::Erc721(input_id.to_string())
            }
            PortalDeposit::Erc1155(deposit) => {
                let multi_id = id::scoped_id(chain_id, deposit.token);
                let multi = resolve_multi_token(ctx, multi_id, deposit.token, chain, block).await?;
                ctx.put(Erc1155Deposit {
                    id: input_id.to_string(),
                    from: deposit.from,
                    token: multi.id,
                    transfers: deposit.transfers,
                });
                DepositRef::Erc1155(input_id.to_string())
            }
        };
        Ok(deposit_ref)
    }
}

#[async_trait]
impl TransformationHandler for InputAddedV2Handler {
    fn name(&self) -> &'static str {
        "InputAddedV2Handler"
    }

    async fn handle(
        &self,
        log: &RawLog,
        block: &BlockInfo,
        ctx: &mut BatchContext,
    ) -> Result<(), TransformationError> {
        let chain_id = require_chain_id(log, self.name())?;
        let event: v2::InputAdded = decode_event(log)?;
        let index = to_u64("index", event.index)?;
        let envelope = decode_advance(&event.input)?;
        let deposit = Self::decode_deposit(ctx, &envelope.msg_sender, &envelope.payload)?;

        let chain = ctx.touch_chain(chain_id);

        let app_id = id::application_v2_id(chain_id, event.appContract);
        if ctx.resolve::<Application>(&app_id).await?.is_none() {
            tracing::debug!("Input for unknown application {}, creating", app_id);
            ctx.put(Application::phantom(
                app_id.clone(),
                event.appContract,
                Some(chain.clone()),
                block.timestamp,
                RollupVersion::V2,
            ));
        }

        let input_id = id::input_id(&app_id, index);

        let deposit = match deposit {
            Some(deposit) => Some(
                Self::store_deposit(ctx, deposit, &input_id, chain_id, &chain, block.height)
                    .await?,
            ),
            None => None,
        };

        ctx.put(Input {
            id: input_id,
            application: app_id,
            index,
            msg_sender: envelope.msg_sender,
            payload: envelope.payload.to_vec(),
            timestamp: block.timestamp,
            block_number: block.height,
            block_hash: block.hash,
            transaction_hash: log.transaction_hash(),
            chain: Some(chain),
            deposit,
        });

        Ok(())
    }
}

impl EventHandler for InputAddedV2Handler {
    fn triggers(&self) -> Vec<EventKind> {
        vec![EventKind::InputAddedV2]
    }
}

pub fn register_handlers(registry: &mut TransformationRegistry) {
    registry.register_event_handler(InputAddedV1Handler);
    registry.register_event_handler(InputAddedV2Handler);
}
