//! Event handlers for transformation.
//!
//! Add new event handler modules here and register them in `register_handlers`.

pub mod application_created;
pub mod input_added;
pub mod ownership;
pub mod provider;
pub mod validator_node;

use super::error::TransformationError;
use super::registry::TransformationRegistry;
use crate::types::log::RawLog;

/// Register all event handlers with the registry.
pub fn register_handlers(registry: &mut TransformationRegistry) {
    application_created::register_handlers(registry);
    input_added::register_handlers(registry);
    ownership::register_handlers(registry);
    provider::register_handlers(registry);
    validator_node::register_handlers(registry);
}

/// Chain id of the log's transaction. v2 identity is chain-scoped, so its
/// handlers cannot proceed without one.
pub(crate) fn require_chain_id(
    log: &RawLog,
    handler: &'static str,
) -> Result<u64, TransformationError> {
    log.chain_id()
        .ok_or(TransformationError::MissingChainId { handler })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use alloy::sol_types::SolEvent;
    use alloy_primitives::{Address, B256};

    use crate::db::MemoryStore;
    use crate::transformations::context::BatchContext;
    use crate::transformations::util::metadata::tests::CountingMetadata;
    use crate::types::config::contract::{
        Contracts, MarketplaceContracts, RollupV1Contracts, RollupV2Contracts,
    };
    use crate::types::log::{BlockInfo, RawLog, TransactionInfo};

    pub const CHAIN_ID: u64 = 11155111;

    pub fn v1_factory() -> Address {
        Address::repeat_byte(0x11)
    }
    pub fn v1_input_box() -> Address {
        Address::repeat_byte(0x12)
    }
    pub fn v1_erc20_portal() -> Address {
        Address::repeat_byte(0x13)
    }
    pub fn v2_factory() -> Address {
        Address::repeat_byte(0x21)
    }
    pub fn v2_input_box() -> Address {
        Address::repeat_byte(0x22)
    }
    pub fn provider_factory() -> Address {
        Address::repeat_byte(0x31)
    }

    pub fn contracts() -> Contracts {
        Contracts {
            v1: Some(RollupV1Contracts {
                application_factory: v1_factory(),
                input_box: v1_input_box(),
                erc20_portal: v1_erc20_portal(),
            }),
            v2: Some(RollupV2Contracts {
                application_factories: vec![v2_factory()],
                input_box: v2_input_box(),
                erc20_portal: Address::repeat_byte(0x23),
                erc721_portal: Address::repeat_byte(0x24),
                erc1155_single_portal: Address::repeat_byte(0x25),
                erc1155_batch_portal: Address::repeat_byte(0x26),
            }),
            marketplace: Some(MarketplaceContracts {
                provider_factory: provider_factory(),
            }),
        }
    }

    pub struct Harness {
        pub store: Arc<MemoryStore>,
        pub metadata: Arc<CountingMetadata>,
        pub ctx: BatchContext,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_store(Arc::new(MemoryStore::new()))
        }

        pub fn with_store(store: Arc<MemoryStore>) -> Self {
            Self::with_parts(store, CountingMetadata::default())
        }

        pub fn with_metadata(metadata: CountingMetadata) -> Self {
            Self::with_parts(Arc::new(MemoryStore::new()), metadata)
        }

        fn with_parts(store: Arc<MemoryStore>, metadata: CountingMetadata) -> Self {
            let metadata = Arc::new(metadata);
            let ctx = BatchContext::new(store.clone(), metadata.clone(), Arc::new(contracts()));
            Self {
                store,
                metadata,
                ctx,
            }
        }
    }

    pub fn block(height: u64, timestamp: u64) -> BlockInfo {
        BlockInfo {
            height,
            hash: B256::repeat_byte(height as u8),
            timestamp,
        }
    }

    pub fn log<E: SolEvent>(address: Address, event: &E, chain_id: Option<u64>) -> RawLog {
        let data = event.encode_log_data();
        RawLog {
            address,
            topics: data.topics().to_vec(),
            data: data.data,
            log_index: 0,
            transaction: Some(TransactionInfo {
                hash: B256::repeat_byte(0xee),
                from: Address::repeat_byte(0xef),
                to: Some(address),
                chain_id,
            }),
        }
    }
}
