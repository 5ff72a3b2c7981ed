//! Entity records materialized from rollup contract events.
//!
//! Every entity is keyed by a deterministic string id (see
//! `transformations::id`). Records are replaced wholesale on write; nothing is
//! ever deleted.

use std::fmt;

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Rollup protocol generation an application was created under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RollupVersion {
    V1,
    V2,
}

impl RollupVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            RollupVersion::V1 => "v1",
            RollupVersion::V2 => "v2",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "v1" => Some(RollupVersion::V1),
            "v2" => Some(RollupVersion::V2),
            _ => None,
        }
    }
}

impl fmt::Display for RollupVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationFactory {
    pub id: String,
    pub address: Address,
    pub chain: Option<String>,
}

/// Lifecycle of an application record that exists in the cache or store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationState {
    /// Created from incidental activity (an input) before its creation event
    /// was observed. Has neither factory nor owner.
    Phantom,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub id: String,
    pub address: Address,
    pub owner: Option<Address>,
    pub factory: Option<String>,
    pub chain: Option<String>,
    /// First-seen block timestamp, in seconds.
    pub timestamp: u64,
    pub deployment_timestamp: Option<u64>,
    pub activity_timestamp: Option<u64>,
    pub input_count: u64,
    pub rollup_version: RollupVersion,
}

impl Application {
    /// A record created by an input before the creation event arrived.
    pub fn phantom(
        id: String,
        address: Address,
        chain: Option<String>,
        timestamp: u64,
        rollup_version: RollupVersion,
    ) -> Self {
        Self {
            id,
            address,
            owner: None,
            factory: None,
            chain,
            timestamp,
            deployment_timestamp: None,
            activity_timestamp: None,
            input_count: 0,
            rollup_version,
        }
    }

    pub fn state(&self) -> ApplicationState {
        if self.factory.is_none() && self.owner.is_none() {
            ApplicationState::Phantom
        } else {
            ApplicationState::Complete
        }
    }

    /// Phantom → Complete transition. Returns `false` and leaves the record
    /// untouched when it is already complete.
    pub fn complete(&mut self, factory: String, owner: Address) -> bool {
        if self.state() != ApplicationState::Phantom {
            return false;
        }
        self.factory = Some(factory);
        self.owner = Some(owner);
        true
    }

    pub fn record_input(&mut self, block_timestamp: u64) {
        self.input_count += 1;
        self.activity_timestamp = Some(block_timestamp);
    }
}

/// The single deposit an input may carry. The variant names the deposit
/// table; the id always equals the input id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositRef {
    Erc20(String),
    Erc721(String),
    Erc1155(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub id: String,
    pub application: String,
    pub index: u64,
    pub msg_sender: Address,
    pub payload: Vec<u8>,
    pub timestamp: u64,
    pub block_number: u64,
    pub block_hash: B256,
    pub transaction_hash: Option<B256>,
    pub chain: Option<String>,
    pub deposit: Option<DepositRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub id: String,
    pub address: Address,
    pub chain: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nft {
    pub id: String,
    pub address: Address,
    pub chain: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiToken {
    pub id: String,
    pub address: Address,
    pub chain: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc20Deposit {
    pub id: String,
    pub from: Address,
    pub token: String,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc721Deposit {
    pub id: String,
    pub from: Address,
    pub token: String,
    pub token_index: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    pub token_index: U256,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc1155Deposit {
    pub id: String,
    pub from: Address,
    pub token: String,
    pub transfers: Vec<TokenTransfer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    pub id: String,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorNodeProvider {
    pub id: String,
    pub address: Address,
    pub authority: String,
    pub token: String,
    pub payee: Address,
    pub price: U256,
    pub paused: bool,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorNodeState {
    /// Only one of runway or location has been observed.
    Partial,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorNode {
    pub id: String,
    pub provider: String,
    pub application: Option<String>,
    pub location: Option<String>,
    /// Timestamp until which the node is funded.
    pub runway: Option<U256>,
}

impl ValidatorNode {
    pub fn state(&self) -> ValidatorNodeState {
        if self.location.is_some() && self.runway.is_some() {
            ValidatorNodeState::Complete
        } else {
            ValidatorNodeState::Partial
        }
    }
}

/// Entity kinds, listed in the order they are persisted so that referenced
/// rows are written before the rows that reference them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Chain,
    Token,
    Nft,
    MultiToken,
    Authority,
    ApplicationFactory,
    Application,
    ValidatorNodeProvider,
    ValidatorNode,
    Input,
    Erc20Deposit,
    Erc721Deposit,
    Erc1155Deposit,
}

impl EntityKind {
    pub const ALL: [EntityKind; 13] = [
        EntityKind::Chain,
        EntityKind::Token,
        EntityKind::Nft,
        EntityKind::MultiToken,
        EntityKind::Authority,
        EntityKind::ApplicationFactory,
        EntityKind::Application,
        EntityKind::ValidatorNodeProvider,
        EntityKind::ValidatorNode,
        EntityKind::Input,
        EntityKind::Erc20Deposit,
        EntityKind::Erc721Deposit,
        EntityKind::Erc1155Deposit,
    ];

    /// Plural label used in batch summaries.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Chain => "chains",
            EntityKind::Token => "tokens",
            EntityKind::Nft => "nfts",
            EntityKind::MultiToken => "multi_tokens",
            EntityKind::Authority => "authorities",
            EntityKind::ApplicationFactory => "application_factories",
            EntityKind::Application => "applications",
            EntityKind::ValidatorNodeProvider => "validator_node_providers",
            EntityKind::ValidatorNode => "validator_nodes",
            EntityKind::Input => "inputs",
            EntityKind::Erc20Deposit => "erc20_deposits",
            EntityKind::Erc721Deposit => "erc721_deposits",
            EntityKind::Erc1155Deposit => "erc1155_deposits",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind-erased entity, as exchanged with the durable store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Chain(Chain),
    Token(Token),
    Nft(Nft),
    MultiToken(MultiToken),
    Authority(Authority),
    ApplicationFactory(ApplicationFactory),
    Application(Application),
    ValidatorNodeProvider(ValidatorNodeProvider),
    ValidatorNode(ValidatorNode),
    Input(Input),
    Erc20Deposit(Erc20Deposit),
    Erc721Deposit(Erc721Deposit),
    Erc1155Deposit(Erc1155Deposit),
}

/// Typed view over a [`Record`] variant.
pub trait Entity: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    fn into_record(self) -> Record;

    /// Returns `None` when the record is of another kind.
    fn from_record(record: Record) -> Option<Self>;
}

macro_rules! impl_entity {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Entity for $ty {
                const KIND: EntityKind = EntityKind::$ty;

                fn id(&self) -> &str {
                    &self.id
                }

                fn into_record(self) -> Record {
                    Record::$ty(self)
                }

                fn from_record(record: Record) -> Option<Self> {
                    match record {
                        Record::$ty(entity) => Some(entity),
                        _ => None,
                    }
                }
            }
        )*

        impl Record {
            pub fn kind(&self) -> EntityKind {
                match self {
                    $(Record::$ty(_) => EntityKind::$ty,)*
                }
            }

            pub fn id(&self) -> &str {
                match self {
                    $(Record::$ty(entity) => &entity.id,)*
                }
            }
        }
    };
}

impl_entity!(
    Chain,
    Token,
    Nft,
    MultiToken,
    Authority,
    ApplicationFactory,
    Application,
    ValidatorNodeProvider,
    ValidatorNode,
    Input,
    Erc20Deposit,
    Erc721Deposit,
    Erc1155Deposit,
);
