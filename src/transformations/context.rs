//! Per-batch transformation context.
//!
//! A [`BatchContext`] is built fresh for every batch and handed to each
//! handler in turn. It owns one [`EntityCache`] per entity kind plus handles to
//! the durable store, the token metadata source and the chain's known
//! contracts. Nothing in it outlives the batch; the store is the only state
//! carried forward.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::cache::EntityCache;
use super::util::metadata::TokenMetadataSource;
use crate::db::{DbError, EntityStore};
use crate::types::config::contract::Contracts;
use crate::types::entities::{
    Application, ApplicationFactory, Authority, Chain, Entity, EntityKind, Erc1155Deposit,
    Erc20Deposit, Erc721Deposit, Input, MultiToken, Nft, Record, Token, ValidatorNode,
    ValidatorNodeProvider,
};

/// One cache per entity kind.
#[derive(Default)]
pub struct Caches {
    chains: EntityCache<Chain>,
    tokens: EntityCache<Token>,
    nfts: EntityCache<Nft>,
    multi_tokens: EntityCache<MultiToken>,
    authorities: EntityCache<Authority>,
    application_factories: EntityCache<ApplicationFactory>,
    applications: EntityCache<Application>,
    providers: EntityCache<ValidatorNodeProvider>,
    nodes: EntityCache<ValidatorNode>,
    inputs: EntityCache<Input>,
    erc20_deposits: EntityCache<Erc20Deposit>,
    erc721_deposits: EntityCache<Erc721Deposit>,
    erc1155_deposits: EntityCache<Erc1155Deposit>,
}

/// An entity with a dedicated cache in [`Caches`].
pub trait CachedEntity: Entity {
    fn cache(caches: &mut Caches) -> &mut EntityCache<Self>;
}

macro_rules! cached_entity {
    ($($ty:ident => $field:ident),* $(,)?) => {
        $(
            impl CachedEntity for $ty {
                fn cache(caches: &mut Caches) -> &mut EntityCache<Self> {
                    &mut caches.$field
                }
            }
        )*

        impl Caches {
            fn written_counts(&self) -> Vec<(EntityKind, usize)> {
                vec![$(($ty::KIND, self.$field.written_count()),)*]
            }

            fn into_changes(self) -> EntityChanges {
                let mut by_kind = vec![$(($ty::KIND, self.$field.into_written()),)*];
                by_kind.retain(|(_, records)| !records.is_empty());
                by_kind.sort_by_key(|(kind, _)| *kind);
                EntityChanges { by_kind }
            }
        }
    };
}

cached_entity!(
    Chain => chains,
    Token => tokens,
    Nft => nfts,
    MultiToken => multi_tokens,
    Authority => authorities,
    ApplicationFactory => application_factories,
    Application => applications,
    ValidatorNodeProvider => providers,
    ValidatorNode => nodes,
    Input => inputs,
    Erc20Deposit => erc20_deposits,
    Erc721Deposit => erc721_deposits,
    Erc1155Deposit => erc1155_deposits,
);

pub struct BatchContext {
    store: Arc<dyn EntityStore>,
    metadata: Arc<dyn TokenMetadataSource>,
    contracts: Arc<Contracts>,
    caches: Caches,
}

impl BatchContext {
    pub fn new(
        store: Arc<dyn EntityStore>,
        metadata: Arc<dyn TokenMetadataSource>,
        contracts: Arc<Contracts>,
    ) -> Self {
        Self {
            store,
            metadata,
            contracts,
            caches: Caches::default(),
        }
    }

    pub fn contracts(&self) -> &Contracts {
        &self.contracts
    }

    pub fn metadata(&self) -> &dyn TokenMetadataSource {
        self.metadata.as_ref()
    }

    /// Cache-then-store lookup.
    pub async fn resolve<E: CachedEntity>(&mut self, id: &str) -> Result<Option<E>, DbError> {
        E::cache(&mut self.caches)
            .resolve(self.store.as_ref(), id)
            .await
    }

    pub fn put<E: CachedEntity>(&mut self, entity: E) {
        E::cache(&mut self.caches).put(entity);
    }

    /// Record the chain an event was observed on.
    pub fn touch_chain(&mut self, chain_id: u64) -> String {
        let id = super::id::chain_id(chain_id);
        self.put(Chain { id: id.clone() });
        id
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            counts: self
                .caches
                .written_counts()
                .into_iter()
                .filter(|(_, count)| *count > 0)
                .collect(),
        }
    }

    pub fn into_changes(self) -> EntityChanges {
        self.caches.into_changes()
    }
}

/// Entities written during one batch, grouped by kind in persistence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityChanges {
    by_kind: Vec<(EntityKind, Vec<Record>)>,
}

impl EntityChanges {
    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }

    pub fn total(&self) -> usize {
        self.by_kind.iter().map(|(_, records)| records.len()).sum()
    }

    pub fn records(&self, kind: EntityKind) -> &[Record] {
        self.by_kind
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, records)| records.as_slice())
            .unwrap_or(&[])
    }

    /// Typed view of one kind's records.
    pub fn entities<E: Entity>(&self) -> Vec<E> {
        self.records(E::KIND)
            .iter()
            .cloned()
            .filter_map(E::from_record)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, &[Record])> {
        self.by_kind
            .iter()
            .map(|(kind, records)| (*kind, records.as_slice()))
    }

    pub fn into_inner(self) -> Vec<(EntityKind, Vec<Record>)> {
        self.by_kind
    }
}

impl FromIterator<Record> for EntityChanges {
    fn from_iter<I: IntoIterator<Item = Record>>(records: I) -> Self {
        let mut grouped: BTreeMap<EntityKind, Vec<Record>> = BTreeMap::new();
        for record in records {
            grouped.entry(record.kind()).or_default().push(record);
        }
        Self {
            by_kind: grouped.into_iter().collect(),
        }
    }
}

/// Per-kind counts of the entities a batch wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    counts: Vec<(EntityKind, usize)>,
}

impl BatchSummary {
    pub fn count(&self, kind: EntityKind) -> usize {
        self.counts
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, count)| count).sum()
    }
}

impl From<&EntityChanges> for BatchSummary {
    fn from(changes: &EntityChanges) -> Self {
        Self {
            counts: changes
                .iter()
                .map(|(kind, records)| (kind, records.len()))
                .collect(),
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.counts.is_empty() {
            return f.write_str("no entity changes");
        }
        for (i, (kind, count)) in self.counts.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", count, kind)?;
        }
        Ok(())
    }
}
