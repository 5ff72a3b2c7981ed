use std::path::Path;

use alloy_primitives::Address;
use anyhow::Context;
use serde::Deserialize;

use crate::decoding::portals::PortalSet;

/// Contracts of the first rollup generation. Identity is not chain-scoped.
#[derive(Debug, Clone, Deserialize)]
pub struct RollupV1Contracts {
    pub application_factory: Address,
    pub input_box: Address,
    pub erc20_portal: Address,
}

/// Contracts of the second rollup generation.
#[derive(Debug, Clone, Deserialize)]
pub struct RollupV2Contracts {
    /// Every factory whose `ApplicationCreated` events are indexed
    /// (e.g. the plain and the self-hosted application factory).
    pub application_factories: Vec<Address>,
    pub input_box: Address,
    pub erc20_portal: Address,
    pub erc721_portal: Address,
    pub erc1155_single_portal: Address,
    pub erc1155_batch_portal: Address,
}

impl RollupV2Contracts {
    pub fn portals(&self) -> PortalSet {
        PortalSet {
            erc20: self.erc20_portal,
            erc721: self.erc721_portal,
            erc1155_single: self.erc1155_single_portal,
            erc1155_batch: self.erc1155_batch_portal,
        }
    }
}

/// Validator node marketplace contracts.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketplaceContracts {
    pub provider_factory: Address,
}

/// Known contract addresses for one chain. Each generation is optional since
/// not every chain carries every deployment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Contracts {
    #[serde(default)]
    pub v1: Option<RollupV1Contracts>,
    #[serde(default)]
    pub v2: Option<RollupV2Contracts>,
    #[serde(default)]
    pub marketplace: Option<MarketplaceContracts>,
}

impl Contracts {
    pub fn is_v1_application_factory(&self, address: &Address) -> bool {
        self.v1
            .as_ref()
            .is_some_and(|v1| v1.application_factory == *address)
    }

    pub fn is_v2_application_factory(&self, address: &Address) -> bool {
        self.v2
            .as_ref()
            .is_some_and(|v2| v2.application_factories.contains(address))
    }

    pub fn is_v1_input_box(&self, address: &Address) -> bool {
        self.v1.as_ref().is_some_and(|v1| v1.input_box == *address)
    }

    pub fn is_v2_input_box(&self, address: &Address) -> bool {
        self.v2.as_ref().is_some_and(|v2| v2.input_box == *address)
    }

    pub fn is_provider_factory(&self, address: &Address) -> bool {
        self.marketplace
            .as_ref()
            .is_some_and(|m| m.provider_factory == *address)
    }

    pub fn v1_erc20_portal(&self) -> Option<Address> {
        self.v1.as_ref().map(|v1| v1.erc20_portal)
    }

    pub fn v2_portals(&self) -> Option<PortalSet> {
        self.v2.as_ref().map(RollupV2Contracts::portals)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ContractsOrPath {
    Inline(Contracts),
    Path(String),
}

pub fn load_contracts_from_path(base_dir: &Path, path: &str) -> anyhow::Result<Contracts> {
    let full_path = base_dir.join(path);
    let content = std::fs::read_to_string(&full_path)
        .with_context(|| format!("Failed to load contracts file at {}", full_path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse contracts file at {}", full_path.display()))
}
