use std::path::Path;

use serde::Deserialize;

use crate::types::config::contract::{load_contracts_from_path, Contracts, ContractsOrPath};

#[derive(Debug, Deserialize)]
pub struct ChainConfigRaw {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url_env_var: String,
    #[serde(default)]
    pub start_block: u64,
    #[serde(default)]
    pub end_block: Option<u64>,
    pub contracts: ContractsOrPath,
}

#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url_env_var: String,
    pub start_block: u64,
    /// Stop after this block (inclusive). Follows the chain head when unset.
    pub end_block: Option<u64>,
    pub contracts: Contracts,
}

pub fn resolve_chain_config(
    raw_config: ChainConfigRaw,
    base_dir: &Path,
) -> anyhow::Result<ChainConfig> {
    let contracts = match raw_config.contracts {
        ContractsOrPath::Inline(contracts) => contracts,
        ContractsOrPath::Path(p) => load_contracts_from_path(base_dir, &p)?,
    };

    if let Some(end_block) = raw_config.end_block {
        anyhow::ensure!(
            end_block >= raw_config.start_block,
            "chain {}: end_block {} is before start_block {}",
            raw_config.name,
            end_block,
            raw_config.start_block
        );
    }

    Ok(ChainConfig {
        name: raw_config.name,
        chain_id: raw_config.chain_id,
        rpc_url_env_var: raw_config.rpc_url_env_var,
        start_block: raw_config.start_block,
        end_block: raw_config.end_block,
        contracts,
    })
}
