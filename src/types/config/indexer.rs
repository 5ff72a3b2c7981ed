use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::types::config::chain::{resolve_chain_config, ChainConfig, ChainConfigRaw};
use crate::types::config::transformations::TransformationConfig;

#[derive(Debug, Deserialize)]
pub struct IndexerConfigRaw {
    pub chains: Vec<ChainConfigRaw>,
    #[serde(default)]
    pub indexer: TransformationConfig,
}

#[derive(Debug)]
pub struct IndexerConfig {
    pub chains: Vec<ChainConfig>,
    pub indexer: TransformationConfig,
}

impl IndexerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let base_dir = path.parent().unwrap_or(Path::new("."));
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;

        Self::parse(&content, base_dir)
            .with_context(|| format!("Failed to load config file at {}", path.display()))
    }

    pub fn parse(content: &str, base_dir: &Path) -> anyhow::Result<Self> {
        let raw_config: IndexerConfigRaw =
            serde_json::from_str(content).context("Failed to parse config")?;

        let chains = raw_config
            .chains
            .into_iter()
            .map(|chain| resolve_chain_config(chain, base_dir))
            .collect::<anyhow::Result<Vec<_>>>()?;

        anyhow::ensure!(
            raw_config.indexer.batch_size > 0,
            "indexer.batch_size must be greater than zero"
        );

        Ok(IndexerConfig {
            chains,
            indexer: raw_config.indexer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "chains": [
            {
                "name": "sepolia",
                "chain_id": 11155111,
                "rpc_url_env_var": "SEPOLIA_RPC_URL",
                "start_block": 3963384,
                "contracts": {
                    "v1": {
                        "application_factory": "0x7122cd1221c20892234186facfe8615e6743ab02",
                        "input_box": "0x59b22d57d4f067708ab0c00552767405926dc768",
                        "erc20_portal": "0x9c21aeb2093c32ddbc53eef24b873bdcd1ada1db"
                    },
                    "v2": {
                        "application_factories": ["0x2210ad1d9b0bd2d470c2bfa4814ab6253bc421a0"],
                        "input_box": "0x593e5bcf894d6829dd26d0810da7f064406aebb6",
                        "erc20_portal": "0x05355c2f9ba566c06199deb17212c3b78c1a3c31",
                        "erc721_portal": "0x0f6bd37ef60d3d5e1e4d2e4a9b5f1c4c6f4d7c81",
                        "erc1155_single_portal": "0x18558398dd1a8ce20956287a4da7b76ae7a96662",
                        "erc1155_batch_portal": "0xe246abb974b307490d9c6932f48ebe79de72338a"
                    }
                }
            }
        ],
        "indexer": { "batch_size": 500 }
    }"#;

    #[test]
    fn test_parse_inline_config() {
        let config = IndexerConfig::parse(CONFIG, Path::new(".")).unwrap();

        assert_eq!(config.chains.len(), 1);
        let chain = &config.chains[0];
        assert_eq!(chain.name, "sepolia");
        assert_eq!(chain.chain_id, 11155111);
        assert_eq!(chain.start_block, 3963384);
        assert!(chain.end_block.is_none());
        assert!(chain.contracts.v1.is_some());
        assert_eq!(
            chain.contracts.v2.as_ref().unwrap().application_factories.len(),
            1
        );
        assert!(chain.contracts.marketplace.is_none());

        assert_eq!(config.indexer.batch_size, 500);
        assert_eq!(config.indexer.poll_interval_ms, 5000);
        assert_eq!(config.indexer.database_url_env_var, "DATABASE_URL");
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let content = CONFIG.replace("\"batch_size\": 500", "\"batch_size\": 0");
        assert!(IndexerConfig::parse(&content, Path::new(".")).is_err());
    }

    #[test]
    fn test_bundled_config_resolves_contract_file() {
        let config = IndexerConfig::load(Path::new("config/config.json")).unwrap();
        let chain = &config.chains[0];
        assert_eq!(chain.chain_id, 11155111);
        assert!(chain.contracts.v2_portals().is_some());
        assert_eq!(config.indexer.db_pool_size, 16);
    }
}
