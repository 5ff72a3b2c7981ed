//! Configuration for the transformation system.

use serde::Deserialize;

/// Configuration for batch processing and persistence.
///
/// All fields have defaults, so the whole section may be omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct TransformationConfig {
    /// PostgreSQL connection string environment variable.
    #[serde(default = "default_database_url_env_var")]
    pub database_url_env_var: String,

    /// Number of blocks fetched and dispatched per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,

    /// How long to wait before polling the chain head again once caught up.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum PostgreSQL connections held by the pool.
    #[serde(default = "default_db_pool_size")]
    pub db_pool_size: usize,
}

fn default_database_url_env_var() -> String {
    "DATABASE_URL".to_string()
}

fn default_batch_size() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_db_pool_size() -> usize {
    16
}

impl Default for TransformationConfig {
    fn default() -> Self {
        Self {
            database_url_env_var: default_database_url_env_var(),
            batch_size: default_batch_size(),
            poll_interval_ms: default_poll_interval_ms(),
            db_pool_size: default_db_pool_size(),
        }
    }
}
