mod db;
mod decoding;
mod raw_data;
mod rpc;
mod transformations;
mod types;

use std::env;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

use db::{DbPool, EntityStore, MemoryStore, PgEntityStore};
use raw_data::logs::RpcLogSource;
use rpc::{RetryPolicy, RpcClient, RpcClientConfig, RpcError};
use transformations::{build_registry, IndexingEngine, TransformationRegistry};
use types::config::chain::ChainConfig;
use types::config::indexer::IndexerConfig;

const DEFAULT_CONFIG_PATH: &str = "config/config.json";

struct CliArgs {
    dry_run: bool,
    config_path: PathBuf,
}

impl CliArgs {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let dry_run = args.iter().any(|a| a == "--dry-run");
        let config_path = match args.iter().position(|a| a == "--config") {
            Some(i) => args
                .get(i + 1)
                .map(PathBuf::from)
                .context("--config requires a path")?,
            None => PathBuf::from(DEFAULT_CONFIG_PATH),
        };
        Ok(Self {
            dry_run,
            config_path,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let cli = CliArgs::parse(&args)?;

    let config = IndexerConfig::load(&cli.config_path)?;
    load_required_env_vars(&config, cli.dry_run)?;

    let store: Arc<dyn EntityStore> = if cli.dry_run {
        tracing::info!("Running in dry-run mode, entities are kept in memory only");
        Arc::new(MemoryStore::new())
    } else {
        let database_url = env::var(&config.indexer.database_url_env_var)
            .with_context(|| format!("{} is not set", config.indexer.database_url_env_var))?;
        let pool = DbPool::new(&database_url, config.indexer.db_pool_size)
            .await
            .context("Failed to connect to database")?;
        pool.run_migrations(Path::new(db::migrations::MIGRATIONS_DIR))
            .await
            .context("Failed to run migrations")?;
        Arc::new(PgEntityStore::new(Arc::new(pool)))
    };

    let registry = Arc::new(build_registry());
    let write_lock = Arc::new(Mutex::new(()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C, finishing current batches");
            let _ = shutdown_tx.send(true);
        }
    });

    let poll_interval = Duration::from_millis(config.indexer.poll_interval_ms);
    let batch_size = config.indexer.batch_size;

    let mut tasks = JoinSet::new();
    for chain in config.chains {
        let store = store.clone();
        let registry = registry.clone();
        let write_lock = write_lock.clone();
        let shutdown = shutdown_rx.clone();
        tasks.spawn(async move {
            let name = chain.name.clone();
            index_chain(
                chain,
                store,
                registry,
                write_lock,
                batch_size,
                poll_interval,
                shutdown,
            )
            .await
            .with_context(|| format!("Indexing chain {} failed", name))
        });
    }

    while let Some(result) = tasks.join_next().await {
        result.context("Chain task panicked")??;
    }

    tracing::info!("All chains stopped");
    Ok(())
}

async fn index_chain(
    chain: ChainConfig,
    store: Arc<dyn EntityStore>,
    registry: Arc<TransformationRegistry>,
    write_lock: Arc<Mutex<()>>,
    batch_size: u64,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let rpc_url = env::var(&chain.rpc_url_env_var)
        .with_context(|| format!("{} is not set", chain.rpc_url_env_var))?;
    let client = Arc::new(build_rpc_client(&rpc_url)?);

    let engine = IndexingEngine::new(
        chain.name.clone(),
        chain.chain_id,
        registry,
        store,
        client.clone(),
        Arc::new(chain.contracts),
    )
    .with_write_lock(write_lock);

    let start_block = engine.resume_block(chain.start_block).await?;
    if chain.end_block.is_some_and(|end| start_block > end) {
        tracing::info!(
            "Chain {} already indexed through its end block {:?}",
            chain.name,
            chain.end_block
        );
        return Ok(());
    }

    let mut source = RpcLogSource::new(
        client,
        chain.name.clone(),
        start_block,
        chain.end_block,
        batch_size,
        poll_interval,
    );

    if let Some(last) = engine.run(&mut source, shutdown).await? {
        tracing::info!("Chain {} committed through block {}", chain.name, last);
    }
    Ok(())
}

fn build_rpc_client(url: &str) -> anyhow::Result<RpcClient> {
    let url = url::Url::parse(url).map_err(|e| RpcError::InvalidUrl(e.to_string()))?;
    let mut config = RpcClientConfig::new(url);

    if let Some(concurrency) = env_parse::<usize>("RPC_CONCURRENCY")? {
        config = config.with_concurrency(concurrency);
    }
    if let Some(max_retries) = env_parse::<u32>("RPC_MAX_RETRIES")? {
        config = config.with_retry(RetryPolicy::new(max_retries));
    }
    if let Some(rps) = env_parse::<u32>("RPC_REQUESTS_PER_SECOND")? {
        let rps = NonZeroU32::new(rps).context("RPC_REQUESTS_PER_SECOND must be non-zero")?;
        config = config.with_rate_limit(rps);
    }

    Ok(RpcClient::new(config))
}

fn env_parse<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid {}: {:?}", name, value)),
        Err(_) => Ok(None),
    }
}

fn load_required_env_vars(config: &IndexerConfig, dry_run: bool) -> anyhow::Result<()> {
    let mut required: Vec<&str> = config
        .chains
        .iter()
        .map(|c| c.rpc_url_env_var.as_str())
        .collect();
    if !dry_run {
        required.push(config.indexer.database_url_env_var.as_str());
    }

    let missing: Vec<&&str> = required
        .iter()
        .filter(|var| env::var(var).is_err())
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    dotenvy::dotenv().with_context(|| {
        format!(
            "Missing env vars {:?} and failed to load .env file",
            missing
        )
    })?;

    let still_missing: Vec<&str> = required
        .iter()
        .filter(|var| env::var(var).is_err())
        .copied()
        .collect();

    anyhow::ensure!(
        still_missing.is_empty(),
        "Missing required env vars after loading .env: {:?}",
        still_missing
    );

    Ok(())
}
