use crate::config::NodeConfig;
use anyhow::{Context, Result};
use gather_chain::{ChainClient, MemoryPinStore, MetadataStore, MockChain};
use gather_lifecycle::{CheckInManager, Clock, EventRegistry, EventScheduler, SystemClock};
use gather_rewards::{BadgeIssuer, MileageManager, RewardPolicy};
use gather_storage::{Backend, MemoryBackend, StoreStats};
use gather_types::{Address, Points};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[cfg(feature = "http-chain")]
use gather_chain::{HttpChain, HttpChainConfig, HttpPinStore};

/// Balance seeded into the treasury when running against the mock
/// ledger, so exchanges have something to pay out from.
const MOCK_TREASURY_SEED: u64 = 1_000_000;

/// Everything a running node holds: one store, one ledger client, and
/// the services wired over them.
pub struct GatherNode {
    config: NodeConfig,
    store: Arc<dyn Backend>,
    pub registry: Arc<EventRegistry>,
    pub scheduler: Arc<EventScheduler>,
    pub check_in: Arc<CheckInManager>,
    pub badges: Arc<BadgeIssuer>,
    pub mileage: Arc<MileageManager>,
}

impl std::fmt::Debug for GatherNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatherNode")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct NodeStats {
    pub events_by_status: BTreeMap<&'static str, usize>,
    pub store: StoreStats,
}

impl GatherNode {
    pub async fn new(config: NodeConfig) -> Result<Self> {
        info!("Initializing gather node...");

        let treasury = Address::from_hex(&config.rewards.treasury)
            .context("invalid rewards.treasury address")?;
        let operator = Address::from_hex(&config.rewards.operator)
            .context("invalid rewards.operator address")?;

        let store = build_store(&config)?;
        let (chain, metadata) = build_chain(&config, treasury, operator).await?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let registry =
            Arc::new(EventRegistry::new(Arc::clone(&store), Arc::clone(&clock)).await?);
        let scheduler = Arc::new(EventScheduler::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            Duration::from_secs(config.scheduler.tick_secs),
        ));
        let check_in = Arc::new(CheckInManager::new(Arc::clone(&store), Arc::clone(&clock)));
        let badges = Arc::new(BadgeIssuer::new(
            Arc::clone(&store),
            Arc::clone(&chain),
            metadata,
            treasury,
        ));
        let policy = RewardPolicy {
            review_reward: Points::new(config.rewards.review_reward),
            exchange_threshold: Points::new(config.rewards.exchange_threshold),
            treasury,
            operator,
        };
        let mileage = Arc::new(MileageManager::new(Arc::clone(&store), chain, policy));

        Ok(Self {
            config,
            store,
            registry,
            scheduler,
            check_in,
            badges,
            mileage,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.node.name
    }

    pub fn store(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.store)
    }

    /// Flushes the store; called on the way down so a crash right after
    /// shutdown loses nothing.
    pub async fn shutdown(&self) -> Result<()> {
        self.store.flush().await?;
        info!("Store flushed");
        Ok(())
    }

    pub async fn stats(&self) -> Result<NodeStats> {
        let mut events_by_status = BTreeMap::new();
        for event in self.store.list_events().await? {
            *events_by_status.entry(event.status.as_str()).or_insert(0) += 1;
        }
        Ok(NodeStats {
            events_by_status,
            store: self.store.stats().await?,
        })
    }
}

fn build_store(config: &NodeConfig) -> Result<Arc<dyn Backend>> {
    let store: Arc<dyn Backend> = match config.storage.backend.as_str() {
        "rocksdb" => {
            #[cfg(feature = "rocksdb")]
            {
                let path = config.db_path();
                info!(path = ?path, "Opening RocksDB store");
                Arc::new(gather_storage::RocksBackend::new(&path)?)
            }
            #[cfg(not(feature = "rocksdb"))]
            {
                warn!("RocksDB backend requested but feature not enabled, falling back to memory");
                Arc::new(MemoryBackend::new())
            }
        }
        "memory" => Arc::new(MemoryBackend::new()),
        other => {
            warn!(backend = %other, "Unknown storage backend, falling back to memory");
            Arc::new(MemoryBackend::new())
        }
    };
    Ok(store)
}

async fn build_chain(
    config: &NodeConfig,
    treasury: Address,
    operator: Address,
) -> Result<(Arc<dyn ChainClient>, Arc<dyn MetadataStore>)> {
    match config.chain.mode.as_str() {
        "http" => {
            #[cfg(feature = "http-chain")]
            {
                let chain_config = HttpChainConfig {
                    endpoint: config.chain.endpoint.clone(),
                    pin_endpoint: config.chain.pin_endpoint.clone(),
                    ..HttpChainConfig::default()
                };
                info!(endpoint = %chain_config.endpoint, "Connecting to ledger gateway");
                let chain = HttpChain::new(chain_config)?;
                let pins = HttpPinStore::new(
                    config.chain.pin_endpoint.clone(),
                    Duration::from_secs(10),
                )?;
                Ok((Arc::new(chain), Arc::new(pins)))
            }
            #[cfg(not(feature = "http-chain"))]
            {
                // No silent fallback here: a mock ledger in place of a
                // real one would fake mints and payouts.
                anyhow::bail!("chain mode 'http' requires the http-chain feature")
            }
        }
        "mock" => {
            let chain = MockChain::new().with_operator(operator);
            chain.fund(treasury, Points::new(MOCK_TREASURY_SEED)).await;
            info!(
                treasury = %treasury,
                seed = MOCK_TREASURY_SEED,
                "🔗 Mock ledger ready"
            );
            Ok((Arc::new(chain), Arc::new(MemoryPinStore::new())))
        }
        other => anyhow::bail!("unknown chain mode '{}'", other),
    }
}
