use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node: NodeSettings,
    pub scheduler: SchedulerSettings,
    pub storage: StorageSettings,
    pub chain: ChainSettings,
    pub rewards: RewardSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub data_dir: PathBuf,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Seconds between status-check passes.
    pub tick_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// "memory" or "rocksdb".
    pub backend: String,
    /// Database directory; defaults to `<data_dir>/db` when unset.
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSettings {
    /// "mock" or "http".
    pub mode: String,
    /// Ledger gateway endpoint for http mode.
    pub endpoint: String,
    /// Metadata pinning endpoint for http mode.
    pub pin_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardSettings {
    /// Mileage granted per accepted review.
    pub review_reward: u64,
    /// Minimum mileage balance required to exchange.
    pub exchange_threshold: u64,
    /// Hex address holding badge and token supply.
    pub treasury: String,
    /// Hex address whose allowance funds token transfers.
    pub operator: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    /// "pretty", "compact", or "json".
    pub format: String,
    pub file_output: Option<PathBuf>,
    /// Extra `module=level` directives layered over the default filter.
    pub module_filters: Vec<(String, String)>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node: NodeSettings::default(),
            scheduler: SchedulerSettings::default(),
            storage: StorageSettings::default(),
            chain: ChainSettings::default(),
            rewards: RewardSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            name: "gather-node".to_string(),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self { tick_secs: 60 }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            db_path: None,
        }
    }
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            mode: "mock".to_string(),
            endpoint: "http://127.0.0.1:8845".to_string(),
            pin_endpoint: "http://127.0.0.1:8846".to_string(),
        }
    }
}

impl Default for RewardSettings {
    fn default() -> Self {
        Self {
            review_reward: 1,
            exchange_threshold: 5,
            treasury: "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee".to_string(),
            operator: "0x0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_output: None,
            module_filters: Vec::new(),
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Environment overrides sit between the config file and CLI flags.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(data_dir) = env::var("GATHER_DATA_DIR") {
            self.node.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(name) = env::var("GATHER_NODE_NAME") {
            if !name.is_empty() {
                self.node.name = name;
            }
        }
        if let Ok(tick) = env::var("GATHER_TICK_SECS") {
            if let Ok(secs) = tick.parse() {
                self.scheduler.tick_secs = secs;
            }
        }
        if let Ok(backend) = env::var("GATHER_STORAGE_BACKEND") {
            self.storage.backend = backend;
        }
        if let Ok(mode) = env::var("GATHER_CHAIN_MODE") {
            self.chain.mode = mode;
        }
        if let Ok(endpoint) = env::var("GATHER_CHAIN_ENDPOINT") {
            self.chain.endpoint = endpoint;
        }
        if let Ok(treasury) = env::var("GATHER_TREASURY") {
            self.rewards.treasury = treasury;
        }
        if let Ok(operator) = env::var("GATHER_OPERATOR") {
            self.rewards.operator = operator;
        }
        if let Ok(level) = env::var("GATHER_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Database directory, defaulting to a subdirectory of the data dir.
    pub fn db_path(&self) -> PathBuf {
        self.storage
            .db_path
            .clone()
            .unwrap_or_else(|| self.node.data_dir.join("db"))
    }
}
