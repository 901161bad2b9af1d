//! Daemon configuration.
//!
//! Loaded from the TOML file named by `FTSO_CONFIG`, else `./ftso.toml`,
//! else built-in defaults. Every field has a default, so partial files are
//! fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ftso_types::{EpochSettings, VotingRoundId};
use serde::{Deserialize, Serialize};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "FTSO_CONFIG";

/// Config file used when [`CONFIG_ENV`] is unset.
pub const DEFAULT_CONFIG_FILE: &str = "ftso.toml";

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Voting round timing.
    #[serde(default)]
    pub epoch: EpochConfig,
    /// Protocol constants.
    #[serde(default)]
    pub protocol: ProtocolConfig,
    /// Ledger index access.
    #[serde(default)]
    pub indexer: IndexerConfig,
    /// Local voter identity.
    #[serde(default)]
    pub voter: VoterConfig,
    /// Price source.
    #[serde(default)]
    pub feeds: FeedsConfig,
    /// Local simulated network.
    #[serde(default)]
    pub devnet: DevnetConfig,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Voting round and reward epoch timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochConfig {
    /// Start of voting round 0. 0 = let the devnet pick a recent time.
    #[serde(default)]
    pub first_voting_round_start_ts: u64,
    #[serde(default = "default_voting_epoch_duration")]
    pub voting_epoch_duration_secs: u64,
    #[serde(default = "default_reveal_deadline")]
    pub reveal_deadline_secs: u64,
    #[serde(default = "default_reward_epoch_duration")]
    pub reward_epoch_duration_in_voting_epochs: u32,
    #[serde(default)]
    pub first_reward_epoch_start_voting_round_id: VotingRoundId,
}

/// Protocol constants shared by all voters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Protocol id mixed into the finalizer selection seed.
    #[serde(default = "default_protocol_id")]
    pub protocol_id: u8,
    /// Signing threshold of devnet policies, in BIPS of total signing weight.
    #[serde(default = "default_signing_threshold_bips")]
    pub signing_threshold_bips: u64,
    /// How long a round waits for finalization before it is abandoned.
    #[serde(default = "default_finalization_timeout")]
    pub finalization_timeout_secs: u64,
    /// Delay before a non-selected voter finalizes by itself.
    #[serde(default = "default_finalization_grace")]
    pub finalization_grace_secs: u64,
    #[serde(default = "default_finalization_poll_ms")]
    pub finalization_poll_ms: u64,
    /// Number of previous rounds whose reveal offenders are benched.
    #[serde(default = "default_benching_window")]
    pub benching_window: u32,
    /// Rounds kept in the reveal and result caches.
    #[serde(default = "default_cache_retention")]
    pub cache_retention: usize,
}

/// Which ledger index backs the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexerMode {
    /// In-process simulated ledger (devnet).
    Memory,
    /// Externally populated SQLite index, read-only.
    Sqlite,
}

/// Ledger index configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    #[serde(default = "default_indexer_mode")]
    pub mode: IndexerMode,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    /// Grace period for the reveal-window range check.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Local voter identity (SQLite mode).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoterConfig {
    /// Signing key as hex. Empty = generate a throwaway key.
    #[serde(default)]
    pub private_key: String,
    /// Submit address as hex. Empty = the signing address.
    #[serde(default)]
    pub submit_address: String,
}

/// Price provider variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Always reports the configured base price.
    Fixed,
    /// Base price with bounded uniform noise.
    Random,
}

/// One configured feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Feed name, e.g. `BTC/USD`.
    pub name: String,
    #[serde(default = "default_decimals")]
    pub decimals: i8,
    pub base_price: f64,
}

/// Price source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    #[serde(default = "default_provider_kind")]
    pub provider: ProviderKind,
    /// Noise of the random provider, in BIPS of the base price.
    #[serde(default = "default_spread_bips")]
    pub spread_bips: u64,
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedConfig>,
}

/// Local simulated network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevnetConfig {
    #[serde(default = "default_devnet_voters")]
    pub voters: usize,
    /// Seed for devnet keys and policy seeds.
    #[serde(default = "default_devnet_seed")]
    pub seed: u64,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions

fn default_voting_epoch_duration() -> u64 {
    90
}

fn default_reveal_deadline() -> u64 {
    45
}

fn default_reward_epoch_duration() -> u32 {
    3360
}

fn default_protocol_id() -> u8 {
    100
}

fn default_signing_threshold_bips() -> u64 {
    5000
}

fn default_finalization_timeout() -> u64 {
    30
}

fn default_finalization_grace() -> u64 {
    10
}

fn default_finalization_poll_ms() -> u64 {
    1000
}

fn default_benching_window() -> u32 {
    20
}

fn default_cache_retention() -> usize {
    64
}

fn default_indexer_mode() -> IndexerMode {
    IndexerMode::Memory
}

fn default_sqlite_path() -> String {
    "ftso-index.db".to_string()
}

fn default_read_timeout() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_decimals() -> i8 {
    5
}

fn default_provider_kind() -> ProviderKind {
    ProviderKind::Fixed
}

fn default_spread_bips() -> u64 {
    50
}

fn default_feeds() -> Vec<FeedConfig> {
    [("BTC/USD", 2, 64_000.0), ("ETH/USD", 3, 3_100.0), ("FLR/USD", 7, 0.025)]
        .into_iter()
        .map(|(name, decimals, base_price)| FeedConfig {
            name: name.to_string(),
            decimals,
            base_price,
        })
        .collect()
}

fn default_devnet_voters() -> usize {
    10
}

fn default_devnet_seed() -> u64 {
    42
}

fn default_heartbeat_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self {
            first_voting_round_start_ts: 0,
            voting_epoch_duration_secs: default_voting_epoch_duration(),
            reveal_deadline_secs: default_reveal_deadline(),
            reward_epoch_duration_in_voting_epochs: default_reward_epoch_duration(),
            first_reward_epoch_start_voting_round_id: 0,
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            protocol_id: default_protocol_id(),
            signing_threshold_bips: default_signing_threshold_bips(),
            finalization_timeout_secs: default_finalization_timeout(),
            finalization_grace_secs: default_finalization_grace(),
            finalization_poll_ms: default_finalization_poll_ms(),
            benching_window: default_benching_window(),
            cache_retention: default_cache_retention(),
        }
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            mode: default_indexer_mode(),
            sqlite_path: default_sqlite_path(),
            read_timeout_secs: default_read_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            provider: default_provider_kind(),
            spread_bips: default_spread_bips(),
            feeds: default_feeds(),
        }
    }
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            voters: default_devnet_voters(),
            seed: default_devnet_seed(),
            heartbeat_ms: default_heartbeat_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl EpochConfig {
    /// Epoch settings with round 0 starting at `first_voting_round_start_ts`.
    pub fn settings_starting_at(&self, first_voting_round_start_ts: u64) -> EpochSettings {
        EpochSettings {
            first_voting_round_start_ts,
            voting_epoch_duration_secs: self.voting_epoch_duration_secs,
            first_reward_epoch_start_voting_round_id: self.first_reward_epoch_start_voting_round_id,
            reward_epoch_duration_in_voting_epochs: self.reward_epoch_duration_in_voting_epochs,
            reveal_deadline_secs: self.reveal_deadline_secs,
        }
    }

    /// Epoch settings as configured.
    pub fn settings(&self) -> EpochSettings {
        self.settings_starting_at(self.first_voting_round_start_ts)
    }
}

impl ProtocolConfig {
    pub fn finalization_timeout(&self) -> Duration {
        Duration::from_secs(self.finalization_timeout_secs)
    }

    pub fn finalization_grace(&self) -> Duration {
        Duration::from_secs(self.finalization_grace_secs)
    }

    pub fn finalization_poll(&self) -> Duration {
        Duration::from_millis(self.finalization_poll_ms)
    }
}

impl IndexerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl DaemonConfig {
    /// Load configuration from `FTSO_CONFIG`, `./ftso.toml` or defaults.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load and validate a specific config file.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DaemonConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the scheduler cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.epoch.settings_starting_at(0).validate()?;
        if self.protocol.finalization_grace_secs >= self.protocol.finalization_timeout_secs {
            anyhow::bail!(
                "finalization grace {}s must be shorter than the timeout {}s",
                self.protocol.finalization_grace_secs,
                self.protocol.finalization_timeout_secs
            );
        }
        if self.protocol.signing_threshold_bips > ftso_types::TOTAL_BIPS {
            anyhow::bail!(
                "signing threshold {} bips exceeds 10000",
                self.protocol.signing_threshold_bips
            );
        }
        if self.protocol.cache_retention == 0 {
            anyhow::bail!("cache retention must be positive");
        }
        if self.feeds.feeds.is_empty() {
            anyhow::bail!("at least one feed must be configured");
        }
        Ok(())
    }

    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }
}
