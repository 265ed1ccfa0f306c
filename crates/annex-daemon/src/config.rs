// crates/annex-daemon/src/config.rs
//
// Runtime configuration for the Annex flywheel daemon.
// Loaded from a TOML file or populated with devnet defaults.

use serde::Deserialize;
use std::fs;

use annex_core::{AccountId, ActivityKind, MarketId};
use annex_flywheel::{Allocation, Exp, GenesisConfig, MarketListing, EXP_SCALE};

/// Runtime configuration for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Directory for local data storage (RocksDB).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Log level: "trace", "debug", "info", "warn", "error".
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// The only account allowed to change rates, markets, and accrued balances.
    #[serde(default = "default_admin")]
    pub admin: AccountId,

    #[serde(default = "default_admin")]
    pub treasury_owner: AccountId,

    #[serde(default = "default_treasury_account")]
    pub treasury_account: AccountId,

    /// Account claims are paid out of.
    #[serde(default = "default_reward_pool")]
    pub reward_pool: AccountId,

    /// ANN (1e18 units) issued to the reward pool at genesis.
    #[serde(default = "default_reward_pool_funding", with = "annex_flywheel::serde_u128")]
    pub reward_pool_funding: u128,

    /// ANN (1e18 units) issued to the treasury at genesis.
    #[serde(default, with = "annex_flywheel::serde_u128")]
    pub treasury_funding: u128,

    /// ANN per block per eligible market, as a 1e18-scaled decimal string.
    #[serde(default = "default_emission_rate")]
    pub emission_rate: Exp,

    /// Markets eligible at genesis.
    #[serde(default = "default_markets")]
    pub markets: Vec<MarketListing>,

    /// Height the block clock starts from on a fresh data directory.
    #[serde(default)]
    pub start_block: u64,

    /// Wall-clock milliseconds per block.
    #[serde(default = "default_block_interval_ms")]
    pub block_interval_ms: u64,

    /// Capacity of the committed-receipt broadcast channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_data_dir() -> String {
    "~/.annex/data".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_admin() -> AccountId {
    AccountId::repeat_byte(0x01)
}

fn default_treasury_account() -> AccountId {
    AccountId::repeat_byte(0x7e)
}

fn default_reward_pool() -> AccountId {
    AccountId::repeat_byte(0xcc)
}

fn default_reward_pool_funding() -> u128 {
    1_000_000 * EXP_SCALE
}

fn default_emission_rate() -> Exp {
    Exp::from_mantissa(EXP_SCALE / 2)
}

fn default_markets() -> Vec<MarketListing> {
    vec![MarketListing {
        id: MarketId::vai_mint(),
        kind: ActivityKind::Mint,
    }]
}

fn default_block_interval_ms() -> u64 {
    3_000
}

fn default_event_buffer() -> usize {
    256
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            admin: default_admin(),
            treasury_owner: default_admin(),
            treasury_account: default_treasury_account(),
            reward_pool: default_reward_pool(),
            reward_pool_funding: default_reward_pool_funding(),
            treasury_funding: 0,
            emission_rate: default_emission_rate(),
            markets: default_markets(),
            start_block: 0,
            block_interval_ms: default_block_interval_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(expand_tilde(path))?;
        let config: DaemonConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Genesis state for a data directory with no snapshot.
    pub fn genesis(&self) -> GenesisConfig {
        let mut allocations = Vec::new();
        if self.reward_pool_funding > 0 {
            allocations.push(Allocation {
                account: self.reward_pool,
                amount: self.reward_pool_funding,
            });
        }
        if self.treasury_funding > 0 {
            allocations.push(Allocation {
                account: self.treasury_account,
                amount: self.treasury_funding,
            });
        }

        GenesisConfig {
            admin: self.admin,
            emission_rate: self.emission_rate,
            reward_pool: self.reward_pool,
            treasury_account: self.treasury_account,
            treasury_owner: self.treasury_owner,
            markets: self.markets.clone(),
            allocations,
            start_block: self.start_block,
        }
    }

    /// RocksDB directory under the data dir.
    pub fn db_path(&self) -> String {
        format!("{}/rocksdb", expand_tilde(&self.data_dir))
    }
}

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}
