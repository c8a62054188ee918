//! Bot configuration, read from a TOML file.
//!
//! ```toml
//! node_uri = "https://api.avax.network/ext/bc/C/rpc"
//! reinforce_delay_secs = 5
//!
//! [gas]
//! max_priority_fee_gwei = 2
//!
//! [[users]]
//! address = "0x..."
//! private_key_env = "USER_1_PRIVATE_KEY"
//! reinforcement_max_price_tus = 25
//!
//! [[users.teams]]
//! id = 3286
//! reinforce_strategy = "Cheapest"
//! ```
//!
//! Raw values are validated and resolved once into [`User`] and
//! [`GatewaySettings`]; nothing downstream re-parses strings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;

use crate::contracts::{AVALANCHE_CHAIN_ID, IDLE_GAME_ADDRESS};
use crate::error::BotError;
use crate::game_api::DEFAULT_API_BASE_URL;
use crate::gateway::GatewaySettings;
use crate::reinforce::DEFAULT_REINFORCE_DELAY;
use crate::strategy::ReinforceStrategy;
use crate::types::tus_to_wei;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "CRABADA_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "crabada.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub node_uri: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub gas: GasConfig,
    /// Pause between consecutive reinforcements in one run.
    #[serde(default = "default_reinforce_delay_secs")]
    pub reinforce_delay_secs: u64,
    #[serde(default = "default_two")]
    pub simulation_delay_secs: u64,
    #[serde(default = "default_two")]
    pub receipt_poll_interval_secs: u64,
    #[serde(default = "default_receipt_poll_attempts")]
    pub receipt_poll_attempts: u32,
    #[serde(default = "default_two")]
    pub watcher_poll_interval_secs: u64,
    #[serde(default)]
    pub notifier: NotifierConfig,
    /// Holds the `.no_mine_<address>` sentinel files.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GasConfig {
    #[serde(default)]
    pub max_priority_fee_gwei: Option<Decimal>,
    #[serde(default)]
    pub max_fee_gwei: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub address: String,
    /// Name of the environment variable holding this user's private key.
    pub private_key_env: String,
    pub reinforcement_max_price_tus: Decimal,
    #[serde(default)]
    pub reinforce_strategy: Option<String>,
    #[serde(default)]
    pub teams: Vec<TeamConfig>,
}

/// Per-team overrides of the user's defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamConfig {
    pub id: u64,
    #[serde(default)]
    pub reinforce_strategy: Option<String>,
    #[serde(default)]
    pub reinforcement_max_price_tus: Option<Decimal>,
}

/// Resolved reinforcement settings for one team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamSettings {
    pub strategy: ReinforceStrategy,
    /// Borrow price ceiling in the smallest TUS unit.
    pub max_price: U256,
}

/// A user with settings resolved for every configured team.
#[derive(Debug, Clone)]
pub struct User {
    pub address: Address,
    pub default_settings: TeamSettings,
    pub teams: HashMap<u64, TeamSettings>,
}

impl User {
    pub fn new(address: Address, default_settings: TeamSettings) -> Self {
        Self {
            address,
            default_settings,
            teams: HashMap::new(),
        }
    }

    pub fn with_team(mut self, team_id: u64, settings: TeamSettings) -> Self {
        self.teams.insert(team_id, settings);
        self
    }

    /// Settings for `team_id`, falling back to the user's defaults.
    pub fn team_settings(&self, team_id: u64) -> &TeamSettings {
        self.teams.get(&team_id).unwrap_or(&self.default_settings)
    }
}

fn default_chain_id() -> u64 {
    AVALANCHE_CHAIN_ID
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_reinforce_delay_secs() -> u64 {
    DEFAULT_REINFORCE_DELAY.as_secs()
}

fn default_two() -> u64 {
    2
}

fn default_receipt_poll_attempts() -> u32 {
    60
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("storage")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl BotConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, BotError> {
        let config: BotConfig = toml::from_str(content)
            .map_err(|e| BotError::ConfigError(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, BotError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BotError::ConfigError(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), BotError> {
        if self.node_uri.trim().is_empty() {
            return Err(BotError::ConfigError("node_uri cannot be empty".into()));
        }
        if self.receipt_poll_attempts == 0 {
            return Err(BotError::ConfigError(
                "receipt_poll_attempts must be at least 1".into(),
            ));
        }
        self.contract_address()?;
        self.gateway_settings()?;
        for user in &self.users {
            user.resolve()?;
        }
        Ok(())
    }

    pub fn contract_address(&self) -> Result<Address, BotError> {
        match &self.contract_address {
            Some(raw) => parse_address(raw),
            None => Ok(IDLE_GAME_ADDRESS),
        }
    }

    pub fn find_user(&self, address: Address) -> Result<&UserConfig, BotError> {
        self.users
            .iter()
            .find(|u| parse_address(&u.address).is_ok_and(|a| a == address))
            .ok_or_else(|| BotError::ConfigError(format!("User {address} is not configured")))
    }

    pub fn gateway_settings(&self) -> Result<GatewaySettings, BotError> {
        Ok(GatewaySettings {
            simulation_delay: Duration::from_secs(self.simulation_delay_secs),
            receipt_poll_interval: Duration::from_secs(self.receipt_poll_interval_secs),
            receipt_poll_attempts: self.receipt_poll_attempts,
            max_priority_fee_per_gas: self
                .gas
                .max_priority_fee_gwei
                .map(gwei_to_wei)
                .transpose()?,
            max_fee_per_gas: self.gas.max_fee_gwei.map(gwei_to_wei).transpose()?,
        })
    }

    pub fn reinforce_delay(&self) -> Duration {
        Duration::from_secs(self.reinforce_delay_secs)
    }

    pub fn watcher_poll_interval(&self) -> Duration {
        Duration::from_secs(self.watcher_poll_interval_secs)
    }

    /// `<state_dir>/.no_mine_<address>`; its presence disables mining for the user.
    pub fn no_mine_sentinel(&self, user: Address) -> PathBuf {
        self.state_dir
            .join(format!(".no_mine_{}", user.to_string().to_lowercase()))
    }

    pub fn mining_disabled(&self, user: Address) -> bool {
        self.no_mine_sentinel(user).exists()
    }
}

impl UserConfig {
    pub fn address(&self) -> Result<Address, BotError> {
        parse_address(&self.address)
    }

    pub fn resolve(&self) -> Result<User, BotError> {
        let default_settings = TeamSettings {
            strategy: parse_strategy(self.reinforce_strategy.as_deref())?,
            max_price: tus_to_wei(self.reinforcement_max_price_tus)?,
        };

        let mut user = User::new(self.address()?, default_settings.clone());
        for team in &self.teams {
            let settings = TeamSettings {
                strategy: match team.reinforce_strategy.as_deref() {
                    Some(name) => name.parse()?,
                    None => default_settings.strategy,
                },
                max_price: match team.reinforcement_max_price_tus {
                    Some(tus) => tus_to_wei(tus)?,
                    None => default_settings.max_price,
                },
            };
            user = user.with_team(team.id, settings);
        }
        Ok(user)
    }

    pub fn private_key(&self) -> Result<String, BotError> {
        std::env::var(&self.private_key_env).map_err(|_| {
            BotError::ConfigError(format!(
                "Private key variable {} is not set",
                self.private_key_env
            ))
        })
    }
}

fn parse_address(raw: &str) -> Result<Address, BotError> {
    raw.trim()
        .parse()
        .map_err(|e| BotError::ConfigError(format!("Invalid address {raw}: {e}")))
}

fn parse_strategy(name: Option<&str>) -> Result<ReinforceStrategy, BotError> {
    name.map_or(Ok(ReinforceStrategy::default()), str::parse)
}

fn gwei_to_wei(gwei: Decimal) -> Result<u128, BotError> {
    gwei.checked_mul(Decimal::from(1_000_000_000u64))
        .and_then(|wei| wei.trunc().to_u128())
        .ok_or_else(|| BotError::ConfigError(format!("Invalid gas price: {gwei} gwei")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
node_uri = "https://api.avax.network/ext/bc/C/rpc"
reinforce_delay_secs = 5

[gas]
max_priority_fee_gwei = 1.5
max_fee_gwei = 100

[notifier]
webhook_url = "https://hooks.example.com/T000"

[[users]]
address = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"
private_key_env = "CRABADA_TEST_KEY_UNSET"
reinforcement_max_price_tus = 25

[[users.teams]]
id = 3286
reinforce_strategy = "cheapest"

[[users.teams]]
id = 3287
reinforcement_max_price_tus = "30.5"
"#;

    #[test]
    fn test_defaults_and_gas() {
        let config = BotConfig::from_toml_str(CONFIG).unwrap();
        assert_eq!(config.chain_id, AVALANCHE_CHAIN_ID);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.contract_address().unwrap(), IDLE_GAME_ADDRESS);
        assert_eq!(config.reinforce_delay(), Duration::from_secs(5));

        let gateway = config.gateway_settings().unwrap();
        assert_eq!(gateway.max_priority_fee_per_gas, Some(1_500_000_000));
        assert_eq!(gateway.max_fee_per_gas, Some(100_000_000_000));
        assert_eq!(gateway.receipt_poll_attempts, 60);
        assert_eq!(gateway.simulation_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_minimal_config_keeps_pacing() {
        let config = BotConfig::from_toml_str(r#"node_uri = "http://localhost:9650""#).unwrap();
        assert_eq!(config.reinforce_delay(), DEFAULT_REINFORCE_DELAY);
        assert!(config.reinforce_delay() > Duration::ZERO);
        assert!(config.users.is_empty());
    }

    #[test]
    fn test_resolve_team_overrides() {
        let config = BotConfig::from_toml_str(CONFIG).unwrap();
        let user = config.users[0].resolve().unwrap();

        assert_eq!(
            user.default_settings.max_price,
            U256::from(25_000_000_000_000_000_000u128)
        );
        assert_eq!(user.team_settings(3286).strategy, ReinforceStrategy::Cheapest);
        assert_eq!(user.team_settings(3286).max_price, user.default_settings.max_price);
        assert_eq!(
            user.team_settings(3287).max_price,
            U256::from(30_500_000_000_000_000_000u128)
        );
        assert_eq!(
            user.team_settings(9999).strategy,
            ReinforceStrategy::HighestMinePoint
        );
    }

    #[test]
    fn test_find_user_case_insensitive() {
        let config = BotConfig::from_toml_str(CONFIG).unwrap();
        let address: Address = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8".parse().unwrap();
        assert!(config.find_user(address).is_ok());
        assert!(config.find_user(Address::ZERO).is_err());
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let bad = CONFIG.replace("\"cheapest\"", "\"moonshot\"");
        assert!(matches!(
            BotConfig::from_toml_str(&bad),
            Err(BotError::ConfigError(_))
        ));
    }

    #[test]
    fn test_missing_private_key_env() {
        let config = BotConfig::from_toml_str(CONFIG).unwrap();
        assert!(config.users[0].private_key().is_err());
    }

    #[test]
    fn test_sentinel_path() {
        let config = BotConfig::from_toml_str(CONFIG).unwrap();
        let user = config.users[0].address().unwrap();
        assert_eq!(
            config.no_mine_sentinel(user),
            PathBuf::from("storage/.no_mine_0x70997970c51812dc3a010c7d01b50e0d17dc79c8")
        );
    }

    #[test]
    fn test_mining_disabled_by_sentinel_file() {
        let state_dir = std::env::temp_dir().join(format!("crabada-state-{}", std::process::id()));
        std::fs::create_dir_all(&state_dir).unwrap();
        let mut config = BotConfig::from_toml_str(CONFIG).unwrap();
        config.state_dir = state_dir.clone();
        let user = config.users[0].address().unwrap();

        assert!(!config.mining_disabled(user));
        std::fs::write(config.no_mine_sentinel(user), b"").unwrap();
        assert!(config.mining_disabled(user));
        assert!(!config.mining_disabled(Address::ZERO));

        std::fs::remove_dir_all(&state_dir).unwrap();
    }
}
