//! Configuration management for Cerberus Monitor
//!
//! Loads configuration from YAML files and environment variables.
//! Environment variables override YAML values.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Account-oriented chain (push subscription + lookup RPC)
    #[serde(default)]
    pub account_chain: AccountChainConfig,
    /// Perpetuals venue feed
    #[serde(default)]
    pub perp_venue: PerpVenueConfig,
    /// UTXO chain (polled)
    #[serde(default)]
    pub utxo_chain: UtxoChainConfig,
    /// Reconnect/backoff policy for push sources
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Duplicate-alert suppression
    #[serde(default)]
    pub dedup: DedupConfig,
    /// Notification configuration
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

/// Account-chain configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AccountChainConfig {
    /// Push subscription endpoint
    #[serde(default = "default_account_ws_url")]
    pub ws_url: String,
    /// JSON-RPC endpoint for transaction lookups
    #[serde(default = "default_account_rpc_url")]
    pub rpc_url: String,
    /// Block explorer base URL for alert links
    #[serde(default = "default_account_explorer_url")]
    pub explorer_url: String,
    /// Spot alert threshold in native units
    #[serde(default = "default_account_spot_threshold")]
    pub spot_threshold_native: f64,
    /// Contract/position alert threshold in USD
    #[serde(default = "default_account_contract_threshold")]
    pub contract_threshold_usd: f64,
    /// Static reference price used to estimate USD notional for contract
    /// classification (no live quote is fetched)
    #[serde(default = "default_account_reference_price")]
    pub reference_price_usd: f64,
    /// Known DeFi protocol addresses whose interactions count as
    /// position activity
    #[serde(default = "default_defi_programs")]
    pub defi_programs: Vec<DefiProgramConfig>,
}

impl Default for AccountChainConfig {
    fn default() -> Self {
        Self {
            ws_url: default_account_ws_url(),
            rpc_url: default_account_rpc_url(),
            explorer_url: default_account_explorer_url(),
            spot_threshold_native: default_account_spot_threshold(),
            contract_threshold_usd: default_account_contract_threshold(),
            reference_price_usd: default_account_reference_price(),
            defi_programs: default_defi_programs(),
        }
    }
}

/// One monitored protocol address
#[derive(Debug, Clone, Deserialize)]
pub struct DefiProgramConfig {
    pub address: String,
    pub label: String,
}

fn default_account_ws_url() -> String {
    "wss://ethereum-rpc.publicnode.com".to_string()
}

fn default_account_rpc_url() -> String {
    "https://ethereum-rpc.publicnode.com".to_string()
}

fn default_account_explorer_url() -> String {
    "https://etherscan.io".to_string()
}

fn default_account_spot_threshold() -> f64 {
    50.0
}

fn default_account_contract_threshold() -> f64 {
    100_000.0
}

fn default_account_reference_price() -> f64 {
    2_500.0
}

fn default_defi_programs() -> Vec<DefiProgramConfig> {
    vec![
        DefiProgramConfig {
            address: "0x87870bca3f3fd6335c3f4ce8392d69350b4fa4e2".to_string(),
            label: "Aave V3".to_string(),
        },
        DefiProgramConfig {
            address: "0xba12222222228d8ba445958a75a0704d566bf2c8".to_string(),
            label: "Balancer Vault".to_string(),
        },
        DefiProgramConfig {
            address: "0xb87a436b93ffe9d75c5cfa7bacfff96430b09868".to_string(),
            label: "GMX Router".to_string(),
        },
    ]
}

/// Perpetuals venue configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PerpVenueConfig {
    /// Feed endpoint
    #[serde(default = "default_perp_ws_url")]
    pub ws_url: String,
    /// Explorer/venue URL for alert links
    #[serde(default = "default_perp_explorer_url")]
    pub explorer_url: String,
    /// Instruments to subscribe to
    #[serde(default = "default_perp_symbols")]
    pub symbols: Vec<String>,
    /// Spot trade alert threshold in USD
    #[serde(default = "default_perp_spot_threshold")]
    pub spot_threshold_usd: f64,
    /// Fill/liquidation alert threshold in USD
    #[serde(default = "default_perp_contract_threshold")]
    pub contract_threshold_usd: f64,
}

impl Default for PerpVenueConfig {
    fn default() -> Self {
        Self {
            ws_url: default_perp_ws_url(),
            explorer_url: default_perp_explorer_url(),
            symbols: default_perp_symbols(),
            spot_threshold_usd: default_perp_spot_threshold(),
            contract_threshold_usd: default_perp_contract_threshold(),
        }
    }
}

fn default_perp_ws_url() -> String {
    "wss://api.hyperliquid.xyz/ws".to_string()
}

fn default_perp_explorer_url() -> String {
    "https://app.hyperliquid.xyz/explorer".to_string()
}

fn default_perp_symbols() -> Vec<String> {
    vec!["BTC".to_string(), "ETH".to_string(), "SOL".to_string()]
}

fn default_perp_spot_threshold() -> f64 {
    500_000.0
}

fn default_perp_contract_threshold() -> f64 {
    1_000_000.0
}

/// UTXO chain configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UtxoChainConfig {
    /// Esplora-style REST API base URL
    #[serde(default = "default_utxo_api_url")]
    pub api_url: String,
    /// Block explorer base URL for alert links
    #[serde(default = "default_utxo_explorer_url")]
    pub explorer_url: String,
    /// Seconds between poll cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Spot alert threshold in native units
    #[serde(default = "default_utxo_spot_threshold")]
    pub spot_threshold_native: f64,
}

impl Default for UtxoChainConfig {
    fn default() -> Self {
        Self {
            api_url: default_utxo_api_url(),
            explorer_url: default_utxo_explorer_url(),
            poll_interval_secs: default_poll_interval(),
            spot_threshold_native: default_utxo_spot_threshold(),
        }
    }
}

fn default_utxo_api_url() -> String {
    "https://blockstream.info/api".to_string()
}

fn default_utxo_explorer_url() -> String {
    "https://mempool.space".to_string()
}

fn default_poll_interval() -> u64 {
    30
}

fn default_utxo_spot_threshold() -> f64 {
    10.0
}

/// Reconnect/backoff policy
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    /// Base delay before the first retry (seconds)
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: u64,
    /// Cap on the computed backoff delay (seconds)
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,
    /// Consecutive failures tolerated before the source is reported
    /// stopped
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: default_base_delay(),
            max_delay_secs: default_max_delay(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_base_delay() -> u64 {
    10
}

fn default_max_delay() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    5
}

/// Duplicate-alert suppression configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    /// Maximum number of remembered `(source, id)` keys
    #[serde(default = "default_dedup_capacity")]
    pub capacity: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            capacity: default_dedup_capacity(),
        }
    }
}

fn default_dedup_capacity() -> usize {
    1000
}

/// Notification configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
}

/// Telegram notifier configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather (loaded from env)
    #[serde(default)]
    pub bot_token: String,
    /// Chat ID alerts are delivered to
    #[serde(default)]
    pub chat_id: String,
    /// Whether notifications are enabled
    #[serde(default)]
    pub enabled: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            enabled: false,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from `config/monitor.yaml` (optional) with
    /// `CERBERUS_*` environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/monitor").required(false))
            .add_source(Environment::with_prefix("CERBERUS").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.account_chain.spot_threshold_native <= 0.0
            || self.utxo_chain.spot_threshold_native <= 0.0
            || self.perp_venue.spot_threshold_usd <= 0.0
        {
            return Err("Spot thresholds must be positive".to_string());
        }

        if self.account_chain.contract_threshold_usd <= 0.0
            || self.perp_venue.contract_threshold_usd <= 0.0
        {
            return Err("Contract thresholds must be positive".to_string());
        }

        if self.account_chain.reference_price_usd <= 0.0 {
            return Err("Reference price must be positive".to_string());
        }

        if self.dedup.capacity == 0 {
            return Err("Dedup capacity must be > 0".to_string());
        }

        if self.reconnect.max_attempts == 0 {
            return Err("At least one reconnect attempt is required".to_string());
        }

        if self.utxo_chain.poll_interval_secs == 0 {
            return Err("Poll interval must be >= 1 second".to_string());
        }

        if self.notifications.telegram.enabled
            && (self.notifications.telegram.bot_token.is_empty()
                || self.notifications.telegram.chat_id.is_empty())
        {
            return Err("Telegram is enabled but bot_token/chat_id are missing".to_string());
        }

        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            account_chain: AccountChainConfig::default(),
            perp_venue: PerpVenueConfig::default(),
            utxo_chain: UtxoChainConfig::default(),
            reconnect: ReconnectConfig::default(),
            dedup: DedupConfig::default(),
            notifications: NotificationsConfig::default(),
        }
    }
}
