//! Configuration types for Yume

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::market::MarketDescriptor;
use crate::types::{constants::SUI_TYPE, Network, ObjectId};
use crate::Error;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "YUME_CONFIG";

/// Fullnode connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC URL (e.g., "https://fullnode.testnet.sui.io:443")
    pub url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: Network::Testnet.default_rpc_url().to_string(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Reader refresh timings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Order book poll interval in seconds
    #[serde(default = "default_orderbook_interval_secs")]
    pub orderbook_interval_secs: u64,

    /// Lending pool poll interval in seconds
    #[serde(default = "default_pool_interval_secs")]
    pub pool_interval_secs: u64,

    /// Per-owner position poll interval in seconds
    #[serde(default = "default_account_interval_secs")]
    pub account_interval_secs: u64,

    /// Wait after a successful submission before refetching
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Dynamic field page size
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_orderbook_interval_secs() -> u64 {
    15
}

fn default_pool_interval_secs() -> u64 {
    30
}

fn default_account_interval_secs() -> u64 {
    30
}

fn default_settle_delay_ms() -> u64 {
    2_000
}

fn default_page_size() -> usize {
    50
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            orderbook_interval_secs: default_orderbook_interval_secs(),
            pool_interval_secs: default_pool_interval_secs(),
            account_interval_secs: default_account_interval_secs(),
            settle_delay_ms: default_settle_delay_ms(),
            page_size: default_page_size(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Fullnode settings
    #[serde(default)]
    pub rpc: RpcConfig,

    pub network: Network,

    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default)]
    pub polling: PollingConfig,

    /// Supported markets
    #[serde(default = "default_markets")]
    pub markets: Vec<MarketDescriptor>,
}

fn default_api_port() -> u16 {
    19_090
}

/// Built-in market list. Object ids are filled from config or env after deployment.
pub fn default_markets() -> Vec<MarketDescriptor> {
    vec![MarketDescriptor {
        id: "sui-sui-7d".to_string(),
        label: "SUI / SUI 7 Day".to_string(),
        base_type: SUI_TYPE.to_string(),
        collateral_type: SUI_TYPE.to_string(),
        base_symbol: "SUI".to_string(),
        collateral_symbol: "SUI".to_string(),
        base_decimals: 9,
        duration_bucket: 604_800,
        risk_tier: 0,
        max_ltv_bps: 9_000,
        package_id: String::new(),
        orderbook_id: ObjectId::new(""),
        vault_id: ObjectId::new(""),
        pool_id: None,
    }]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            network: Network::Testnet,
            api_port: default_api_port(),
            polling: PollingConfig::default(),
            markets: default_markets(),
        }
    }
}

impl AppConfig {
    /// Load from a JSON file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let mut config = Self::from_json(&raw)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            markets = config.markets.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Load from `YUME_CONFIG` if set, otherwise defaults plus env overrides.
    pub fn from_env() -> Result<Self, Error> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load(path),
            Err(_) => {
                let mut config = Self::default();
                config.apply_env_overrides(|key| std::env::var(key).ok());
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, Error> {
        serde_json::from_str(raw).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Apply `YUME_*` overrides using the given lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("YUME_RPC_URL").filter(|v| !v.is_empty()) {
            self.rpc.url = url;
        }
        if let Some(port) = lookup("YUME_API_PORT").and_then(|v| v.parse().ok()) {
            self.api_port = port;
        }
        if let Some(package) = lookup("YUME_PACKAGE_ID").filter(|v| !v.is_empty()) {
            for market in &mut self.markets {
                if market.package_id.is_empty() {
                    market.package_id = package.clone();
                }
            }
        }
        // Single-market deployments configure object ids directly
        if let Some(first) = self.markets.first_mut() {
            if let Some(id) = lookup("YUME_ORDERBOOK_ID").filter(|v| !v.is_empty()) {
                first.orderbook_id = ObjectId::new(id);
            }
            if let Some(id) = lookup("YUME_VAULT_ID").filter(|v| !v.is_empty()) {
                first.vault_id = ObjectId::new(id);
            }
            if let Some(id) = lookup("YUME_POOL_ID").filter(|v| !v.is_empty()) {
                first.pool_id = Some(ObjectId::new(id));
            }
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.rpc.url.trim().is_empty() {
            return Err(Error::Config("rpc.url is empty".to_string()));
        }
        if self.polling.page_size == 0 {
            return Err(Error::Config("polling.page_size must be positive".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for market in &self.markets {
            market.validate()?;
            if !seen.insert(market.id.as_str()) {
                return Err(Error::Config(format!("duplicate market id {}", market.id)));
            }
        }
        Ok(())
    }

    pub fn market(&self, id: &str) -> Option<&MarketDescriptor> {
        self.markets.iter().find(|m| m.id == id)
    }

    /// Find the market whose order book has the given id
    pub fn market_by_orderbook(&self, book_id: &str) -> Option<&MarketDescriptor> {
        self.markets
            .iter()
            .find(|m| m.orderbook_id.as_str() == book_id)
    }
}
