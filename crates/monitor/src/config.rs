//! Monitor configuration loaded from the environment.

use alloy_primitives::Address;
use clmm_yield_domain::entities::Token;
use clmm_yield_protocols::pancake::{BASE_USDC, BatchConfig, Deployment};
use clmm_yield_protocols::prices::DEFILLAMA_COINS_URL;
use clmm_yield_protocols::subgraph::{BASE_MASTERCHEF_SUBGRAPH_ID, SubgraphClient};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Invalid or missing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("RPC endpoint serves chain {actual}, expected {expected}")]
    ChainMismatch { expected: u64, actual: u64 },
}

/// Runtime configuration of the monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub rpc_url: String,
    /// Wallet reported when a request names none.
    pub owner_address: Option<String>,
    /// Chain the RPC endpoint must serve.
    pub chain_id: u64,
    /// Chain key of the price API, e.g. `base`.
    pub price_chain: String,
    pub deployment: Deployment,
    pub reward_symbol: String,
    pub reward_decimals: u8,
    /// Tokens pinned at one dollar and preferred as the quote side.
    pub stablecoins: Vec<String>,
    /// Explicit subgraph endpoint; the gateway URL is used when only a key is set.
    pub subgraph_url: Option<String>,
    pub thegraph_api_key: Option<String>,
    pub price_api_url: String,
    pub database_url: String,
    pub bind_address: String,
    pub scan: BatchConfig,
    pub staked_lookback_blocks: u64,
    pub http_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            rpc_url: String::new(),
            owner_address: None,
            chain_id: 8453,
            price_chain: "base".to_string(),
            deployment: Deployment::base(),
            reward_symbol: "CAKE".to_string(),
            reward_decimals: 18,
            stablecoins: vec![BASE_USDC.to_string()],
            subgraph_url: None,
            thegraph_api_key: None,
            price_api_url: DEFILLAMA_COINS_URL.to_string(),
            database_url: "sqlite://positions.db".to_string(),
            bind_address: "0.0.0.0:3000".to_string(),
            scan: BatchConfig::default(),
            staked_lookback_blocks: 100_000,
            http_timeout: Duration::from_secs(30),
        }
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

impl MonitorConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    /// Returns an error if `RPC_URL` is missing or any value fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`. Empty values count as unset.
    ///
    /// # Errors
    /// Returns an error if `RPC_URL` is missing or any value fails to parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self {
            rpc_url: get("RPC_URL").ok_or(ConfigError::Missing("RPC_URL"))?,
            ..Self::default()
        };

        config.owner_address = get("OWNER_ADDRESS");
        if let Some(owner) = &config.owner_address {
            parse::<Address>("OWNER_ADDRESS", owner)?;
        }
        if let Some(v) = get("CHAIN_ID") {
            config.chain_id = parse("CHAIN_ID", &v)?;
        }
        if let Some(v) = get("PRICE_CHAIN") {
            config.price_chain = v;
        }
        if let Some(v) = get("POSITION_MANAGER") {
            config.deployment.position_manager = parse("POSITION_MANAGER", &v)?;
        }
        if let Some(v) = get("FACTORY") {
            config.deployment.factory = parse("FACTORY", &v)?;
        }
        if let Some(v) = get("MASTERCHEF") {
            config.deployment.masterchef = parse("MASTERCHEF", &v)?;
        }
        if let Some(v) = get("MASTERCHEF_DEPLOY_BLOCK") {
            config.deployment.masterchef_deploy_block = parse("MASTERCHEF_DEPLOY_BLOCK", &v)?;
        }
        if let Some(v) = get("REWARD_TOKEN") {
            config.deployment.reward_token = parse("REWARD_TOKEN", &v)?;
        }
        if let Some(v) = get("REWARD_SYMBOL") {
            config.reward_symbol = v;
        }
        if let Some(v) = get("REWARD_DECIMALS") {
            config.reward_decimals = parse("REWARD_DECIMALS", &v)?;
        }
        if let Some(v) = get("STABLECOINS") {
            config.stablecoins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse::<Address>("STABLECOINS", s).map(|a| a.to_string()))
                .collect::<Result<_, _>>()?;
        }
        config.subgraph_url = get("SUBGRAPH_URL");
        config.thegraph_api_key = get("THEGRAPH_API_KEY");
        if let Some(v) = get("PRICE_API_URL") {
            config.price_api_url = v;
        }
        if let Some(v) = get("DATABASE_URL") {
            config.database_url = v;
        }
        if let Some(v) = get("BIND_ADDRESS") {
            config.bind_address = v;
        }
        if let Some(v) = get("SCAN_CHUNK_SIZE") {
            let size: u64 = parse("SCAN_CHUNK_SIZE", &v)?;
            if size == 0 {
                return Err(ConfigError::Invalid {
                    key: "SCAN_CHUNK_SIZE",
                    value: v,
                });
            }
            config.scan = config.scan.with_chunk_size(size);
        }
        if let Some(v) = get("SCAN_CONCURRENCY") {
            let concurrency: usize = parse("SCAN_CONCURRENCY", &v)?;
            if concurrency == 0 {
                return Err(ConfigError::Invalid {
                    key: "SCAN_CONCURRENCY",
                    value: v,
                });
            }
            config.scan = config.scan.with_concurrency(concurrency);
        }
        if let Some(v) = get("SCAN_BATCH_DELAY_MS") {
            let millis: u64 = parse("SCAN_BATCH_DELAY_MS", &v)?;
            config.scan = config.scan.with_delay(Duration::from_millis(millis));
        }
        if let Some(v) = get("STAKED_LOOKBACK_BLOCKS") {
            config.staked_lookback_blocks = parse("STAKED_LOOKBACK_BLOCKS", &v)?;
        }
        if let Some(v) = get("HTTP_TIMEOUT_SECS") {
            config.http_timeout = Duration::from_secs(parse("HTTP_TIMEOUT_SECS", &v)?);
        }
        Ok(config)
    }

    /// Checks the chain id reported by the RPC endpoint.
    ///
    /// # Errors
    /// Returns [`ConfigError::ChainMismatch`] when it differs from `chain_id`.
    pub fn check_chain_id(&self, reported: u64) -> Result<(), ConfigError> {
        if reported == self.chain_id {
            Ok(())
        } else {
            Err(ConfigError::ChainMismatch {
                expected: self.chain_id,
                actual: reported,
            })
        }
    }

    /// Farm reward token.
    #[must_use]
    pub fn reward_token(&self) -> Token {
        Token::new(
            self.deployment.reward_token.to_string(),
            self.reward_symbol.clone(),
            self.reward_decimals,
        )
    }

    /// Subgraph endpoint and key, `None` when no API key is configured.
    #[must_use]
    pub fn subgraph_endpoint(&self) -> Option<(String, String)> {
        let key = self.thegraph_api_key.clone()?;
        let url = self
            .subgraph_url
            .clone()
            .unwrap_or_else(|| SubgraphClient::gateway_url(&key, BASE_MASTERCHEF_SUBGRAPH_ID));
        Some((url, key))
    }
}
