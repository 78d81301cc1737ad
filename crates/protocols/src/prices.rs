//! USD token prices.
//!
//! [`LayeredPriceSource`] answers from fixed prices first (stablecoins pinned at
//! one dollar, configured overrides) and asks a remote source for the rest.
//! Addresses are compared lowercase.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default DefiLlama coins API.
pub const DEFILLAMA_COINS_URL: &str = "https://coins.llama.fi";

/// Source of USD unit prices keyed by token address.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Prices for the given token addresses. Unknown tokens are absent from the map.
    async fn usd_prices(&self, addresses: &[String]) -> Result<HashMap<String, Decimal>>;
}

/// Fixed prices.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceSource {
    prices: HashMap<String, Decimal>,
}

impl StaticPriceSource {
    /// Pins every stablecoin at one dollar.
    #[must_use]
    pub fn stablecoins<S: AsRef<str>>(addresses: &[S]) -> Self {
        let prices = addresses
            .iter()
            .map(|a| (a.as_ref().to_lowercase(), Decimal::ONE))
            .collect();
        Self { prices }
    }

    /// Adds or replaces a fixed price.
    #[must_use]
    pub fn with_price(mut self, address: &str, price: Decimal) -> Self {
        self.prices.insert(address.to_lowercase(), price);
        self
    }

    /// Price of one token.
    #[must_use]
    pub fn get(&self, address: &str) -> Option<Decimal> {
        self.prices.get(&address.to_lowercase()).copied()
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    async fn usd_prices(&self, addresses: &[String]) -> Result<HashMap<String, Decimal>> {
        Ok(addresses
            .iter()
            .filter_map(|a| self.get(a).map(|p| (a.to_lowercase(), p)))
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct LlamaResponse {
    coins: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct LlamaCoin {
    price: Decimal,
}

/// Parses a `/prices/current` response into lowercase address keys.
///
/// # Errors
/// Returns an error for malformed JSON. Coins with an unusable price are skipped.
pub fn parse_llama_prices(body: &str) -> Result<HashMap<String, Decimal>> {
    let response: LlamaResponse =
        serde_json::from_str(body).context("Malformed price response")?;
    let mut prices = HashMap::new();
    for (key, coin) in response.coins {
        let address = key.rsplit(':').next().unwrap_or(&key).to_lowercase();
        match serde_json::from_value::<LlamaCoin>(coin) {
            Ok(LlamaCoin { price }) if price > Decimal::ZERO => {
                prices.insert(address, price);
            }
            Ok(LlamaCoin { price }) => warn!(coin = %key, %price, "Ignoring non-positive price"),
            Err(e) => warn!(coin = %key, error = %e, "Ignoring unusable price"),
        }
    }
    Ok(prices)
}

/// DefiLlama coins API client.
#[derive(Clone)]
pub struct DefiLlamaPriceSource {
    http: reqwest::Client,
    base_url: String,
    chain: String,
}

impl DefiLlamaPriceSource {
    /// Creates a client for `chain` (e.g. `base`).
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, chain: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            chain: chain.into(),
        })
    }

    fn url(&self, addresses: &[String]) -> String {
        let coins: Vec<String> = addresses
            .iter()
            .map(|a| format!("{}:{}", self.chain, a.to_lowercase()))
            .collect();
        format!(
            "{}/prices/current/{}",
            self.base_url.trim_end_matches('/'),
            coins.join(",")
        )
    }
}

#[async_trait]
impl PriceSource for DefiLlamaPriceSource {
    async fn usd_prices(&self, addresses: &[String]) -> Result<HashMap<String, Decimal>> {
        if addresses.is_empty() {
            return Ok(HashMap::new());
        }
        let response = self
            .http
            .get(self.url(addresses))
            .send()
            .await
            .context("Price request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("Price API returned HTTP {status}");
        }
        let body = response.text().await.context("Failed to read price response")?;
        parse_llama_prices(&body)
    }
}

/// Fixed prices first, then an optional remote source.
#[derive(Clone)]
pub struct LayeredPriceSource {
    fixed: StaticPriceSource,
    remote: Option<Arc<dyn PriceSource>>,
}

impl LayeredPriceSource {
    /// Creates a layered source.
    #[must_use]
    pub fn new(fixed: StaticPriceSource, remote: Option<Arc<dyn PriceSource>>) -> Self {
        Self { fixed, remote }
    }
}

#[async_trait]
impl PriceSource for LayeredPriceSource {
    /// A failing remote source is logged and yields only the fixed prices.
    async fn usd_prices(&self, addresses: &[String]) -> Result<HashMap<String, Decimal>> {
        let mut prices = self.fixed.usd_prices(addresses).await?;
        let missing: Vec<String> = addresses
            .iter()
            .map(|a| a.to_lowercase())
            .filter(|a| !prices.contains_key(a))
            .collect();
        if missing.is_empty() {
            return Ok(prices);
        }
        if let Some(remote) = &self.remote {
            match remote.usd_prices(&missing).await {
                Ok(found) => prices.extend(found),
                Err(e) => warn!(error = %e, tokens = missing.len(), "Remote price lookup failed"),
            }
        }
        debug!(requested = addresses.len(), priced = prices.len(), "Resolved USD prices");
        Ok(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use rust_decimal_macros::dec;

    const USDC: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";
    const WETH: &str = "0x4200000000000000000000000000000000000006";

    struct FailingSource;

    #[async_trait]
    impl PriceSource for FailingSource {
        async fn usd_prices(&self, _addresses: &[String]) -> Result<HashMap<String, Decimal>> {
            Err(anyhow!("timeout"))
        }
    }

    #[test]
    fn test_parse_llama_prices() {
        let body = r#"{"coins":{
            "base:0x4200000000000000000000000000000000000006":{"decimals":18,"symbol":"WETH","price":3012.5,"timestamp":1720000000,"confidence":0.99},
            "base:0x3055913c90fcc1a6ce9a358911721eeb942013a1":{"decimals":18,"symbol":"CAKE","price":2.25,"timestamp":1720000000,"confidence":0.99}
        }}"#;
        let prices = parse_llama_prices(body).unwrap();
        assert_eq!(prices.get(WETH), Some(&dec!(3012.5)));
        assert_eq!(
            prices.get("0x3055913c90fcc1a6ce9a358911721eeb942013a1"),
            Some(&dec!(2.25))
        );
    }

    #[test]
    fn test_parse_llama_prices_skips_zero() {
        let body = r#"{"coins":{"base:0xabc":{"price":0.0}}}"#;
        assert!(parse_llama_prices(body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_llama_prices_keeps_decimal_digits() {
        let body = r#"{"coins":{
            "base:0xaaa":{"price":0.1},
            "base:0xbbb":{"price":0.000012345678901234},
            "base:0xccc":{"price":"n/a"}
        }}"#;
        let prices = parse_llama_prices(body).unwrap();
        assert_eq!(prices.get("0xaaa"), Some(&dec!(0.1)));
        assert_eq!(prices.get("0xbbb"), Some(&dec!(0.000012345678901234)));
        assert!(!prices.contains_key("0xccc"));
    }

    #[test]
    fn test_llama_url() {
        let source = DefiLlamaPriceSource::new(DEFILLAMA_COINS_URL, "base", Duration::from_secs(5)).unwrap();
        assert_eq!(
            source.url(&[WETH.to_string(), "0xABC".to_string()]),
            "https://coins.llama.fi/prices/current/base:0x4200000000000000000000000000000000000006,base:0xabc"
        );
    }

    #[tokio::test]
    async fn test_stablecoins_are_pinned_case_insensitive() {
        let fixed = StaticPriceSource::stablecoins(&[USDC]);
        let prices = fixed.usd_prices(&[USDC.to_lowercase()]).await.unwrap();
        assert_eq!(prices.get(&USDC.to_lowercase()), Some(&Decimal::ONE));
    }

    #[tokio::test]
    async fn test_layered_falls_back_to_fixed_on_remote_failure() {
        let layered = LayeredPriceSource::new(
            StaticPriceSource::stablecoins(&[USDC]),
            Some(Arc::new(FailingSource)),
        );
        let prices = layered
            .usd_prices(&[USDC.to_string(), WETH.to_string()])
            .await
            .unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices.get(&USDC.to_lowercase()), Some(&Decimal::ONE));
    }

    #[tokio::test]
    async fn test_layered_asks_remote_only_for_missing() {
        let remote = StaticPriceSource::default()
            .with_price(WETH, dec!(3000))
            .with_price(USDC, dec!(0.5));
        let layered = LayeredPriceSource::new(
            StaticPriceSource::stablecoins(&[USDC]),
            Some(Arc::new(remote)),
        );
        let prices = layered
            .usd_prices(&[USDC.to_string(), WETH.to_string()])
            .await
            .unwrap();
        assert_eq!(prices.get(&USDC.to_lowercase()), Some(&Decimal::ONE));
        assert_eq!(prices.get(WETH), Some(&dec!(3000)));
    }
}
