//! Farm subgraph client.
//!
//! Lists a wallet's farmed positions from the MasterChef v3 subgraph. Tick bounds and
//! liquidity reported here take precedence over the position manager's for farmed
//! positions.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use clmm_yield_domain::entities::PositionId;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Subgraph id of MasterChef v3 on Base.
pub const BASE_MASTERCHEF_SUBGRAPH_ID: &str = "3oYoAoCJMV2ZyZSTpg6cUS1gKTzcc2cjmCVfpNyWZVmr";

const USER_POSITIONS_QUERY: &str = r#"
query GetUserStakedPositions($user: String!) {
  userPositions(
    where: { user: $user, liquidity_gt: "0" }
    orderBy: timestamp
    orderDirection: desc
    first: 100
  ) {
    id
    pool {
      v3Pool
    }
    tickLower
    tickUpper
    liquidity
    timestamp
    earned
    isStaked
  }
}
"#;

/// A farmed position as indexed by the subgraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmedPosition {
    pub token_id: PositionId,
    /// Pool address, when indexed.
    pub pool: Option<String>,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    /// Raw reward earned, as indexed.
    pub earned: Option<U256>,
    pub is_staked: bool,
}

/// Index of farmed positions per wallet.
#[async_trait]
pub trait StakedPositionIndex: Send + Sync {
    /// Farmed positions of `owner` with liquidity.
    async fn staked_positions(&self, owner: &str) -> Result<Vec<FarmedPosition>>;
}

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<UserPositionsData>,
    errors: Option<Vec<GraphError>>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserPositionsData {
    user_positions: Vec<RawUserPosition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUserPosition {
    id: String,
    pool: Option<RawPool>,
    tick_lower: String,
    tick_upper: String,
    liquidity: String,
    earned: Option<String>,
    is_staked: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPool {
    v3_pool: Option<String>,
}

impl TryFrom<RawUserPosition> for FarmedPosition {
    type Error = anyhow::Error;

    fn try_from(raw: RawUserPosition) -> Result<Self> {
        let token_id = raw
            .id
            .parse::<u64>()
            .with_context(|| format!("Invalid position id: {}", raw.id))?;
        let earned = raw
            .earned
            .as_deref()
            .map(|e| U256::from_dec_str(e).map_err(|_| anyhow!("Invalid earned: {e}")))
            .transpose()?;
        Ok(Self {
            token_id: PositionId(token_id),
            pool: raw.pool.and_then(|p| p.v3_pool),
            tick_lower: raw.tick_lower.parse().context("Invalid tickLower")?,
            tick_upper: raw.tick_upper.parse().context("Invalid tickUpper")?,
            liquidity: raw.liquidity.parse().context("Invalid liquidity")?,
            earned,
            is_staked: raw.is_staked.unwrap_or(true),
        })
    }
}

/// Parses a `userPositions` GraphQL response body.
///
/// # Errors
/// Returns an error for malformed JSON, GraphQL errors or invalid numbers.
pub fn parse_user_positions(body: &str) -> Result<Vec<FarmedPosition>> {
    let response: GraphResponse =
        serde_json::from_str(body).context("Malformed subgraph response")?;
    if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
        let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
        bail!("Subgraph query failed: {}", messages.join("; "));
    }
    let data = response
        .data
        .ok_or_else(|| anyhow!("Subgraph response has no data"))?;
    data.user_positions
        .into_iter()
        .map(FarmedPosition::try_from)
        .collect()
}

/// GraphQL client for The Graph gateway.
#[derive(Clone)]
pub struct SubgraphClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl SubgraphClient {
    /// Creates a client for an endpoint, authenticating with a bearer key.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    /// Gateway URL of a subgraph id.
    #[must_use]
    pub fn gateway_url(api_key: &str, subgraph_id: &str) -> String {
        format!("https://gateway.thegraph.com/api/{api_key}/subgraphs/id/{subgraph_id}")
    }
}

#[async_trait]
impl StakedPositionIndex for SubgraphClient {
    async fn staked_positions(&self, owner: &str) -> Result<Vec<FarmedPosition>> {
        let body = serde_json::json!({
            "query": USER_POSITIONS_QUERY,
            "variables": { "user": owner.to_lowercase() },
        });
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Subgraph request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("Subgraph returned HTTP {status}");
        }
        let text = response.text().await.context("Failed to read subgraph response")?;
        let positions = parse_user_positions(&text)?;
        debug!(owner, count = positions.len(), "Fetched farmed positions from subgraph");
        Ok(positions)
    }
}
