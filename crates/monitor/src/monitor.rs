//! Portfolio report orchestration.
//!
//! For each position of a wallet: read live state, recover or load the mint
//! snapshot, scan new history from the checkpoint, value it and render it.
//! Positions are processed one after another and a failing position is logged and
//! listed as skipped. Only failing to reach the chain at all fails the report.

use crate::error::MonitorError;
use crate::report::{PortfolioReport, PositionContext, PositionReport, SkippedPosition};
use crate::snapshot::{CachedSnapshot, SnapshotRequest, SnapshotStore};
use alloy_primitives::Address;
use anyhow::{Context, Result};
use async_trait::async_trait;
use clmm_yield_data::{Database, EventRepository};
use clmm_yield_domain::entities::{
    ClaimedTotals, Position, PositionEvent, PositionEventKind, PositionId, Token,
};
use clmm_yield_domain::enums::QuoteSide;
use clmm_yield_domain::math::price_tick::sqrt_price_x96_to_price;
use clmm_yield_domain::valuation::{UsdPrices, ValuationInput, value_position};
use clmm_yield_protocols::pancake::{ChainReader, EventScanner, ScanRequest};
use clmm_yield_protocols::prices::PriceSource;
use clmm_yield_protocols::subgraph::{FarmedPosition, StakedPositionIndex};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Produces wallet reports.
#[async_trait]
pub trait PortfolioReporter: Send + Sync {
    /// Builds the report of one wallet.
    async fn report(&self, owner: &str) -> Result<PortfolioReport, MonitorError>;
}

/// Settings that do not come from a collaborator.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub reward: Token,
    pub stablecoins: Vec<String>,
}

/// Portfolio monitor.
#[derive(Clone)]
pub struct PortfolioMonitor {
    chain: Arc<dyn ChainReader>,
    index: Option<Arc<dyn StakedPositionIndex>>,
    prices: Arc<dyn PriceSource>,
    scanner: EventScanner,
    snapshots: SnapshotStore,
    events: EventRepository,
    settings: MonitorSettings,
}

impl PortfolioMonitor {
    /// Creates a monitor without a staked position index. Farmed positions are
    /// then recovered from farm deposit logs.
    #[must_use]
    pub fn new(
        chain: Arc<dyn ChainReader>,
        prices: Arc<dyn PriceSource>,
        scanner: EventScanner,
        database: &Database,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            snapshots: SnapshotStore::new(chain.clone(), database.snapshots()),
            events: database.events(),
            chain,
            index: None,
            prices,
            scanner,
            settings,
        }
    }

    /// Uses an index for farmed positions, falling back to logs when it fails.
    #[must_use]
    pub fn with_staked_index(mut self, index: Arc<dyn StakedPositionIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Staked positions from the index, `None` when there is no index or it failed.
    async fn farmed_positions(&self, owner: &str) -> Option<HashMap<PositionId, FarmedPosition>> {
        let index = self.index.as_ref()?;
        match index.staked_positions(owner).await {
            Ok(positions) => Some(
                positions
                    .into_iter()
                    .filter(|p| p.is_staked)
                    .map(|p| (p.token_id, p))
                    .collect(),
            ),
            Err(e) => {
                warn!(owner, error = %e, "Staked position index failed, using logs");
                None
            }
        }
    }

    /// Owned positions first, then farmed ones, without duplicates.
    async fn discover(
        &self,
        owner: &str,
        farmed: Option<&HashMap<PositionId, FarmedPosition>>,
    ) -> Result<Vec<PositionId>, MonitorError> {
        let owned = self
            .chain
            .owned_position_ids(owner)
            .await
            .map_err(|e| MonitorError::upstream("owned positions", &e))?;

        let staked = match farmed {
            Some(farmed) => {
                let mut ids: Vec<PositionId> = farmed.keys().copied().collect();
                ids.sort();
                ids
            }
            None => match self.chain.farmed_position_ids(owner).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(owner, error = %e, "Farmed position discovery failed");
                    Vec::new()
                }
            },
        };

        let mut seen = HashSet::new();
        let ids: Vec<PositionId> = owned
            .into_iter()
            .chain(staked)
            .filter(|id| seen.insert(*id))
            .collect();
        debug!(owner, count = ids.len(), "Discovered positions");
        Ok(ids)
    }

    async fn usd_prices(&self, token0: &Token, token1: &Token) -> UsdPrices {
        let reward = &self.settings.reward;
        let addresses = vec![
            token0.address.to_lowercase(),
            token1.address.to_lowercase(),
            reward.address.to_lowercase(),
        ];
        match self.prices.usd_prices(&addresses).await {
            Ok(found) => UsdPrices {
                token0: found.get(&addresses[0]).copied(),
                token1: found.get(&addresses[1]).copied(),
                reward: found.get(&addresses[2]).copied(),
            },
            Err(e) => {
                warn!(error = %e, "USD price lookup failed");
                UsdPrices::default()
            }
        }
    }

    /// Scans history after the checkpoint and stores it. The checkpoint only
    /// advances when every query of the scan succeeded.
    async fn sync_events(&self, request: ScanRequest) {
        let id = request.token_id;
        let outcome = match self.scanner.scan(&request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(token_id = %id, error = %e, "Event scan failed");
                return;
            }
        };
        if let Err(e) = self.events.insert_many(&outcome.events).await {
            warn!(token_id = %id, error = %e, "Failed to store events");
            return;
        }
        if !outcome.is_complete() {
            warn!(
                token_id = %id,
                failed_queries = outcome.failed_queries,
                "Incomplete scan, checkpoint kept"
            );
            return;
        }
        match self.snapshots.advance(id, outcome.end_block).await {
            Ok(moved) => debug!(token_id = %id, end_block = outcome.end_block, moved, "Checkpoint"),
            Err(e) => warn!(token_id = %id, error = %e, "Failed to advance checkpoint"),
        }
    }

    async fn evaluate(
        &self,
        id: PositionId,
        owner: &str,
        farmed: Option<&FarmedPosition>,
        now: u64,
        claimed_rewards: &mut HashSet<(u64, u64)>,
    ) -> Result<Option<PositionReport>> {
        let mut position = self.chain.position(id, owner).await?;
        if let Some(f) = farmed {
            apply_farm_view(&mut position, f);
        }
        if position.is_closed() {
            debug!(token_id = %id, "Closed position excluded");
            return Ok(None);
        }

        let (token0, token1) =
            tokio::try_join!(self.chain.token(&position.token0), self.chain.token(&position.token1))?;
        let pool_address = match &position.pool_hint {
            Some(pool) => pool.clone(),
            None => {
                self.chain
                    .pool_address(&position.token0, &position.token1, position.fee_tier)
                    .await?
            }
        };
        let pool = self
            .chain
            .pool_state(&pool_address, position.tick_lower, position.tick_upper, None)
            .await?;

        let quote = QuoteSide::select(&position.token0, &self.settings.stablecoins);
        let pool_price = sqrt_price_x96_to_price(pool.sqrt_price_x96, token0.decimals, token1.decimals)
            .context("Pool price")?;
        let prices = self
            .usd_prices(&token0, &token1)
            .await
            .complete_with_pool_price(pool_price);
        let quote_usd = match quote {
            QuoteSide::Token0 => prices.token0,
            QuoteSide::Token1 => prices.token1,
        };

        let cached = match self
            .snapshots
            .get_or_create(&SnapshotRequest {
                position: &position,
                pool: &pool_address,
                token0: &token0,
                token1: &token1,
                quote,
                quote_usd,
            })
            .await
        {
            Ok(cached) => Some(cached),
            Err(e) => {
                warn!(token_id = %id, error = %e, "Mint snapshot unavailable");
                None
            }
        };

        if let Some(CachedSnapshot {
            last_scanned_block, ..
        }) = &cached
        {
            self.sync_events(ScanRequest {
                token_id: id,
                owner: owner.to_string(),
                start_block: last_scanned_block.saturating_add(1),
                token0: token0.clone(),
                token1: token1.clone(),
                reward: self.settings.reward.clone(),
            })
            .await;
        }

        let events = match self.events.load(id).await {
            Ok(events) => attribute_rewards(events, claimed_rewards),
            Err(e) => {
                warn!(token_id = %id, error = %e, "Failed to load events");
                Vec::new()
            }
        };
        let snapshot = cached.as_ref().map(|c| &c.snapshot);

        let valuation = value_position(&ValuationInput {
            position: &position,
            pool: &pool,
            snapshot,
            token0: &token0,
            token1: &token1,
            reward_decimals: self.settings.reward.decimals,
            quote,
            prices,
            claimed: ClaimedTotals::from_events(&events),
            now,
        })?;

        Ok(Some(PositionReport::new(&PositionContext {
            position: &position,
            token0: &token0,
            token1: &token1,
            reward: &self.settings.reward,
            quote,
            snapshot,
            valuation: &valuation,
            events: &events,
        })))
    }
}

/// Takes tick bounds, liquidity and pool from the farm index, and its earned
/// reward when the chain did not report a pending one.
fn apply_farm_view(position: &mut Position, farmed: &FarmedPosition) {
    if farmed.tick_lower < farmed.tick_upper {
        position.tick_lower = farmed.tick_lower;
        position.tick_upper = farmed.tick_upper;
    } else {
        warn!(token_id = %position.id, "Ignoring inverted farm tick range");
    }
    position.liquidity = farmed.liquidity;
    if let Some(pool) = &farmed.pool {
        position.pool_hint = Some(pool.clone());
    }
    if position.pending_reward.is_none() {
        position.pending_reward = farmed.earned;
    }
}

/// Reward transfers go to the owner, not to a position, so each one is kept only
/// on the first position of the report that lists it.
fn attribute_rewards(
    events: Vec<PositionEvent>,
    claimed_rewards: &mut HashSet<(u64, u64)>,
) -> Vec<PositionEvent> {
    events
        .into_iter()
        .filter(|e| {
            e.kind != PositionEventKind::FeeClaimReward
                || claimed_rewards.insert((e.block_number, e.log_index))
        })
        .collect()
}

fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

#[async_trait]
impl PortfolioReporter for PortfolioMonitor {
    async fn report(&self, owner: &str) -> Result<PortfolioReport, MonitorError> {
        let owner = owner.trim();
        if owner.parse::<Address>().is_err() {
            return Err(MonitorError::InvalidAddress(owner.to_string()));
        }

        let head = self
            .chain
            .head_block()
            .await
            .map_err(|e| MonitorError::upstream("head block", &e))?;
        let farmed = self.farmed_positions(owner).await;
        let ids = self.discover(owner, farmed.as_ref()).await?;
        let now = unix_now();

        if ids.is_empty() {
            info!(owner, "No positions found");
            return Ok(PortfolioReport::empty(
                owner,
                head,
                now,
                format!("No active positions found for {owner}"),
            ));
        }

        let mut positions = Vec::new();
        let mut skipped = Vec::new();
        let mut claimed_rewards = HashSet::new();
        for id in ids {
            let farm_view = farmed.as_ref().and_then(|f| f.get(&id));
            match self.evaluate(id, owner, farm_view, now, &mut claimed_rewards).await {
                Ok(Some(report)) => positions.push(report),
                Ok(None) => {}
                Err(e) => {
                    warn!(token_id = %id, error = %e, "Skipping position");
                    skipped.push(SkippedPosition {
                        token_id: id.0,
                        reason: format!("{e:#}"),
                    });
                }
            }
        }

        if positions.is_empty() && skipped.is_empty() {
            return Ok(PortfolioReport::empty(
                owner,
                head,
                now,
                format!("No active positions found for {owner}"),
            ));
        }

        info!(
            owner,
            positions = positions.len(),
            skipped = skipped.len(),
            "Built portfolio report"
        );
        Ok(PortfolioReport::new(owner, head, now, positions, skipped))
    }
}
