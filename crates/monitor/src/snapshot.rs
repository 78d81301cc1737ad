//! Mint snapshot memoization.
//!
//! A position's mint snapshot is computed once from chain history and then served
//! from the cache together with its scan checkpoint.

use crate::error::MonitorError;
use clmm_yield_data::SnapshotRepository;
use clmm_yield_domain::entities::{MintSnapshot, Position, PositionId, Token};
use clmm_yield_domain::enums::QuoteSide;
use clmm_yield_domain::math::fixed_point::raw_to_decimal;
use clmm_yield_domain::math::price_tick::sqrt_price_x96_to_price;
use clmm_yield_domain::valuation::opening_value_usd;
use clmm_yield_protocols::pancake::ChainReader;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A mint snapshot with the last block already scanned for events.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSnapshot {
    pub snapshot: MintSnapshot,
    pub last_scanned_block: u64,
}

/// What is needed to compute a snapshot on first sighting.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotRequest<'a> {
    pub position: &'a Position,
    pub pool: &'a str,
    pub token0: &'a Token,
    pub token1: &'a Token,
    pub quote: QuoteSide,
    /// Current USD price of the quote token.
    pub quote_usd: Option<Decimal>,
}

/// Fetch-or-compute-then-cache access to mint snapshots.
#[derive(Clone)]
pub struct SnapshotStore {
    chain: Arc<dyn ChainReader>,
    repo: SnapshotRepository,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(chain: Arc<dyn ChainReader>, repo: SnapshotRepository) -> Self {
        Self { chain, repo }
    }

    /// Returns the cached snapshot of a position, computing and storing it first
    /// when absent.
    ///
    /// A new snapshot's checkpoint is the block before the mint, so the mint deposit
    /// itself is picked up by the first scan. Calling this twice never changes a
    /// stored snapshot.
    ///
    /// # Errors
    /// Returns an error when the mint cannot be recovered from the chain or the
    /// store fails.
    pub async fn get_or_create(
        &self,
        request: &SnapshotRequest<'_>,
    ) -> Result<CachedSnapshot, MonitorError> {
        let id = request.position.id;
        if let Some(mut cached) = self.load(id).await? {
            debug!(token_id = %id, checkpoint = cached.last_scanned_block, "Mint snapshot cache hit");
            if cached.snapshot.opening_value_usd.is_none() {
                self.fill_opening_value(&mut cached, request).await;
            }
            return Ok(cached);
        }

        let snapshot = self.compute(request).await?;
        let checkpoint = snapshot.mint_block.saturating_sub(1);
        if self.repo.insert(&snapshot, checkpoint).await? {
            info!(
                token_id = %id,
                mint_block = snapshot.mint_block,
                opening_tick = snapshot.opening_tick,
                "Cached mint snapshot"
            );
            return Ok(CachedSnapshot {
                snapshot,
                last_scanned_block: checkpoint,
            });
        }

        // Another writer got there first; its row wins.
        self.load(id)
            .await?
            .ok_or_else(|| MonitorError::Upstream(format!("snapshot of position {id} vanished")))
    }

    /// Moves the scan checkpoint forward. Returns whether it moved.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn advance(&self, id: PositionId, block: u64) -> Result<bool, MonitorError> {
        Ok(self.repo.advance_checkpoint(id, block).await?)
    }

    /// Prices a snapshot cached while the quote price was unavailable.
    async fn fill_opening_value(&self, cached: &mut CachedSnapshot, request: &SnapshotRequest<'_>) {
        let id = cached.snapshot.token_id;
        let Some(value) = opening_value_usd(&cached.snapshot, request.quote, request.quote_usd)
        else {
            return;
        };
        match self.repo.fill_opening_value(id, value).await {
            Ok(_) => info!(token_id = %id, opening_value_usd = %value, "Priced cached mint snapshot"),
            Err(e) => warn!(token_id = %id, error = %e, "Failed to store opening value"),
        }
        cached.snapshot.opening_value_usd = Some(value);
    }

    async fn load(&self, id: PositionId) -> Result<Option<CachedSnapshot>, MonitorError> {
        match self.repo.find(id).await? {
            Some(record) => Ok(Some(CachedSnapshot {
                snapshot: record.to_snapshot()?,
                last_scanned_block: record.last_scanned_block(),
            })),
            None => Ok(None),
        }
    }

    async fn compute(&self, request: &SnapshotRequest<'_>) -> Result<MintSnapshot, MonitorError> {
        let position = request.position;
        let (dec0, dec1) = (request.token0.decimals, request.token1.decimals);

        let mint = self
            .chain
            .mint_record(position.id)
            .await
            .map_err(|e| MonitorError::upstream("mint record", &e))?;
        let opening = self
            .chain
            .pool_state(
                request.pool,
                position.tick_lower,
                position.tick_upper,
                Some(mint.block),
            )
            .await
            .map_err(|e| MonitorError::upstream("pool state at mint", &e))?;

        let mut snapshot = MintSnapshot {
            token_id: position.id,
            mint_block: mint.block,
            mint_timestamp: mint.timestamp,
            amount0: raw_to_decimal(mint.amount0, dec0)?,
            amount1: raw_to_decimal(mint.amount1, dec1)?,
            tick_lower: position.tick_lower,
            tick_upper: position.tick_upper,
            opening_tick: opening.tick,
            opening_price: sqrt_price_x96_to_price(opening.sqrt_price_x96, dec0, dec1)?,
            decimals0: dec0,
            decimals1: dec1,
            opening_value_usd: None,
        };
        snapshot.opening_value_usd = opening_value_usd(&snapshot, request.quote, request.quote_usd);
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use clmm_yield_data::Database;
    use clmm_yield_domain::entities::{PoolState, TickFeeGrowth};
    use clmm_yield_domain::math::tick_math::get_sqrt_ratio_at_tick;
    use clmm_yield_protocols::pancake::MintRecord;
    use primitive_types::U256;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Only answers the two calls a snapshot needs.
    #[derive(Default)]
    struct MintOnlyChain {
        mint_calls: AtomicUsize,
    }

    #[async_trait]
    impl ChainReader for MintOnlyChain {
        async fn head_block(&self) -> Result<u64> {
            bail!("unused")
        }

        async fn owned_position_ids(&self, _owner: &str) -> Result<Vec<PositionId>> {
            bail!("unused")
        }

        async fn farmed_position_ids(&self, _owner: &str) -> Result<Vec<PositionId>> {
            bail!("unused")
        }

        async fn position(&self, _id: PositionId, _owner: &str) -> Result<Position> {
            bail!("unused")
        }

        async fn pool_address(&self, _t0: &str, _t1: &str, _fee: u32) -> Result<String> {
            bail!("unused")
        }

        async fn pool_state(
            &self,
            pool: &str,
            _lower: i32,
            _upper: i32,
            block: Option<u64>,
        ) -> Result<PoolState> {
            Ok(PoolState {
                address: pool.to_string(),
                tick: 0,
                sqrt_price_x96: get_sqrt_ratio_at_tick(0)?,
                liquidity: 1,
                fee_growth_global0: U256::zero(),
                fee_growth_global1: U256::zero(),
                lower: TickFeeGrowth::default(),
                upper: TickFeeGrowth::default(),
                block_number: block,
            })
        }

        async fn token(&self, _address: &str) -> Result<Token> {
            bail!("unused")
        }

        async fn mint_record(&self, _id: PositionId) -> Result<MintRecord> {
            self.mint_calls.fetch_add(1, Ordering::SeqCst);
            Ok(MintRecord {
                block: 500,
                timestamp: 1_700_000_000,
                amount0: U256::exp10(18),
                amount1: U256::exp10(18),
            })
        }
    }

    #[tokio::test]
    async fn test_cached_snapshot_priced_once_quote_price_appears() {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let chain = Arc::new(MintOnlyChain::default());
        let store = SnapshotStore::new(chain.clone(), db.snapshots());

        let position =
            Position::new(PositionId(9), "0xowner", "0xbase", "0xquote", 500, -600, 600, 1).unwrap();
        let (t0, t1) = (Token::new("0xbase", "WETH", 18), Token::new("0xquote", "USDX", 18));
        let mut request = SnapshotRequest {
            position: &position,
            pool: "0xpool",
            token0: &t0,
            token1: &t1,
            quote: QuoteSide::Token1,
            quote_usd: None,
        };

        let first = store.get_or_create(&request).await.unwrap();
        assert_eq!(first.snapshot.opening_value_usd, None);
        assert_eq!(first.last_scanned_block, 499);

        request.quote_usd = Some(Decimal::ONE);
        let second = store.get_or_create(&request).await.unwrap();
        // 1 base at price 1 plus 1 quote
        assert_eq!(second.snapshot.opening_value_usd, Some(dec!(2)));
        assert_eq!(chain.mint_calls.load(Ordering::SeqCst), 1);

        // stored, and not overwritten by a later price
        request.quote_usd = Some(dec!(3));
        let third = store.get_or_create(&request).await.unwrap();
        assert_eq!(third.snapshot.opening_value_usd, Some(dec!(2)));
    }
}
