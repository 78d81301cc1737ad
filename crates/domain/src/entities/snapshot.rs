use crate::entities::position::PositionId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// State of a position at the block it was minted.
///
/// Computed once per position and then served from the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MintSnapshot {
    pub token_id: PositionId,
    pub mint_block: u64,
    pub mint_timestamp: u64,
    /// Initial deposit of token0, in token units.
    pub amount0: Decimal,
    /// Initial deposit of token1, in token units.
    pub amount1: Decimal,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub opening_tick: i32,
    /// Token1 per token0 at the mint block.
    pub opening_price: Decimal,
    pub decimals0: u8,
    pub decimals1: u8,
    pub opening_value_usd: Option<Decimal>,
}
