use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Fee growth recorded outside a tick boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickFeeGrowth {
    pub fee_growth_outside0: U256,
    pub fee_growth_outside1: U256,
}

/// Pool state read for one position's tick boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolState {
    pub address: String,
    pub tick: i32,
    /// Q64.96 square root of the raw token1/token0 price.
    pub sqrt_price_x96: U256,
    pub liquidity: u128,
    pub fee_growth_global0: U256,
    pub fee_growth_global1: U256,
    pub lower: TickFeeGrowth,
    pub upper: TickFeeGrowth,
    /// Block the state was read at, `None` for latest.
    pub block_number: Option<u64>,
}
