use crate::enums::PositionStatus;
use crate::error::DomainError;
use crate::math::tick_math::{MAX_TICK, MIN_TICK};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position NFT token id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A concentrated liquidity position as reported by the position manager.
///
/// The tick range is half-open: `[tick_lower, tick_upper)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub owner: String,
    pub token0: String,
    pub token1: String,
    /// Fee tier in hundredths of a basis point (500 = 0.05%).
    pub fee_tier: u32,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,

    pub fee_growth_inside0_last: U256,
    pub fee_growth_inside1_last: U256,
    pub tokens_owed0: u128,
    pub tokens_owed1: u128,

    pub staked: bool,
    /// Pending farm reward in raw reward-token units, `None` when the farm did not
    /// report it.
    pub pending_reward: Option<U256>,
    /// Pool address when already known from an indexer.
    pub pool_hint: Option<String>,
}

impl Position {
    /// Creates a position, rejecting inverted or out-of-bounds tick ranges.
    ///
    /// # Errors
    /// Returns an error if `tick_lower >= tick_upper` or either tick is outside the
    /// supported range.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: PositionId,
        owner: impl Into<String>,
        token0: impl Into<String>,
        token1: impl Into<String>,
        fee_tier: u32,
        tick_lower: i32,
        tick_upper: i32,
        liquidity: u128,
    ) -> Result<Self, DomainError> {
        if tick_lower >= tick_upper {
            return Err(DomainError::InvalidTickRange {
                lower: tick_lower,
                upper: tick_upper,
            });
        }
        for tick in [tick_lower, tick_upper] {
            if !(MIN_TICK..=MAX_TICK).contains(&tick) {
                return Err(DomainError::TickOutOfRange(tick));
            }
        }
        Ok(Self {
            id,
            owner: owner.into(),
            token0: token0.into(),
            token1: token1.into(),
            fee_tier,
            tick_lower,
            tick_upper,
            liquidity,
            fee_growth_inside0_last: U256::zero(),
            fee_growth_inside1_last: U256::zero(),
            tokens_owed0: 0,
            tokens_owed1: 0,
            staked: false,
            pending_reward: Some(U256::zero()),
            pool_hint: None,
        })
    }

    /// Sets the fee growth checkpoints and owed balances.
    #[must_use]
    pub fn with_fee_checkpoints(
        mut self,
        inside0_last: U256,
        inside1_last: U256,
        owed0: u128,
        owed1: u128,
    ) -> Self {
        self.fee_growth_inside0_last = inside0_last;
        self.fee_growth_inside1_last = inside1_last;
        self.tokens_owed0 = owed0;
        self.tokens_owed1 = owed1;
        self
    }

    /// Marks the position as staked with the given pending reward.
    #[must_use]
    pub fn with_staking(mut self, staked: bool, pending_reward: Option<U256>) -> Self {
        self.staked = staked;
        self.pending_reward = pending_reward;
        self
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.liquidity == 0
    }

    #[must_use]
    pub fn is_in_range(&self, tick_current: i32) -> bool {
        tick_current >= self.tick_lower && tick_current < self.tick_upper
    }

    #[must_use]
    pub fn status(&self, tick_current: i32) -> PositionStatus {
        if self.is_closed() {
            PositionStatus::Closed
        } else if self.is_in_range(tick_current) {
            PositionStatus::InRange
        } else {
            PositionStatus::OutOfRange
        }
    }
}
