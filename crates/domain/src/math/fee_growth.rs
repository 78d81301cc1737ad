//! Uncollected fee accounting from the pool's fee growth accumulators.
//!
//! All arithmetic is modulo 2^256, like the contracts.

use crate::entities::{PoolState, Position};
use crate::error::DomainError;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Fee growth per unit of liquidity inside `[tick_lower, tick_upper)`.
pub fn fee_growth_inside(
    tick_current: i32,
    tick_lower: i32,
    tick_upper: i32,
    fee_growth_global: U256,
    fee_growth_outside_lower: U256,
    fee_growth_outside_upper: U256,
) -> U256 {
    let below = if tick_current >= tick_lower {
        fee_growth_outside_lower
    } else {
        fee_growth_global.overflowing_sub(fee_growth_outside_lower).0
    };
    let above = if tick_current < tick_upper {
        fee_growth_outside_upper
    } else {
        fee_growth_global.overflowing_sub(fee_growth_outside_upper).0
    };
    fee_growth_global
        .overflowing_sub(below)
        .0
        .overflowing_sub(above)
        .0
}

/// `delta * liquidity / 2^128 + owed`, where `delta = inside - inside_last`.
///
/// A zero delta, or one with the sign bit set after wrapping, accrues nothing and the
/// result is exactly `owed`.
///
/// # Errors
/// Returns an error if the sum overflows 256 bits.
pub fn uncollected_fees(
    fee_growth_inside: U256,
    fee_growth_inside_last: U256,
    liquidity: u128,
    owed: u128,
) -> Result<U256, DomainError> {
    let owed = U256::from(owed);
    let (delta, _) = fee_growth_inside.overflowing_sub(fee_growth_inside_last);
    if delta.is_zero() || delta.bit(255) {
        return Ok(owed);
    }

    let accrued = U256::try_from(delta.full_mul(U256::from(liquidity)) >> 128)
        .map_err(|_| DomainError::Overflow("uncollected_fees"))?;
    accrued
        .checked_add(owed)
        .ok_or(DomainError::Overflow("uncollected_fees"))
}

/// Raw uncollected fee amounts of a position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncollectedFees {
    pub amount0: U256,
    pub amount1: U256,
}

/// Computes both tokens' uncollected fees for a position against the live pool state.
///
/// # Errors
/// Returns an error on overflow.
pub fn position_uncollected_fees(
    position: &Position,
    pool: &PoolState,
) -> Result<UncollectedFees, DomainError> {
    let inside0 = fee_growth_inside(
        pool.tick,
        position.tick_lower,
        position.tick_upper,
        pool.fee_growth_global0,
        pool.lower.fee_growth_outside0,
        pool.upper.fee_growth_outside0,
    );
    let inside1 = fee_growth_inside(
        pool.tick,
        position.tick_lower,
        position.tick_upper,
        pool.fee_growth_global1,
        pool.lower.fee_growth_outside1,
        pool.upper.fee_growth_outside1,
    );

    Ok(UncollectedFees {
        amount0: uncollected_fees(
            inside0,
            position.fee_growth_inside0_last,
            position.liquidity,
            position.tokens_owed0,
        )?,
        amount1: uncollected_fees(
            inside1,
            position.fee_growth_inside1_last,
            position.liquidity,
            position.tokens_owed1,
        )?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q128() -> U256 {
        U256::one() << 128
    }

    #[test]
    fn test_inside_when_in_range() {
        // global 100, below 10, above 20 -> inside 70
        let inside = fee_growth_inside(
            0,
            -10,
            10,
            U256::from(100),
            U256::from(10),
            U256::from(20),
        );
        assert_eq!(inside, U256::from(70));
    }

    #[test]
    fn test_inside_when_below_and_above() {
        // below range: below = global - outside_lower
        let below = fee_growth_inside(-20, -10, 10, U256::from(100), U256::from(30), U256::from(20));
        // below = 70, above = 20 -> 10
        assert_eq!(below, U256::from(10));

        // above range: above = global - outside_upper
        let above = fee_growth_inside(20, -10, 10, U256::from(100), U256::from(10), U256::from(60));
        // below = 10, above = 40 -> 50
        assert_eq!(above, U256::from(50));
    }

    #[test]
    fn test_inside_wraps() {
        let inside = fee_growth_inside(0, -10, 10, U256::from(5), U256::from(10), U256::zero());
        assert_eq!(inside, U256::MAX - U256::from(4));
    }

    #[test]
    fn test_uncollected_accrues_on_positive_delta() {
        // delta = 2 * 2^128 per unit, liquidity 3 -> 6 accrued, plus 4 owed
        let fees = uncollected_fees(q128() * 5, q128() * 3, 3, 4).unwrap();
        assert_eq!(fees, U256::from(10));
    }

    #[test]
    fn test_non_positive_delta_returns_owed_exactly() {
        let owed = 123_456u128;
        // zero delta
        assert_eq!(
            uncollected_fees(q128(), q128(), 1_000_000, owed).unwrap(),
            U256::from(owed)
        );
        // negative delta: inside below last
        assert_eq!(
            uncollected_fees(q128(), q128() * 2, 1_000_000, owed).unwrap(),
            U256::from(owed)
        );
    }
}
