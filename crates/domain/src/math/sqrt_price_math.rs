//! Token amount deltas between two sqrt prices, in raw token units.

use crate::error::DomainError;
use crate::math::full_math::mul_div;
use primitive_types::U256;

fn q96() -> U256 {
    U256::one() << 96
}

fn sorted(a: U256, b: U256) -> (U256, U256) {
    if a > b { (b, a) } else { (a, b) }
}

/// Amount of token0 between two sqrt prices, rounded down.
///
/// `amount0 = L * 2^96 * (sqrt_b - sqrt_a) / sqrt_b / sqrt_a`
///
/// # Errors
/// Returns an error if the lower sqrt price is zero or the result overflows.
pub fn get_amount0_delta(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: u128,
) -> Result<U256, DomainError> {
    let (lower, upper) = sorted(sqrt_ratio_a_x96, sqrt_ratio_b_x96);
    if lower.is_zero() {
        return Err(DomainError::DivisionByZero("get_amount0_delta"));
    }

    let numerator1 = U256::from(liquidity) << 96;
    let numerator2 = upper - lower;

    Ok(mul_div(numerator1, numerator2, upper)? / lower)
}

/// Amount of token1 between two sqrt prices, rounded down.
///
/// `amount1 = L * (sqrt_b - sqrt_a) / 2^96`
///
/// # Errors
/// Returns an error if the result overflows.
pub fn get_amount1_delta(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: u128,
) -> Result<U256, DomainError> {
    let (lower, upper) = sorted(sqrt_ratio_a_x96, sqrt_ratio_b_x96);
    mul_div(U256::from(liquidity), upper - lower, q96())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_deltas() {
        // sqrt price 1 -> 2, liquidity 1000
        // amount1 = 1000 * (2 - 1) = 1000
        // amount0 = 1000 * (1/1 - 1/2) = 500
        let a = q96();
        let b = q96() * 2;

        assert_eq!(get_amount1_delta(a, b, 1000).unwrap(), U256::from(1000));
        assert_eq!(get_amount0_delta(a, b, 1000).unwrap(), U256::from(500));
        // argument order does not matter
        assert_eq!(get_amount0_delta(b, a, 1000).unwrap(), U256::from(500));
    }

    #[test]
    fn test_zero_width_is_zero() {
        assert!(get_amount0_delta(q96(), q96(), 1000).unwrap().is_zero());
        assert!(get_amount1_delta(q96(), q96(), 1000).unwrap().is_zero());
    }

    #[test]
    fn test_zero_sqrt_price_rejected() {
        assert!(get_amount0_delta(U256::zero(), q96(), 1).is_err());
    }
}
