use crate::error::DomainError;
use crate::math::fixed_point::{pow10, q96_to_decimal};
use crate::math::tick_math::get_sqrt_ratio_at_tick;
use primitive_types::U256;
use rust_decimal::Decimal;

/// Returns the human price (token1 per token0) for a Q64.96 sqrt price.
///
/// price = (sqrtPriceX96 / 2^96)^2 * 10^(decimals0 - decimals1)
///
/// # Errors
/// Returns an error if the price does not fit in a `Decimal`.
pub fn sqrt_price_x96_to_price(
    sqrt_price_x96: U256,
    decimals0: u8,
    decimals1: u8,
) -> Result<Decimal, DomainError> {
    let sqrt_price = q96_to_decimal(sqrt_price_x96)?;
    let raw = sqrt_price
        .checked_mul(sqrt_price)
        .ok_or(DomainError::Overflow("sqrt_price_x96_to_price"))?;
    let adjust = pow10(i32::from(decimals0) - i32::from(decimals1))?;
    raw.checked_mul(adjust)
        .ok_or(DomainError::Overflow("sqrt_price_x96_to_price"))
}

/// Returns the human price (token1 per token0) at a given tick.
/// P = 1.0001 ^ tick / 10^(decimals1 - decimals0)
///
/// # Errors
/// Returns an error for ticks out of range or prices that do not fit in a `Decimal`.
pub fn tick_to_price(tick: i32, decimals0: u8, decimals1: u8) -> Result<Decimal, DomainError> {
    sqrt_price_x96_to_price(get_sqrt_ratio_at_tick(tick)?, decimals0, decimals1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tick_to_price() {
        // Tick 0 -> Price 1
        let p = tick_to_price(0, 18, 18).unwrap();
        assert_eq!(p, Decimal::ONE);

        // Tick 100 -> 1.0001^100 ~= 1.010049662
        let p100 = tick_to_price(100, 18, 18).unwrap();
        assert!((p100 - dec!(1.0100496620928)).abs() < dec!(0.000000001));
    }

    #[test]
    fn test_tick_to_price_adjusts_decimals() {
        // WETH (18) / USDC (6) around 3000 USDC per WETH
        let p = tick_to_price(-196_256, 18, 6).unwrap();
        assert!(p > dec!(2990) && p < dec!(3010), "got {p}");

        // inverted pair: USDC (6) / WETH (18)
        let inv = tick_to_price(196_256, 6, 18).unwrap();
        assert!((inv * p - Decimal::ONE).abs() < dec!(0.000001));
    }

    #[test]
    fn test_sqrt_price_matches_tick() {
        let sqrt = get_sqrt_ratio_at_tick(-1000).unwrap();
        let a = sqrt_price_x96_to_price(sqrt, 8, 8).unwrap();
        let b = tick_to_price(-1000, 8, 8).unwrap();
        assert_eq!(a, b);
    }
}
