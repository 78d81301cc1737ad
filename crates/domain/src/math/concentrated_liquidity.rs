use crate::error::DomainError;
use crate::math::sqrt_price_math::{get_amount0_delta, get_amount1_delta};
use crate::math::tick_math::get_sqrt_ratio_at_tick;
use primitive_types::U256;
use rust_decimal::Decimal;

fn ordered(sqrt_price_a: Decimal, sqrt_price_b: Decimal) -> (Decimal, Decimal) {
    if sqrt_price_a < sqrt_price_b {
        (sqrt_price_a, sqrt_price_b)
    } else {
        (sqrt_price_b, sqrt_price_a)
    }
}

/// Raw token amounts held by `liquidity` in `[tick_lower, tick_upper)` at the pool's price.
///
/// Below the range the position is all token0, above it all token1.
///
/// # Errors
/// Returns an error for invalid ticks or on overflow.
pub fn position_amounts(
    tick_current: i32,
    sqrt_price_x96: U256,
    tick_lower: i32,
    tick_upper: i32,
    liquidity: u128,
) -> Result<(U256, U256), DomainError> {
    let sqrt_lower = get_sqrt_ratio_at_tick(tick_lower)?;
    let sqrt_upper = get_sqrt_ratio_at_tick(tick_upper)?;

    if tick_current < tick_lower {
        Ok((
            get_amount0_delta(sqrt_lower, sqrt_upper, liquidity)?,
            U256::zero(),
        ))
    } else if tick_current < tick_upper {
        Ok((
            get_amount0_delta(sqrt_price_x96, sqrt_upper, liquidity)?,
            get_amount1_delta(sqrt_lower, sqrt_price_x96, liquidity)?,
        ))
    } else {
        Ok((
            U256::zero(),
            get_amount1_delta(sqrt_lower, sqrt_upper, liquidity)?,
        ))
    }
}

/// Amount of base token (x) for liquidity between two sqrt prices.
/// delta_x = L * (1/sqrt(P_a) - 1/sqrt(P_b))
pub fn amount0_delta(
    liquidity: Decimal,
    sqrt_price_a: Decimal,
    sqrt_price_b: Decimal,
) -> Result<Decimal, DomainError> {
    let (lower, upper) = ordered(sqrt_price_a, sqrt_price_b);
    if lower <= Decimal::ZERO {
        return Err(DomainError::NonPositivePrice);
    }
    let den = lower
        .checked_mul(upper)
        .ok_or(DomainError::Overflow("amount0_delta"))?;
    let factor = (upper - lower) / den;
    liquidity
        .checked_mul(factor)
        .ok_or(DomainError::Overflow("amount0_delta"))
}

/// Amount of quote token (y) for liquidity between two sqrt prices.
/// delta_y = L * (sqrt(P_b) - sqrt(P_a))
pub fn amount1_delta(
    liquidity: Decimal,
    sqrt_price_a: Decimal,
    sqrt_price_b: Decimal,
) -> Result<Decimal, DomainError> {
    let (lower, upper) = ordered(sqrt_price_a, sqrt_price_b);
    liquidity
        .checked_mul(upper - lower)
        .ok_or(DomainError::Overflow("amount1_delta"))
}

/// Calculates liquidity for a given amount of token0 and price range
/// L = amount0 * (sqrt(P_a) * sqrt(P_b)) / (sqrt(P_b) - sqrt(P_a))
pub fn liquidity_for_amount0(
    amount0: Decimal,
    sqrt_price_a: Decimal,
    sqrt_price_b: Decimal,
) -> Result<Decimal, DomainError> {
    let (lower, upper) = ordered(sqrt_price_a, sqrt_price_b);
    let den = upper - lower;
    if den.is_zero() {
        return Err(DomainError::DivisionByZero("liquidity_for_amount0"));
    }
    let num = amount0
        .checked_mul(lower)
        .and_then(|v| v.checked_mul(upper))
        .ok_or(DomainError::Overflow("liquidity_for_amount0"))?;
    Ok(num / den)
}

/// Calculates liquidity for a given amount of token1 and price range
/// L = amount1 / (sqrt(P_b) - sqrt(P_a))
pub fn liquidity_for_amount1(
    amount1: Decimal,
    sqrt_price_a: Decimal,
    sqrt_price_b: Decimal,
) -> Result<Decimal, DomainError> {
    let (lower, upper) = ordered(sqrt_price_a, sqrt_price_b);
    let den = upper - lower;
    if den.is_zero() {
        return Err(DomainError::DivisionByZero("liquidity_for_amount1"));
    }
    amount1
        .checked_div(den)
        .ok_or(DomainError::Overflow("liquidity_for_amount1"))
}

/// Token amounts held by `liquidity` at `sqrt_price` within `[sqrt_lower, sqrt_upper]`.
pub fn amounts_at_price(
    liquidity: Decimal,
    sqrt_price: Decimal,
    sqrt_lower: Decimal,
    sqrt_upper: Decimal,
) -> Result<(Decimal, Decimal), DomainError> {
    if sqrt_price <= sqrt_lower {
        Ok((amount0_delta(liquidity, sqrt_lower, sqrt_upper)?, Decimal::ZERO))
    } else if sqrt_price >= sqrt_upper {
        Ok((Decimal::ZERO, amount1_delta(liquidity, sqrt_lower, sqrt_upper)?))
    } else {
        Ok((
            amount0_delta(liquidity, sqrt_price, sqrt_upper)?,
            amount1_delta(liquidity, sqrt_lower, sqrt_price)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_deltas() {
        // Liquidity 1000, sqrt price 1 -> 2
        // delta_y = 1000 * (2 - 1) = 1000
        // delta_x = 1000 * (1/1 - 1/2) = 500
        let dy = amount1_delta(dec!(1000), dec!(1), dec!(2)).unwrap();
        assert_eq!(dy, dec!(1000));
        let dx = amount0_delta(dec!(1000), dec!(1), dec!(2)).unwrap();
        assert_eq!(dx, dec!(500));
    }

    #[test]
    fn test_get_liquidity() {
        let l = liquidity_for_amount0(dec!(500), dec!(1), dec!(2)).unwrap();
        assert_eq!(l, dec!(1000));
        let l2 = liquidity_for_amount1(dec!(1000), dec!(1), dec!(2)).unwrap();
        assert_eq!(l2, dec!(1000));
        assert!(liquidity_for_amount1(dec!(1), dec!(2), dec!(2)).is_err());
    }

    #[test]
    fn test_amounts_at_price_cases() {
        let (x, y) = amounts_at_price(dec!(1000), dec!(0.5), dec!(1), dec!(2)).unwrap();
        assert_eq!((x, y), (dec!(500), Decimal::ZERO));

        let (x, y) = amounts_at_price(dec!(1000), dec!(3), dec!(1), dec!(2)).unwrap();
        assert_eq!((x, y), (Decimal::ZERO, dec!(1000)));

        let (x, y) = amounts_at_price(dec!(1000), dec!(1.25), dec!(1), dec!(2)).unwrap();
        assert_eq!(x, dec!(300));
        assert_eq!(y, dec!(250));
    }

    #[test]
    fn test_position_amounts_by_range_case() {
        let liquidity = 1_000_000_000_000_000_000u128;
        let at = |tick: i32| get_sqrt_ratio_at_tick(tick).unwrap();

        // below range: only token0
        let (a0, a1) = position_amounts(-120, at(-120), -60, 60, liquidity).unwrap();
        assert!(!a0.is_zero());
        assert!(a1.is_zero());

        // above range: only token1
        let (a0, a1) = position_amounts(120, at(120), -60, 60, liquidity).unwrap();
        assert!(a0.is_zero());
        assert!(!a1.is_zero());

        // centred: roughly equal raw amounts at price 1
        let (a0, a1) = position_amounts(0, at(0), -60, 60, liquidity).unwrap();
        let diff = if a0 > a1 { a0 - a1 } else { a1 - a0 };
        assert!(diff <= U256::from(10), "a0={a0} a1={a1}");
    }
}
