//! Impermanent loss of a concentrated liquidity position against holding its deposit.
//!
//! Prices are quote per base in token units. The position's virtual liquidity is
//! recovered from the initial deposit and then used to value the LP bundle at any price.

use crate::error::DomainError;
use crate::math::concentrated_liquidity::{
    amounts_at_price, liquidity_for_amount0, liquidity_for_amount1,
};
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Relative disagreement allowed between the two liquidity estimates (0.1%).
pub const LIQUIDITY_DIVERGENCE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Initial deposit and range of a position, oriented as quote per base.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IlInputs {
    /// Base tokens deposited at mint.
    pub base_deposit: Decimal,
    /// Quote tokens deposited at mint.
    pub quote_deposit: Decimal,
    /// Price at mint.
    pub entry_price: Decimal,
    pub price_lower: Decimal,
    pub price_upper: Decimal,
}

/// Virtual liquidity recovered from a deposit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityEstimate {
    pub from_base: Option<Decimal>,
    pub from_quote: Option<Decimal>,
    /// Average of the available estimates.
    pub liquidity: Decimal,
    /// Both estimates exist and differ by more than the tolerance.
    pub divergence_warning: bool,
}

/// LP value against hold value at one price, in quote units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IlPoint {
    pub price: Decimal,
    pub lp_value: Decimal,
    pub hold_value: Decimal,
    /// `lp_value - hold_value`.
    pub il_value: Decimal,
    /// `il_value / hold_value * 100`.
    pub il_percent: Decimal,
}

fn sqrt(value: Decimal) -> Result<Decimal, DomainError> {
    if value <= Decimal::ZERO {
        return Err(DomainError::NonPositivePrice);
    }
    value.sqrt().ok_or(DomainError::Overflow("sqrt"))
}

fn validate(inputs: &IlInputs) -> Result<(), DomainError> {
    if inputs.price_lower <= Decimal::ZERO || inputs.entry_price <= Decimal::ZERO {
        return Err(DomainError::NonPositivePrice);
    }
    if inputs.price_lower >= inputs.price_upper {
        return Err(DomainError::InvalidPriceRange {
            lower: inputs.price_lower.to_string(),
            upper: inputs.price_upper.to_string(),
        });
    }
    Ok(())
}

/// Recovers the position's liquidity from its initial deposit.
///
/// `L_base = x0 / (1/sqrt(P0) - 1/sqrt(Pb))` and `L_quote = y0 / (sqrt(P0) - sqrt(Pa))`,
/// with `P0` clamped into the range. An estimate exists only when its deposit and
/// denominator are positive, so a position minted out of range yields one estimate.
///
/// # Errors
/// Returns an error for invalid prices or on overflow.
pub fn estimate_liquidity(inputs: &IlInputs) -> Result<LiquidityEstimate, DomainError> {
    validate(inputs)?;

    let entry = inputs
        .entry_price
        .clamp(inputs.price_lower, inputs.price_upper);
    let sqrt_a = sqrt(inputs.price_lower)?;
    let sqrt_b = sqrt(inputs.price_upper)?;
    let sqrt_p = sqrt(entry)?;

    let from_base = if inputs.base_deposit > Decimal::ZERO && sqrt_p < sqrt_b {
        Some(liquidity_for_amount0(inputs.base_deposit, sqrt_p, sqrt_b)?)
    } else {
        None
    };
    let from_quote = if inputs.quote_deposit > Decimal::ZERO && sqrt_p > sqrt_a {
        Some(liquidity_for_amount1(inputs.quote_deposit, sqrt_a, sqrt_p)?)
    } else {
        None
    };

    let (liquidity, divergence_warning) = match (from_base, from_quote) {
        (Some(base), Some(quote)) => {
            let avg = (base + quote) / Decimal::TWO;
            let divergence = if avg.is_zero() {
                Decimal::ZERO
            } else {
                (base - quote).abs() / avg
            };
            let diverged = divergence > LIQUIDITY_DIVERGENCE_TOLERANCE;
            if diverged {
                warn!(
                    from_base = %base,
                    from_quote = %quote,
                    divergence = %divergence,
                    "Liquidity estimates diverge, using their average"
                );
            }
            (avg, diverged)
        }
        (Some(l), None) | (None, Some(l)) => (l, false),
        (None, None) => (Decimal::ZERO, false),
    };

    Ok(LiquidityEstimate {
        from_base,
        from_quote,
        liquidity,
        divergence_warning,
    })
}

/// Value in quote units of the LP bundle at `price`.
///
/// At or above the upper bound the bundle is all quote, `L(sqrt(Pb) - sqrt(Pa))`.
/// At or below the lower bound it is all base, `L(1/sqrt(Pa) - 1/sqrt(Pb))`, valued at `price`.
///
/// # Errors
/// Returns an error for invalid prices or on overflow.
pub fn lp_value_at(
    liquidity: Decimal,
    price: Decimal,
    price_lower: Decimal,
    price_upper: Decimal,
) -> Result<Decimal, DomainError> {
    let sqrt_a = sqrt(price_lower)?;
    let sqrt_b = sqrt(price_upper)?;
    let clamped = price.clamp(price_lower, price_upper);
    let (base, quote) = amounts_at_price(liquidity, sqrt(clamped)?, sqrt_a, sqrt_b)?;
    base.checked_mul(price)
        .and_then(|v| v.checked_add(quote))
        .ok_or(DomainError::Overflow("lp_value_at"))
}

/// Value in quote units of the untouched initial deposit at `price`.
pub fn hold_value_at(inputs: &IlInputs, price: Decimal) -> Result<Decimal, DomainError> {
    inputs
        .base_deposit
        .checked_mul(price)
        .and_then(|v| v.checked_add(inputs.quote_deposit))
        .ok_or(DomainError::Overflow("hold_value_at"))
}

/// Impermanent loss at `price` for the given liquidity estimate.
///
/// # Errors
/// Returns an error for invalid prices or on overflow.
pub fn impermanent_loss_at(
    inputs: &IlInputs,
    estimate: &LiquidityEstimate,
    price: Decimal,
) -> Result<IlPoint, DomainError> {
    validate(inputs)?;
    if price <= Decimal::ZERO {
        return Err(DomainError::NonPositivePrice);
    }

    let lp_value = lp_value_at(
        estimate.liquidity,
        price,
        inputs.price_lower,
        inputs.price_upper,
    )?;
    let hold_value = hold_value_at(inputs, price)?;
    let il_value = lp_value - hold_value;
    let il_percent = if hold_value.is_zero() {
        Decimal::ZERO
    } else {
        il_value / hold_value * Decimal::ONE_HUNDRED
    };

    Ok(IlPoint {
        price,
        lp_value,
        hold_value,
        il_value,
        il_percent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // L = 1000 over [1, 9] entered at 4:
    // x0 = 1000 * (1/2 - 1/3), y0 = 1000 * (2 - 1)
    fn straddling() -> IlInputs {
        IlInputs {
            base_deposit: dec!(1000) / dec!(6),
            quote_deposit: dec!(1000),
            entry_price: dec!(4),
            price_lower: dec!(1),
            price_upper: dec!(9),
        }
    }

    #[test]
    fn test_estimates_agree_for_straddling_deposit() {
        let est = estimate_liquidity(&straddling()).unwrap();
        let base = est.from_base.unwrap();
        let quote = est.from_quote.unwrap();
        assert!(((base - quote).abs() / quote) < LIQUIDITY_DIVERGENCE_TOLERANCE);
        assert!(!est.divergence_warning);
        assert!((est.liquidity - dec!(1000)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_divergent_deposit_is_flagged() {
        let mut inputs = straddling();
        inputs.quote_deposit = dec!(1100);
        let est = estimate_liquidity(&inputs).unwrap();
        assert!(est.divergence_warning);
        assert!(est.liquidity > dec!(1000) && est.liquidity < dec!(1100));
    }

    #[test]
    fn test_out_of_range_mint_has_single_estimate() {
        // entered below the range: deposit is all base
        let inputs = IlInputs {
            base_deposit: dec!(10),
            quote_deposit: Decimal::ZERO,
            entry_price: dec!(0.5),
            price_lower: dec!(1),
            price_upper: dec!(4),
        };
        let est = estimate_liquidity(&inputs).unwrap();
        assert!(est.from_quote.is_none());
        assert!(!est.divergence_warning);
        // 10 / (1/1 - 1/2) = 20
        assert!((est.liquidity - dec!(20)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_il_zero_at_entry_price() {
        let inputs = straddling();
        let est = estimate_liquidity(&inputs).unwrap();
        let point = impermanent_loss_at(&inputs, &est, inputs.entry_price).unwrap();
        assert!(point.il_value.abs() < dec!(0.000001));
        assert!(point.il_percent.abs() < dec!(0.000001));
    }

    #[test]
    fn test_il_at_bounds_is_negative() {
        let inputs = straddling();
        let est = estimate_liquidity(&inputs).unwrap();

        // upper bound: all quote, L * (3 - 1) = 2000 vs hold 166.67 * 9 + 1000 = 2500
        let upper = impermanent_loss_at(&inputs, &est, dec!(9)).unwrap();
        assert!((upper.lp_value - dec!(2000)).abs() < dec!(0.0001));
        assert!((upper.il_value - dec!(-500)).abs() < dec!(0.0001));
        assert!((upper.il_percent - dec!(-20)).abs() < dec!(0.0001));

        // lower bound: all base, L * (1 - 1/3) = 666.67 base at price 1
        let lower = impermanent_loss_at(&inputs, &est, dec!(1)).unwrap();
        assert!((lower.lp_value - dec!(666.666666)).abs() < dec!(0.001));
        assert!(lower.il_value < Decimal::ZERO);
    }

    #[test]
    fn test_rejects_invalid_range() {
        let mut inputs = straddling();
        inputs.price_upper = dec!(0.5);
        assert!(estimate_liquidity(&inputs).is_err());
    }
}
