//! Conversions from on-chain integers into `Decimal`.

use crate::error::DomainError;
use primitive_types::U256;
use rust_decimal::Decimal;

/// Largest mantissa a `Decimal` can hold (2^96 - 1).
const MAX_MANTISSA: u128 = (1u128 << 96) - 1;
const MAX_SCALE: u32 = 28;

fn from_mantissa(mantissa: U256, scale: u32) -> Result<Decimal, DomainError> {
    let m = i128::try_from(mantissa.low_u128()).map_err(|_| DomainError::Overflow("decimal"))?;
    Ok(Decimal::from_i128_with_scale(m, scale))
}

/// Converts a raw token amount to token units.
///
/// Digits beyond what a `Decimal` can represent are truncated.
///
/// # Errors
/// Returns an error if the integer part does not fit in a `Decimal`.
pub fn raw_to_decimal(raw: U256, decimals: u8) -> Result<Decimal, DomainError> {
    let max = U256::from(MAX_MANTISSA);
    let mut mantissa = raw;
    let mut scale = u32::from(decimals);

    while mantissa > max || scale > MAX_SCALE {
        if scale == 0 {
            return Err(DomainError::Overflow("raw_to_decimal"));
        }
        mantissa /= U256::from(10);
        scale -= 1;
    }
    from_mantissa(mantissa, scale)
}

/// Converts a Q64.96 fixed point number to a `Decimal` at the highest precision that fits.
///
/// # Errors
/// Returns an error if the integer part does not fit in a `Decimal`.
pub fn q96_to_decimal(value: U256) -> Result<Decimal, DomainError> {
    let max = U256::from(MAX_MANTISSA);
    for scale in (0..=MAX_SCALE).rev() {
        let Some(scaled) = value.checked_mul(U256::exp10(scale as usize)) else {
            continue;
        };
        let mantissa = scaled >> 96;
        if mantissa <= max {
            return from_mantissa(mantissa, scale);
        }
    }
    Err(DomainError::Overflow("q96_to_decimal"))
}

/// Returns `10^exp` for `exp` in `[-28, 28]`.
///
/// # Errors
/// Returns an error outside that range.
pub fn pow10(exp: i32) -> Result<Decimal, DomainError> {
    if exp.unsigned_abs() > MAX_SCALE {
        return Err(DomainError::Overflow("pow10"));
    }
    if exp >= 0 {
        Ok(Decimal::from_i128_with_scale(10i128.pow(exp.unsigned_abs()), 0))
    } else {
        Ok(Decimal::new(1, exp.unsigned_abs()))
    }
}
