use crate::error::DomainError;
use primitive_types::{U256, U512};

/// Computes `floor(a * b / denominator)` with a 512-bit intermediate product.
///
/// # Errors
/// Returns an error on a zero denominator or if the result does not fit in 256 bits.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256, DomainError> {
    if denominator.is_zero() {
        return Err(DomainError::DivisionByZero("mul_div"));
    }
    let product = a.full_mul(b);
    let quotient = product / U512::from(denominator);
    U256::try_from(quotient).map_err(|_| DomainError::Overflow("mul_div"))
}
