use crate::enums::QuoteSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Human readable price, token1 per token0 unless stated otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price {
    pub value: Decimal,
}

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Self {
        Self { value }
    }

    /// Reciprocal price. Zero stays zero.
    #[must_use]
    pub fn invert(&self) -> Self {
        if self.value.is_zero() {
            return Self::new(Decimal::ZERO);
        }
        Self::new(Decimal::ONE / self.value)
    }

    /// Expresses a token1-per-token0 price in units of the quote token.
    #[must_use]
    pub fn in_quote(&self, quote: QuoteSide) -> Self {
        match quote {
            QuoteSide::Token1 => *self,
            QuoteSide::Token0 => self.invert(),
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_in_quote_inverts_for_token0() {
        let p = Price::new(dec!(4));
        assert_eq!(p.in_quote(QuoteSide::Token1), p);
        assert_eq!(p.in_quote(QuoteSide::Token0).value, dec!(0.25));
        assert_eq!(Price::new(Decimal::ZERO).invert().value, Decimal::ZERO);
    }

    #[test]
    fn test_display_is_normalized() {
        assert_eq!(Price::new(dec!(1.500)).to_string(), "1.5");
    }
}
