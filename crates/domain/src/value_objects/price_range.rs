use crate::error::DomainError;
use crate::value_objects::price::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub lower_price: Price,
    pub upper_price: Price,
}

impl PriceRange {
    /// # Errors
    /// Returns an error unless `0 < lower < upper`.
    pub fn new(lower: Price, upper: Price) -> Result<Self, DomainError> {
        if lower.value <= Decimal::ZERO {
            return Err(DomainError::NonPositivePrice);
        }
        if lower.value >= upper.value {
            return Err(DomainError::InvalidPriceRange {
                lower: lower.value.to_string(),
                upper: upper.value.to_string(),
            });
        }
        Ok(Self {
            lower_price: lower,
            upper_price: upper,
        })
    }

    /// The same range seen from the other token.
    #[must_use]
    pub fn invert(&self) -> Self {
        Self {
            lower_price: self.upper_price.invert(),
            upper_price: self.lower_price.invert(),
        }
    }

    pub fn contains(&self, price: Price) -> bool {
        price.value >= self.lower_price.value && price.value <= self.upper_price.value
    }

    /// Where `price` sits inside the range, 0 at the lower bound and 100 at the upper, clamped.
    #[must_use]
    pub fn position_percent(&self, price: Price) -> Decimal {
        let width = self.upper_price.value - self.lower_price.value;
        let offset = (price.value - self.lower_price.value) / width * Decimal::ONE_HUNDRED;
        offset.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
    }

    /// Signed percent move from `price` to the lower bound.
    #[must_use]
    pub fn percent_to_lower(&self, price: Price) -> Option<Decimal> {
        percent_change(price.value, self.lower_price.value)
    }

    /// Signed percent move from `price` to the upper bound.
    #[must_use]
    pub fn percent_to_upper(&self, price: Price) -> Option<Decimal> {
        percent_change(price.value, self.upper_price.value)
    }
}

fn percent_change(from: Decimal, to: Decimal) -> Option<Decimal> {
    if from.is_zero() {
        return None;
    }
    Some((to - from) / from * Decimal::ONE_HUNDRED)
}
