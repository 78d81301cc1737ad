use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A percentage value, `5` meaning 5%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Percentage(pub Decimal);

impl Percentage {
    /// From a pool fee tier in hundredths of a basis point (500 -> 0.05%).
    #[must_use]
    pub fn from_fee_tier(fee_tier: u32) -> Self {
        Self(Decimal::from(fee_tier) / Decimal::from(10_000))
    }

    /// `part / whole * 100`, `None` when `whole` is zero.
    #[must_use]
    pub fn of(part: Decimal, whole: Decimal) -> Option<Self> {
        if whole.is_zero() {
            return None;
        }
        part.checked_div(whole)
            .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
            .map(Self)
    }

    #[must_use]
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.round_dp(2).normalize())
    }
}
