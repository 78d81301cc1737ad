//! Errors raised by domain math and entity construction.

use thiserror::Error;

/// Error type for the domain crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Tick outside `[MIN_TICK, MAX_TICK]`.
    #[error("tick {0} is outside the supported range")]
    TickOutOfRange(i32),
    /// Lower tick is not strictly below the upper tick.
    #[error("invalid tick range: lower {lower} must be below upper {upper}")]
    InvalidTickRange {
        /// Lower tick.
        lower: i32,
        /// Upper tick.
        upper: i32,
    },
    /// An intermediate value overflowed.
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
    /// A denominator was zero.
    #[error("division by zero in {0}")]
    DivisionByZero(&'static str),
    /// Price inputs must be strictly positive.
    #[error("price must be positive")]
    NonPositivePrice,
    /// Invalid price range bounds.
    #[error("invalid price range: lower {lower} must be below upper {upper}")]
    InvalidPriceRange {
        /// Lower bound.
        lower: String,
        /// Upper bound.
        upper: String,
    },
}
