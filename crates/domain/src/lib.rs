//! Domain model and valuation math for concentrated liquidity positions.
//!
//! This crate is free of I/O. It provides:
//! - Position, pool, event and mint snapshot entities
//! - Exact tick and sqrt-price integer math
//! - Uncollected fee accounting from fee growth accumulators
//! - Impermanent loss, breakeven and yield metrics
//! - The valuation engine combining all of the above

/// Position, pool and event entities.
pub mod entities;
/// Shared enumerations.
pub mod enums;
/// Domain error type.
pub mod error;
/// Integer and decimal math for ticks, liquidity and fees.
pub mod math;
/// Impermanent loss and yield metrics.
pub mod metrics;
/// Valuation engine.
pub mod valuation;
/// Small value types.
pub mod value_objects;

pub use error::DomainError;
