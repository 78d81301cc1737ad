//! Wallet level yield and impermanent loss reports for PancakeSwap v3 positions.
//!
//! [`PortfolioMonitor`] ties the chain reader, the event scanner, the price source
//! and the snapshot cache together and renders a [`PortfolioReport`] per wallet.

/// Configuration from the environment.
pub mod config;
mod error;
/// Display formatting.
pub mod format;
/// Report orchestration.
pub mod monitor;
/// Report models.
pub mod report;
/// Mint snapshot cache.
pub mod snapshot;

pub use config::{ConfigError, MonitorConfig};
pub use error::MonitorError;
pub use monitor::{MonitorSettings, PortfolioMonitor, PortfolioReporter};
pub use report::{PortfolioReport, PositionReport, SkippedPosition};
