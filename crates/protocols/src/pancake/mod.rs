//! PancakeSwap v3 protocol adapter.
//!
//! This module provides functionality to read PancakeSwap v3 state:
//! - Enumerate owned and farmed positions
//! - Read position, pool and token state, optionally at a past block
//! - Recover the mint block and deposit of a position
//! - Scan position history logs in bounded batches

/// Chunked, rate limited batch execution.
pub mod batching;
/// Contract bindings.
pub mod bindings;
/// Chain reader over an alloy provider.
pub mod chain_reader;
/// Position history scanner.
pub mod event_scanner;

pub use batching::{BatchConfig, chunk_ranges, run_batched};
pub use chain_reader::{AlloyChainReader, ChainReader, MintRecord};
pub use event_scanner::{
    DecodedLog, EventScanner, LogKind, PositionLogSource, ScanOutcome, ScanRequest,
};

use alloy_primitives::{Address, address};

/// First block of MasterChef v3 on Base.
pub const MASTERCHEF_DEPLOY_BLOCK: u64 = 17_467_449;

/// Contract addresses of one deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    pub position_manager: Address,
    pub factory: Address,
    pub masterchef: Address,
    /// Farm emission token.
    pub reward_token: Address,
    /// Lowest block searched for farm deposits.
    pub masterchef_deploy_block: u64,
}

impl Deployment {
    /// PancakeSwap v3 on Base.
    #[must_use]
    pub const fn base() -> Self {
        Self {
            position_manager: address!("46A15B0b27311cedF172AB29E4f4766fbE7F4364"),
            factory: address!("0BFbCF9fa4f9C56B0F40a671Ad40E0805A091865"),
            masterchef: address!("C6A2Db661D5a5690172d8eB0a7DEA2d3008665A3"),
            reward_token: address!("3055913c90fcc1a6ce9a358911721eeb942013a1"),
            masterchef_deploy_block: MASTERCHEF_DEPLOY_BLOCK,
        }
    }
}

impl Default for Deployment {
    fn default() -> Self {
        Self::base()
    }
}

/// USDC on Base.
pub const BASE_USDC: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");
