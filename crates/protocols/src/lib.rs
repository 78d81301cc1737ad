//! Upstream data adapters.
//!
//! - [`pancake`]: PancakeSwap v3 position manager, pools and MasterChef over JSON-RPC
//! - [`subgraph`]: staked position index over GraphQL
//! - [`prices`]: USD token prices

pub mod pancake;
pub mod prices;
pub mod subgraph;
