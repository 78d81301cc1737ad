//! HTTP surface of the yield monitor.
//!
//! - `GET /api/data?wallet_address=` returns the wallet's portfolio report
//! - `GET /health` is a liveness probe
//! - `GET /` serves the dashboard page

/// Error types.
pub mod error;
/// Request handlers.
pub mod handlers;
/// API request/response models.
pub mod models;
/// Route definitions.
pub mod routes;
/// Server configuration and startup.
pub mod server;
/// Application state.
pub mod state;

pub use error::ApiError;
pub use routes::router;
pub use server::{ApiServer, ServerConfig};
pub use state::AppState;
