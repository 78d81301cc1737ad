use serde::{Deserialize, Serialize};

/// Query of `GET /api/data`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataQuery {
    pub wallet_address: Option<String>,
}

/// Reply to a wallet without positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
