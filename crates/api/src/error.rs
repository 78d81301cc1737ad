use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use clmm_yield_monitor::MonitorError;
use thiserror::Error;
use tracing::error;

/// Errors returned to HTTP clients as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("wallet_address is required")]
    MissingWallet,
    #[error("{0}")]
    BadRequest(String),
    /// A blockchain or price upstream could not be reached.
    #[error("{0}")]
    Upstream(String),
    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingWallet | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        match err {
            MonitorError::InvalidAddress(_) => Self::BadRequest(err.to_string()),
            MonitorError::Upstream(_) => Self::Upstream(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Internal(detail) = &self {
            error!(detail = %detail, "Request failed");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_errors_map_to_status() {
        let bad: ApiError = MonitorError::InvalidAddress("0x12".into()).into();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let upstream: ApiError = MonitorError::Upstream("head block: timeout".into()).into();
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(upstream.to_string(), "upstream unavailable: head block: timeout");
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let err = ApiError::Internal("disk full".into());
        assert_eq!(err.to_string(), "internal error");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
