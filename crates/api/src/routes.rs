use crate::handlers;
use crate::state::AppState;
use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/data", get(handlers::portfolio))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use clmm_yield_monitor::{MonitorError, PortfolioReport, PortfolioReporter};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    const WALLET: &str = "0x1111111111111111111111111111111111111111";

    struct FakeReporter;

    #[async_trait]
    impl PortfolioReporter for FakeReporter {
        async fn report(&self, owner: &str) -> Result<PortfolioReport, MonitorError> {
            match owner {
                WALLET => Ok(PortfolioReport::empty(owner, 10, 0, "No active positions")),
                "0xdead000000000000000000000000000000000000" => {
                    Err(MonitorError::Upstream("head block: timeout".into()))
                }
                "0xfull000000000000000000000000000000000000" => {
                    Ok(PortfolioReport::new(owner, 10, 0, Vec::new(), Vec::new()))
                }
                _ => Err(MonitorError::InvalidAddress(owner.to_string())),
            }
        }
    }

    fn app(default_wallet: Option<&str>) -> Router {
        let state = AppState::new(Arc::new(FakeReporter))
            .with_default_wallet(default_wallet.map(str::to_string));
        router(state)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(app(None), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_empty_wallet_returns_message() {
        let (status, body) = get_json(app(None), &format!("/api/data?wallet_address={WALLET}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "No active positions");
        assert!(body.get("positions").is_none());
    }

    #[tokio::test]
    async fn test_default_wallet_is_used() {
        let (status, body) = get_json(app(Some(WALLET)), "/api/data").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "No active positions");
    }

    #[tokio::test]
    async fn test_missing_wallet_is_bad_request() {
        let (status, body) = get_json(app(None), "/api/data").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "wallet_address is required");
    }

    #[tokio::test]
    async fn test_malformed_wallet_is_bad_request() {
        let (status, body) = get_json(app(None), "/api/data?wallet_address=0x12").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("0x12"));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_gateway() {
        let uri = "/api/data?wallet_address=0xdead000000000000000000000000000000000000";
        let (status, body) = get_json(app(None), uri).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("head block"));
    }

    #[tokio::test]
    async fn test_report_is_returned_as_json() {
        let uri = "/api/data?wallet_address=0xfull000000000000000000000000000000000000";
        let (status, body) = get_json(app(None), uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["head_block"], 10);
        assert_eq!(body["total_portfolio_value"], "$0.00");
        assert!(body["positions"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_index_page() {
        let response = app(None)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
