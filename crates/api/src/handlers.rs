use crate::error::ApiError;
use crate::models::{DataQuery, HealthResponse, MessageResponse};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
};
use tracing::info;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// `GET /api/data`: the wallet's portfolio report, or `{"message"}` when it holds
/// no open position.
///
/// # Errors
/// 400 for a missing or malformed wallet, 502 when the chain is unreachable.
pub async fn portfolio(
    State(state): State<AppState>,
    Query(query): Query<DataQuery>,
) -> Result<Response, ApiError> {
    let wallet = query
        .wallet_address
        .filter(|w| !w.trim().is_empty())
        .or_else(|| state.default_wallet.clone())
        .ok_or(ApiError::MissingWallet)?;

    info!(wallet = %wallet, "Portfolio requested");
    let report = state.reporter.report(&wallet).await?;
    if report.positions.is_empty()
        && let Some(message) = report.message
    {
        return Ok(Json(MessageResponse { message }).into_response());
    }
    Ok(Json(report).into_response())
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
