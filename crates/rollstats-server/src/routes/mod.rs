//! HTTP route handlers.

pub mod rolls;
pub mod sheets;
pub mod stats;

use axum::http::StatusCode;
use axum::Json;
use rollstats_core::RollStatsError;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Map a core error to a response: bad input is the client's fault,
/// everything else is ours.
pub(crate) fn error_response(e: RollStatsError) -> (StatusCode, String) {
    let status = match &e {
        RollStatsError::InvalidInteger { .. }
        | RollStatsError::InvalidDice { .. }
        | RollStatsError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
        RollStatsError::CampaignNotFound(_) | RollStatsError::SheetNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(target: "rollstats::api", "Request failed: {}", e);
    }
    (status, e.to_string())
}
