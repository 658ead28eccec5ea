//! Source analysis handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use mongoferry::{analyze_databases, ConnectionManager};

use crate::types::{status_for, AnalyzeRequest, AnalyzeResponse, ErrorResponse};
use crate::AppState;

/// Analyze the source deployment.
#[utoipa::path(
    post,
    path = "/api/analyze",
    tag = "analyze",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Per-database statistics", body = AnalyzeResponse),
        (status = 400, description = "Invalid or unreachable source", body = ErrorResponse),
        (status = 500, description = "Analysis failed", body = ErrorResponse)
    )
)]
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    let mut connections = ConnectionManager::new(state.default_connector());
    let result = match connections.connect_source(&req.source).await {
        Ok(source) => analyze_databases(source.as_ref(), req.databases.as_deref()).await,
        Err(e) => Err(e),
    };
    connections.close().await;

    match result {
        Ok(databases) => (StatusCode::OK, Json(AnalyzeResponse { databases })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Analysis request failed");
            ErrorResponse::new("Analysis failed", e.to_string()).with_status(status_for(&e))
        }
    }
}
