//! Connection test handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use mongoferry::{ConnectionConfig, ConnectionManager};

use crate::types::{status_for, ErrorResponse, SuccessResponse};
use crate::AppState;

/// Open, ping and close a deployment.
#[utoipa::path(
    post,
    path = "/api/connection/test",
    tag = "connection",
    request_body = Object,
    responses(
        (status = 200, description = "Deployment reachable", body = SuccessResponse),
        (status = 400, description = "Invalid URI or unreachable deployment", body = ErrorResponse)
    )
)]
pub async fn test_connection(
    State(state): State<Arc<AppState>>,
    Json(config): Json<ConnectionConfig>,
) -> impl IntoResponse {
    let mut connections = ConnectionManager::new(state.default_connector());
    let result = connections.connect_source(&config).await;
    connections.close().await;

    match result {
        Ok(_) => (StatusCode::OK, Json(SuccessResponse::ok("Connection successful"))).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Connection test failed");
            ErrorResponse::new("Connection failed", e.to_string()).with_status(status_for(&e))
        }
    }
}
