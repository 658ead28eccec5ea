//! Stored configuration handlers.
//!
//! The configuration is a pretty-printed JSON file at `AppState::config_path`.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::io::ErrorKind;
use std::sync::Arc;

use crate::types::{ConfigData, ErrorResponse, SuccessResponse};
use crate::AppState;

/// Save the migration configuration.
#[utoipa::path(
    post,
    path = "/api/config",
    tag = "config",
    request_body = ConfigData,
    responses(
        (status = 200, description = "Configuration saved", body = SuccessResponse),
        (status = 500, description = "Configuration could not be written", body = ErrorResponse)
    )
)]
pub async fn save_config(
    State(state): State<Arc<AppState>>,
    Json(config): Json<ConfigData>,
) -> impl IntoResponse {
    let json = match serde_json::to_string_pretty(&config) {
        Ok(json) => json,
        Err(e) => {
            return ErrorResponse::new("Failed to save configuration", e.to_string())
                .with_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    };

    match tokio::fs::write(&state.config_path, json).await {
        Ok(()) => {
            tracing::info!(path = %state.config_path.display(), "Configuration saved");
            (
                StatusCode::OK,
                Json(SuccessResponse::ok("Configuration saved successfully")),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Error saving configuration");
            ErrorResponse::new("Failed to save configuration", e.to_string())
                .with_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Get the stored migration configuration.
#[utoipa::path(
    get,
    path = "/api/config",
    tag = "config",
    responses(
        (status = 200, description = "Stored configuration", body = ConfigData),
        (status = 404, description = "No configuration saved", body = ErrorResponse),
        (status = 500, description = "Configuration unreadable", body = ErrorResponse)
    )
)]
pub async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let contents = match tokio::fs::read_to_string(&state.config_path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return ErrorResponse::new("Configuration not found", e.to_string())
                .with_status(StatusCode::NOT_FOUND)
        }
        Err(e) => {
            return ErrorResponse::new("Failed to read configuration", e.to_string())
                .with_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    };

    match serde_json::from_str::<ConfigData>(&contents) {
        Ok(config) => (StatusCode::OK, Json(config)).into_response(),
        Err(e) => ErrorResponse::new("Failed to read configuration", e.to_string())
            .with_status(StatusCode::INTERNAL_SERVER_ERROR),
    }
}
