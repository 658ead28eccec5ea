//! Migration handlers.
//!
//! `start_migration` spawns a task per migration. The task mirrors progress
//! and stats into the store and polls it for stop requests.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info};

use mongoferry::{
    ConnectionManager, ErrorKind, ErrorRecord, MigrationStats, MigrationStatus, Migrator,
};

use crate::store::MigrationRecord;
use crate::types::{
    ConfigData, ErrorResponse, MigrationStatusResponse, StartMigrationResponse, SuccessResponse,
};
use crate::AppState;

/// How often a running task mirrors stats and checks for stop requests.
pub const STATUS_SYNC_INTERVAL: Duration = Duration::from_millis(200);

impl From<MigrationRecord> for MigrationStatusResponse {
    fn from(record: MigrationRecord) -> Self {
        Self {
            migration_id: record.id,
            stats: record.stats,
            progress: record.progress,
        }
    }
}

/// Start a migration in the background.
#[utoipa::path(
    post,
    path = "/api/migrate/start",
    tag = "migrate",
    request_body = ConfigData,
    responses(
        (status = 200, description = "Migration started", body = StartMigrationResponse),
        (status = 400, description = "Invalid options", body = ErrorResponse)
    )
)]
pub async fn start_migration(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConfigData>,
) -> impl IntoResponse {
    if let Err(e) = req.options.validate() {
        return ErrorResponse::new("Failed to start migration", e.to_string())
            .with_status(StatusCode::BAD_REQUEST);
    }

    let migration_id = state.store.create().await;
    info!(migration_id = %migration_id, "Migration started");
    tokio::spawn(run_migration(Arc::clone(&state), migration_id.clone(), req));

    (
        StatusCode::OK,
        Json(StartMigrationResponse {
            success: true,
            migration_id,
            message: "Migration started".to_string(),
        }),
    )
        .into_response()
}

/// Get the status of a migration.
#[utoipa::path(
    get,
    path = "/api/migrate/status/{id}",
    tag = "migrate",
    params(
        ("id" = String, Path, description = "Migration identifier")
    ),
    responses(
        (status = 200, description = "Migration status", body = Object),
        (status = 404, description = "Unknown migration", body = ErrorResponse)
    )
)]
pub async fn migration_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get(&id).await {
        Some(record) => (StatusCode::OK, Json(MigrationStatusResponse::from(record))).into_response(),
        None => not_found(&id),
    }
}

/// Request a cooperative stop.
#[utoipa::path(
    post,
    path = "/api/migrate/stop/{id}",
    tag = "migrate",
    params(
        ("id" = String, Path, description = "Migration identifier")
    ),
    responses(
        (status = 200, description = "Stop requested", body = SuccessResponse),
        (status = 404, description = "Unknown migration", body = ErrorResponse)
    )
)]
pub async fn stop_migration(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if !state.store.request_stop(&id).await {
        return not_found(&id);
    }
    info!(migration_id = %id, "Migration stop requested");
    (
        StatusCode::OK,
        Json(SuccessResponse::ok("Migration stop requested")),
    )
        .into_response()
}

/// List every migration started since the server came up.
#[utoipa::path(
    get,
    path = "/api/migrate",
    tag = "migrate",
    responses(
        (status = 200, description = "All migrations, oldest first", body = Vec<Object>)
    )
)]
pub async fn list_migrations(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let migrations: Vec<MigrationStatusResponse> = state
        .store
        .list()
        .await
        .into_iter()
        .map(MigrationStatusResponse::from)
        .collect();
    Json(migrations)
}

fn not_found(id: &str) -> axum::response::Response {
    ErrorResponse::new("Migration not found", format!("no migration with id {id}"))
        .with_status(StatusCode::NOT_FOUND)
}

/// Body of the task spawned by `start_migration`.
pub(crate) async fn run_migration(state: Arc<AppState>, id: String, request: ConfigData) {
    let connector = state.connector(request.options.request_timeout());
    let mut connections = ConnectionManager::new(connector);
    let (source, target) = match connections.connect(&request.source, &request.target).await {
        Ok(handles) => handles,
        Err(e) => {
            error!(migration_id = %id, error = %e, "Migration could not connect");
            record_failure(&state, &id, e.to_string()).await;
            return;
        }
    };

    let mut migrator = match Migrator::new(source, target, request.options) {
        Ok(migrator) => migrator,
        Err(e) => {
            connections.close().await;
            record_failure(&state, &id, e.to_string()).await;
            return;
        }
    };

    let mut progress = migrator.subscribe();
    let stats_rx = migrator.watch_stats();
    let stop = migrator.stop_handle();
    let mut ticker = tokio::time::interval(STATUS_SYNC_INTERVAL);

    let run = migrator.migrate();
    tokio::pin!(run);
    let stats = loop {
        tokio::select! {
            stats = &mut run => break stats,
            received = progress.recv() => match received {
                Ok(snapshot) => {
                    state.store.update_progress(&id, snapshot).await;
                }
                Err(RecvError::Lagged(_) | RecvError::Closed) => {}
            },
            _ = ticker.tick() => {
                let snapshot = stats_rx.borrow().clone();
                state.store.update_stats(&id, snapshot).await;
                if state.store.stop_requested(&id).await {
                    stop.stop();
                }
            }
        }
    };

    while let Ok(snapshot) = progress.try_recv() {
        state.store.update_progress(&id, snapshot).await;
    }
    state.store.update_stats(&id, stats.clone()).await;
    connections.close().await;
    info!(migration_id = %id, status = %stats.status, "Migration task finished");
}

async fn record_failure(state: &AppState, id: &str, message: String) {
    let mut stats = match state.store.get(id).await {
        Some(record) => record.stats,
        None => MigrationStats::new(),
    };
    stats
        .errors
        .push(ErrorRecord::new(ErrorKind::Unhandled, None, message));
    stats.finish(MigrationStatus::Failed);
    state.store.update_stats(id, stats).await;
}
