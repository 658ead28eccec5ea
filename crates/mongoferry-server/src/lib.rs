#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::unused_async)]
#![allow(clippy::needless_for_each)]
//! mongoferry Server - REST API for running MongoDB migrations.
//!
//! This module provides the HTTP handlers, types and migration store behind
//! the mongoferry REST API.
//!
//! ## OpenAPI Documentation
//!
//! The API is documented using OpenAPI 3.0. Access the interactive documentation at:
//! - Swagger UI: `GET /swagger-ui`
//! - OpenAPI JSON: `GET /api-docs/openapi.json`

mod handlers;
mod store;
mod types;

use axum::{
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use utoipa::OpenApi;

use mongoferry::{Connector, MigrationOptions, MongoConnector};

// Re-export types for external use
pub use store::{InMemoryMigrationStore, MigrationRecord, MigrationStore};
pub use types::*;

// Re-export handlers for routing
pub use handlers::migrate::STATUS_SYNC_INTERVAL;
pub use handlers::{
    analyze, get_config, health_check, list_migrations, migration_status, save_config,
    start_migration, stop_migration, test_connection,
};

// ============================================================================
// OpenAPI Documentation
// ============================================================================

/// mongoferry API Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "mongoferry API",
        version = "1.0.0",
        description = "Analyze MongoDB deployments and copy documents, indexes and \
            collection metadata from a source deployment to a target.",
        license(name = "MIT")
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "connection", description = "Connection testing"),
        (name = "analyze", description = "Source analysis"),
        (name = "config", description = "Stored migration configuration"),
        (name = "migrate", description = "Migration lifecycle")
    ),
    paths(
        handlers::health::health_check,
        handlers::connection::test_connection,
        handlers::analyze::analyze,
        handlers::config::save_config,
        handlers::config::get_config,
        handlers::migrate::start_migration,
        handlers::migrate::migration_status,
        handlers::migrate::stop_migration,
        handlers::migrate::list_migrations
    ),
    components(
        schemas(
            ConfigData,
            AnalyzeRequest,
            AnalyzeResponse,
            StartMigrationResponse,
            SuccessResponse,
            ErrorResponse
        )
    )
)]
pub struct ApiDoc;

// ============================================================================
// Application State
// ============================================================================

/// Builds the connector for one request from its driver request timeout.
pub type ConnectorFactory = Arc<dyn Fn(Duration) -> Arc<dyn Connector> + Send + Sync>;

/// Application state shared across handlers.
pub struct AppState {
    /// Opens deployments for requests and migration tasks.
    pub connectors: ConnectorFactory,
    /// Migration records.
    pub store: Arc<dyn MigrationStore>,
    /// JSON file behind `GET/POST /api/config`.
    pub config_path: PathBuf,
}

impl AppState {
    /// State with an empty in-memory migration store.
    pub fn new(connectors: ConnectorFactory, config_path: impl Into<PathBuf>) -> Self {
        Self {
            connectors,
            store: Arc::new(InMemoryMigrationStore::new()),
            config_path: config_path.into(),
        }
    }

    /// State that reaches real deployments through the MongoDB driver.
    pub fn with_mongo(config_path: impl Into<PathBuf>) -> Self {
        Self::new(
            Arc::new(|timeout: Duration| {
                Arc::new(MongoConnector::new(timeout)) as Arc<dyn Connector>
            }),
            config_path,
        )
    }

    /// Connector applying `request_timeout`.
    pub fn connector(&self, request_timeout: Duration) -> Arc<dyn Connector> {
        (self.connectors)(request_timeout)
    }

    /// Connector for requests that carry no options.
    pub fn default_connector(&self) -> Arc<dyn Connector> {
        self.connector(MigrationOptions::default().request_timeout())
    }
}

/// Every `/api` route, bound to `state`.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/connection/test", post(test_connection))
        .route("/api/analyze", post(analyze))
        .route("/api/config", get(get_config).post(save_config))
        .route("/api/migrate", get(list_migrations))
        .route("/api/migrate/start", post(start_migration))
        .route("/api/migrate/status/{id}", get(migration_status))
        .route("/api/migrate/stop/{id}", post(stop_migration))
        .with_state(state)
}

// ============================================================================
// Tests
// ============================================================================
