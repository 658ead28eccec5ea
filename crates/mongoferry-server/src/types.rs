//! Request/Response types for the mongoferry REST API.
//!
//! Bodies are camelCase JSON. Library types (connections, options, stats)
//! are documented as free-form objects in the OpenAPI document.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use mongoferry::{
    ConnectionConfig, DatabaseStats, MigrationOptions, MigrationProgress, MigrationStats,
};

// ============================================================================
// Configuration Types
// ============================================================================

/// Source, target and options of a migration.
///
/// Body of `POST /config` and `POST /migrate/start`, and the content of the
/// stored configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigData {
    /// Source deployment.
    #[schema(value_type = Object)]
    pub source: ConnectionConfig,
    /// Target deployment.
    #[schema(value_type = Object)]
    pub target: ConnectionConfig,
    /// Migration options. Omitted fields take their defaults.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub options: MigrationOptions,
}

// ============================================================================
// Analysis Types
// ============================================================================

/// Request to analyze a source deployment.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    /// Source deployment.
    #[schema(value_type = Object)]
    pub source: ConnectionConfig,
    /// Databases to analyze. Every non-system database when absent.
    #[serde(default)]
    #[schema(example = json!(["shop"]))]
    pub databases: Option<Vec<String>>,
}

/// Per-database analysis results.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnalyzeResponse {
    /// One entry per analyzed database.
    #[schema(value_type = Vec<Object>)]
    pub databases: Vec<DatabaseStats>,
}

// ============================================================================
// Migration Types
// ============================================================================

/// Response to a started migration.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartMigrationResponse {
    /// Always `true`.
    pub success: bool,
    /// Identifier for status polling and stop requests.
    pub migration_id: String,
    /// Human-readable message.
    pub message: String,
}

/// Live state of one migration.
///
/// Documented as a free-form object: the stats fields are flattened in.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStatusResponse {
    /// Migration identifier.
    pub migration_id: String,
    /// Counters, status and error records.
    #[serde(flatten)]
    pub stats: MigrationStats,
    /// Last progress snapshot, if any batch has been copied.
    pub progress: Option<MigrationProgress>,
}

// ============================================================================
// Generic Responses
// ============================================================================

/// Outcome of an operation without a payload.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable message.
    pub message: String,
}

impl SuccessResponse {
    /// Successful outcome with `message`.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// What the server was doing.
    #[schema(example = "Migration not found")]
    pub message: String,
    /// Underlying error.
    pub error: String,
}

impl ErrorResponse {
    /// Builds an error body.
    pub fn new(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: error.into(),
        }
    }

    /// Pairs the body with `status`.
    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// HTTP status for a library error.
pub fn status_for(error: &mongoferry::Error) -> StatusCode {
    match error {
        mongoferry::Error::InvalidValue { .. }
        | mongoferry::Error::Config(_)
        | mongoferry::Error::Connection { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
