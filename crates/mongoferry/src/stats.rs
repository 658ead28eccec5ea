//! Migration statistics and progress snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    /// Copy in progress.
    #[default]
    Running,
    /// Finished normally (also for dry runs).
    Completed,
    /// Ended by an unhandled error.
    Failed,
    /// Ended by a stop request.
    Stopped,
}

impl MigrationStatus {
    /// Whether the migration has ended.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Category of a recorded error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// An index could not be copied.
    CreateIndex,
    /// A batch write failed fully or partially.
    Insert,
    /// The run was aborted.
    Unhandled,
}

/// One non-fatal (or the final fatal) error of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    /// Category.
    pub kind: ErrorKind,
    /// Affected namespace, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Description.
    pub message: String,
}

impl ErrorRecord {
    /// Creates a record.
    pub fn new(kind: ErrorKind, namespace: Option<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            namespace,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Aggregate counters of one migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStats {
    /// When the run started.
    pub start_time: DateTime<Utc>,
    /// When the run ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Wall-clock duration, set together with `end_time`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_time_ms: Option<u64>,
    /// Databases analyzed.
    pub total_databases: u64,
    /// Collections passing the eligibility filter.
    pub total_collections: u64,
    /// Documents in the analyzed databases.
    pub total_documents: u64,
    /// Documents written to the target.
    pub migrated_documents: u64,
    /// Documents that could not be written.
    pub failed_documents: u64,
    /// Errors in the order they happened.
    pub errors: Vec<ErrorRecord>,
    /// Lifecycle state.
    pub status: MigrationStatus,
}

impl Default for MigrationStats {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationStats {
    /// Creates running stats starting now.
    pub fn new() -> Self {
        Self {
            start_time: Utc::now(),
            end_time: None,
            elapsed_time_ms: None,
            total_databases: 0,
            total_collections: 0,
            total_documents: 0,
            migrated_documents: 0,
            failed_documents: 0,
            errors: Vec::new(),
            status: MigrationStatus::Running,
        }
    }

    /// Sets the terminal status and the end time.
    pub fn finish(&mut self, status: MigrationStatus) {
        let end = Utc::now();
        let elapsed = (end - self.start_time).num_milliseconds().max(0);
        self.end_time = Some(end);
        self.elapsed_time_ms = Some(u64::try_from(elapsed).unwrap_or(0));
        self.status = status;
    }

    /// Elapsed seconds, for summaries.
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_time_ms.unwrap_or(0) as f64 / 1000.0
    }
}

/// Progress of the collection being copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationProgress {
    /// Source database.
    pub database: String,
    /// Collection.
    pub collection: String,
    /// Documents counted before the copy started.
    pub total_documents: u64,
    /// Documents attempted so far.
    pub processed_documents: u64,
    /// Rounded percentage of `processed_documents`.
    pub percentage: u32,
}

impl MigrationProgress {
    /// Builds a snapshot, computing the percentage.
    pub fn new(database: &str, collection: &str, total: u64, processed: u64) -> Self {
        Self {
            database: database.to_string(),
            collection: collection.to_string(),
            total_documents: total,
            processed_documents: processed,
            percentage: percentage(processed, total),
        }
    }
}

/// `round(processed / total * 100)`, or 100 for an empty collection.
pub fn percentage(processed: u64, total: u64) -> u32 {
    if total == 0 {
        return 100;
    }
    ((processed as f64 / total as f64) * 100.0).round() as u32
}
