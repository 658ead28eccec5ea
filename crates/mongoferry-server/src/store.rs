//! Migration records shared between request handlers and migration tasks.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use mongoferry::{MigrationProgress, MigrationStats};

/// State of one migration started through the API.
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    /// Migration identifier (UUID v4).
    pub id: String,
    /// Latest stats snapshot.
    pub stats: MigrationStats,
    /// Latest progress snapshot.
    pub progress: Option<MigrationProgress>,
    /// Set once a client asked the migration to stop.
    pub stop_requested: bool,
}

/// Storage for migration records.
///
/// Update methods return `false` when the identifier is unknown.
#[async_trait]
pub trait MigrationStore: Send + Sync {
    /// Creates a running record and returns its identifier.
    async fn create(&self) -> String;

    /// Returns a copy of the record.
    async fn get(&self, id: &str) -> Option<MigrationRecord>;

    /// Replaces the stats snapshot.
    async fn update_stats(&self, id: &str, stats: MigrationStats) -> bool;

    /// Replaces the progress snapshot.
    async fn update_progress(&self, id: &str, progress: MigrationProgress) -> bool;

    /// Flags the migration for a cooperative stop.
    async fn request_stop(&self, id: &str) -> bool;

    /// Whether a stop was requested.
    async fn stop_requested(&self, id: &str) -> bool;

    /// Every record, oldest first.
    async fn list(&self) -> Vec<MigrationRecord>;
}

/// Process-local store. Records live until the server exits.
#[derive(Debug, Default)]
pub struct InMemoryMigrationStore {
    records: RwLock<HashMap<String, MigrationRecord>>,
}

impl InMemoryMigrationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MigrationStore for InMemoryMigrationStore {
    async fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let record = MigrationRecord {
            id: id.clone(),
            stats: MigrationStats::new(),
            progress: None,
            stop_requested: false,
        };
        self.records.write().await.insert(id.clone(), record);
        id
    }

    async fn get(&self, id: &str) -> Option<MigrationRecord> {
        self.records.read().await.get(id).cloned()
    }

    async fn update_stats(&self, id: &str, stats: MigrationStats) -> bool {
        match self.records.write().await.get_mut(id) {
            Some(record) => {
                record.stats = stats;
                true
            }
            None => false,
        }
    }

    async fn update_progress(&self, id: &str, progress: MigrationProgress) -> bool {
        match self.records.write().await.get_mut(id) {
            Some(record) => {
                record.progress = Some(progress);
                true
            }
            None => false,
        }
    }

    async fn request_stop(&self, id: &str) -> bool {
        match self.records.write().await.get_mut(id) {
            Some(record) => {
                record.stop_requested = true;
                true
            }
            None => false,
        }
    }

    async fn stop_requested(&self, id: &str) -> bool {
        self.records
            .read()
            .await
            .get(id)
            .is_some_and(|record| record.stop_requested)
    }

    async fn list(&self) -> Vec<MigrationRecord> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by_key(|record| record.stats.start_time);
        records
    }
}
