//! Migration engine.
//!
//! Walks the analyzed databases in order and, for every eligible collection,
//! copies the indexes and then the documents in fixed-size batches. Index and
//! batch failures are recorded and the run goes on; anything else ends the
//! run with status `failed`.

use mongodb::bson::Document;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::analyzer::{analyze_databases, DatabaseStats};
use crate::config::MigrationOptions;
use crate::connectors::{Deployment, Namespace};
use crate::error::{Error, Result};
use crate::stats::{ErrorKind, ErrorRecord, MigrationProgress, MigrationStats, MigrationStatus};

/// Collections with this prefix are never copied.
pub const SYSTEM_COLLECTION_PREFIX: &str = "system.";

/// Progress snapshots buffered per subscriber.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// Most documents reserved up front for one batch; larger batches grow.
const BATCH_RESERVE_LIMIT: usize = 4096;

/// Cooperative stop flag shared with a running [`Migrator`].
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Requests a stop. Checked between databases, collections and documents.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Copies data from a source deployment to a target deployment.
pub struct Migrator {
    source: Arc<dyn Deployment>,
    target: Arc<dyn Deployment>,
    options: MigrationOptions,
    stats: MigrationStats,
    stop: StopHandle,
    progress_tx: broadcast::Sender<MigrationProgress>,
    stats_tx: watch::Sender<MigrationStats>,
}

impl Migrator {
    /// Creates a migrator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] if `batch_size`, `concurrency` or
    /// `timeout_ms` is zero.
    pub fn new(
        source: Arc<dyn Deployment>,
        target: Arc<dyn Deployment>,
        options: MigrationOptions,
    ) -> Result<Self> {
        options.validate()?;
        let stats = MigrationStats::new();
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        let (stats_tx, _) = watch::channel(stats.clone());
        Ok(Self {
            source,
            target,
            options,
            stats,
            stop: StopHandle::default(),
            progress_tx,
            stats_tx,
        })
    }

    /// Receives a snapshot after every batch.
    pub fn subscribe(&self) -> broadcast::Receiver<MigrationProgress> {
        self.progress_tx.subscribe()
    }

    /// Observes the live statistics.
    pub fn watch_stats(&self) -> watch::Receiver<MigrationStats> {
        self.stats_tx.subscribe()
    }

    /// Handle that can stop the run from another task.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Requests a cooperative stop.
    pub fn stop(&self) {
        info!("Stopping migration process");
        self.stop.stop();
    }

    /// Current statistics.
    pub fn stats(&self) -> &MigrationStats {
        &self.stats
    }

    /// Options in effect.
    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    /// Runs the migration. Never fails: errors end up in the returned stats.
    pub async fn migrate(&mut self) -> MigrationStats {
        self.stats = MigrationStats::new();
        self.publish_stats();

        match self.run().await {
            Ok(()) => {
                let status = if self.stop.is_stopped() {
                    MigrationStatus::Stopped
                } else {
                    MigrationStatus::Completed
                };
                self.stats.finish(status);
                info!(
                    status = %status,
                    seconds = self.stats.elapsed_secs(),
                    migrated = self.stats.migrated_documents,
                    total = self.stats.total_documents,
                    "Migration finished"
                );
                if self.stats.failed_documents > 0 {
                    warn!(failed = self.stats.failed_documents, "Some documents were not migrated");
                }
            }
            Err(e) => {
                error!(error = %e, "Migration failed");
                self.stats
                    .errors
                    .push(ErrorRecord::new(ErrorKind::Unhandled, None, e.to_string()));
                self.stats.finish(MigrationStatus::Failed);
            }
        }

        self.publish_stats();
        self.stats.clone()
    }

    /// Whether a collection passes the allow/deny lists.
    ///
    /// `system.` collections are always rejected. A non-empty allow-list
    /// decides alone; otherwise a non-empty deny-list excludes.
    pub fn should_migrate_collection(&self, name: &str) -> bool {
        if name.starts_with(SYSTEM_COLLECTION_PREFIX) {
            return false;
        }
        if let Some(allow) = self.options.collections.as_ref().filter(|c| !c.is_empty()) {
            return allow.iter().any(|c| c == name);
        }
        if let Some(deny) = self.options.skip_collections.as_ref().filter(|c| !c.is_empty()) {
            return !deny.iter().any(|c| c == name);
        }
        true
    }

    async fn run(&mut self) -> Result<()> {
        info!("Starting migration process");
        let databases =
            analyze_databases(self.source.as_ref(), self.options.database_filter()).await?;

        self.stats.total_databases = databases.len() as u64;
        self.stats.total_documents = databases.iter().map(|db| db.total_documents).sum();
        self.stats.total_collections = databases
            .iter()
            .flat_map(|db| db.collections.iter())
            .filter(|coll| self.should_migrate_collection(&coll.name))
            .count() as u64;
        self.publish_stats();

        if databases.len() > 1 {
            if let Some(target_db) = self.options.target_database.as_deref().filter(|n| !n.is_empty()) {
                warn!(
                    target = %target_db,
                    databases = databases.len(),
                    "Every source database will be written into the same target database"
                );
            }
        }

        info!(
            documents = self.stats.total_documents,
            collections = self.stats.total_collections,
            databases = self.stats.total_databases,
            "Migration plan ready"
        );

        if self.options.dry_run {
            info!("Dry run completed. No data was migrated.");
            return Ok(());
        }

        for db in &databases {
            if self.stop.is_stopped() {
                break;
            }
            self.migrate_database(db).await?;
        }
        Ok(())
    }

    async fn migrate_database(&mut self, db: &DatabaseStats) -> Result<()> {
        let target_db = self
            .options
            .target_database
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| db.name.clone());
        info!(source = %db.name, target = %target_db, "Migrating database");

        for coll in &db.collections {
            if self.stop.is_stopped() {
                break;
            }
            if !self.should_migrate_collection(&coll.name) {
                info!(collection = %coll.name, "Skipping collection");
                continue;
            }
            let source_ns = Namespace::new(&db.name, &coll.name);
            let target_ns = Namespace::new(&target_db, &coll.name);
            self.migrate_collection(&source_ns, &target_ns, coll.count)
                .await?;
        }
        Ok(())
    }

    async fn migrate_collection(
        &mut self,
        source_ns: &Namespace,
        target_ns: &Namespace,
        total: u64,
    ) -> Result<()> {
        info!(source = %source_ns, target = %target_ns, "Migrating collection");

        self.migrate_indexes(source_ns, target_ns).await;

        if self.options.drop_target {
            let deleted = self.target.delete_all(target_ns).await?;
            info!(namespace = %target_ns, deleted, "Cleared target collection");
        }

        let batch_size = self.options.batch_size;
        let mut cursor = self
            .source
            .find_all(source_ns, u32::try_from(batch_size).unwrap_or(u32::MAX))
            .await?;
        let mut processed = 0u64;
        let mut exhausted = false;

        while !exhausted && !self.stop.is_stopped() {
            let remaining = usize::try_from(total.saturating_sub(processed)).unwrap_or(usize::MAX);
            let reserve = batch_size.min(remaining).min(BATCH_RESERVE_LIMIT);
            let mut batch: Vec<Document> = Vec::with_capacity(reserve);
            while batch.len() < batch_size && !self.stop.is_stopped() {
                match cursor.next_document().await? {
                    Some(doc) => batch.push(doc),
                    None => {
                        exhausted = true;
                        break;
                    }
                }
            }
            if batch.is_empty() {
                break;
            }

            let len = batch.len() as u64;
            self.write_batch(target_ns, batch).await;
            processed += len;

            let progress =
                MigrationProgress::new(&source_ns.db, &source_ns.coll, total, processed);
            debug!(
                namespace = %source_ns,
                processed,
                total,
                percentage = progress.percentage,
                "Batch written"
            );
            // No subscribers is fine.
            let _ = self.progress_tx.send(progress);
            self.publish_stats();
        }

        info!(namespace = %source_ns, processed, "Completed collection");
        Ok(())
    }

    async fn migrate_indexes(&mut self, source_ns: &Namespace, target_ns: &Namespace) {
        let indexes = match self.source.list_indexes(source_ns).await {
            Ok(indexes) => indexes,
            Err(e) => {
                error!(namespace = %source_ns, error = %e, "Error listing indexes");
                self.record(ErrorKind::CreateIndex, source_ns, e.to_string());
                return;
            }
        };

        let to_create: Vec<_> = indexes.into_iter().filter(|i| !i.is_primary_key()).collect();
        if to_create.is_empty() {
            return;
        }
        info!(count = to_create.len(), namespace = %target_ns, "Migrating indexes");

        for index in &to_create {
            match self.target.create_index(target_ns, index).await {
                Ok(()) => debug!(index = %index.name, namespace = %target_ns, "Created index"),
                Err(e) => {
                    error!(index = %index.name, namespace = %target_ns, error = %e, "Failed to create index");
                    self.record(ErrorKind::CreateIndex, target_ns, e.to_string());
                }
            }
        }
    }

    async fn write_batch(&mut self, target_ns: &Namespace, mut batch: Vec<Document>) {
        let len = batch.len() as u64;
        let result = if batch.len() == 1 {
            match batch.pop() {
                Some(doc) => self.target.insert_one(target_ns, doc).await.map(|()| 1),
                None => Ok(0),
            }
        } else {
            self.target.insert_many_unordered(target_ns, batch).await
        };

        match result {
            Ok(inserted) => self.stats.migrated_documents += inserted.min(len),
            Err(e) => {
                let inserted = match &e {
                    Error::Insert {
                        inserted: Some(n), ..
                    } => (*n).min(len),
                    _ => 0,
                };
                self.stats.migrated_documents += inserted;
                self.stats.failed_documents += len - inserted;
                error!(
                    namespace = %target_ns,
                    inserted,
                    failed = len - inserted,
                    error = %e,
                    "Error migrating batch"
                );
                self.record(ErrorKind::Insert, target_ns, e.to_string());
            }
        }
    }

    fn record(&mut self, kind: ErrorKind, ns: &Namespace, message: String) {
        self.stats
            .errors
            .push(ErrorRecord::new(kind, Some(ns.to_string()), message));
    }

    fn publish_stats(&self) {
        self.stats_tx.send_replace(self.stats.clone());
    }
}
