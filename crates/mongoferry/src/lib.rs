// Migration tool - pedantic lints relaxed for CLI ergonomics
#![allow(clippy::pedantic)]

//! # mongoferry
//!
//! `mongoferry` is a CLI tool and library that copies documents, indexes and
//! collection metadata from one MongoDB deployment to another.
//!
//! ## Supported Deployments
//!
//! | Deployment | Driver options |
//! |------------|----------------|
//! | Standalone | defaults |
//! | Replica set | replica-set name forwarded |
//! | Sharded cluster | defaults (connect to `mongos`) |
//! | Atlas | strict versioned server API v1 |
//!
//! ## Quick Start
//!
//! ```bash
//! # Write .env interactively
//! mongoferry setup
//!
//! # Inspect the source
//! mongoferry analyze -o analysis.json
//!
//! # Preview, then copy
//! mongoferry migrate --dry-run
//! mongoferry migrate -s shop --drop-target
//! ```
//!
//! ## Library Use
//!
//! ```no_run
//! use std::sync::Arc;
//! use mongoferry::{ConnectionConfig, ConnectionManager, MigrationOptions, Migrator, MongoConnector};
//!
//! # async fn run() -> mongoferry::Result<()> {
//! let mut connections = ConnectionManager::new(Arc::new(MongoConnector::default()));
//! let (source, target) = connections
//!     .connect(
//!         &ConnectionConfig::new("mongodb://localhost:27017"),
//!         &ConnectionConfig::new("mongodb://localhost:27018"),
//!     )
//!     .await?;
//!
//! let mut migrator = Migrator::new(source, target, MigrationOptions::default())?;
//! let stats = migrator.migrate().await;
//! println!("{} documents migrated", stats.migrated_documents);
//! connections.close().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod analyzer;
pub mod config;
pub mod connection;
pub mod connectors;
pub mod error;
pub mod migrator;
pub mod report;
pub mod settings;
pub mod stats;
pub mod wizard;

pub use analyzer::{
    analyze_databases, validate_compatibility, CollectionStats, Compatibility, DatabaseStats,
};
pub use config::{ConnectionConfig, DeploymentType, MigrationOptions};
pub use connection::ConnectionManager;
pub use connectors::{
    Connector, Deployment, DocumentCursor, IndexSpec, MemoryConnector, MemoryDeployment,
    MongoConnector, MongoDeployment, Namespace, ServerInfo,
};
pub use error::{Error, Result};
pub use migrator::{Migrator, StopHandle};
pub use settings::Settings;
pub use stats::{ErrorKind, ErrorRecord, MigrationProgress, MigrationStats, MigrationStatus};
