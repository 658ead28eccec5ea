//! HTTP handlers for the mongoferry REST API.
//!
//! This module organizes handlers by domain:
//! - `health`: Health check endpoint
//! - `connection`: Connection testing
//! - `analyze`: Source analysis
//! - `config`: Stored migration configuration
//! - `migrate`: Migration start, status and stop

pub mod analyze;
pub mod config;
pub mod connection;
pub mod health;
pub mod migrate;

pub use analyze::analyze;
pub use config::{get_config, save_config};
pub use connection::test_connection;
pub use health::health_check;
pub use migrate::{list_migrations, migration_status, start_migration, stop_migration};
