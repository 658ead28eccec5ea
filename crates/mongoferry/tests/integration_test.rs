//! End-to-end tests for mongoferry.
//!
//! The in-memory tests run everywhere. The live tests need two MongoDB
//! deployments:
//! - `MONGOFERRY_TEST_SOURCE_URI`: source deployment URI
//! - `MONGOFERRY_TEST_TARGET_URI`: target deployment URI
//!
//! Run with: `cargo test --test integration_test -- --ignored`

#![allow(clippy::pedantic)]

use std::env;
use std::sync::Arc;

use mongodb::bson::{doc, Document};
use mongoferry::{
    analyze_databases, validate_compatibility, ConnectionConfig, ConnectionManager, IndexSpec,
    MemoryConnector, MemoryDeployment, MigrationOptions, MigrationStatus, Migrator,
    MongoConnector, Namespace, ServerInfo, Settings,
};
use tempfile::TempDir;

const SOURCE_URI: &str = "mongodb://source.test:27017";
const TARGET_URI: &str = "mongodb://target.test:27017";

fn orders(count: i32) -> Vec<Document> {
    (0..count)
        .map(|i| doc! { "_id": i, "sku": format!("sku-{i}"), "qty": i % 7 })
        .collect()
}

fn memory_pair() -> (Arc<MemoryDeployment>, Arc<MemoryDeployment>, MemoryConnector) {
    let source = Arc::new(MemoryDeployment::new());
    let target = Arc::new(MemoryDeployment::new());
    let connector = MemoryConnector::new()
        .with_deployment(SOURCE_URI, Arc::clone(&source))
        .with_deployment(TARGET_URI, Arc::clone(&target));
    (source, target, connector)
}

#[tokio::test]
async fn test_settings_file_drives_full_migration() {
    let (source, target, connector) = memory_pair();
    source.seed("shop", "orders", orders(1200));
    source.seed("shop", "customers", vec![doc! { "_id": "c1", "name": "Ada" }]);
    source.seed("shop", "system.profile", vec![doc! { "op": "query" }]);
    source.add_index(
        "shop",
        "orders",
        IndexSpec::new("sku_1", doc! { "sku": 1 }).with_option("unique", true),
    );

    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".env");
    let mut settings = Settings::default();
    settings.source = ConnectionConfig::new(SOURCE_URI);
    settings.target = ConnectionConfig::new(TARGET_URI);
    settings.options.batch_size = 500;
    settings.save(&path).unwrap();

    let settings = Settings::load(&path).unwrap();
    let mut connections = ConnectionManager::new(Arc::new(connector));
    let (src, tgt) = connections
        .connect(&settings.source, &settings.target)
        .await
        .unwrap();

    let compatibility = validate_compatibility(src.as_ref(), tgt.as_ref()).await;
    assert!(compatibility.compatible, "{:?}", compatibility.issues);

    let mut migrator = Migrator::new(src, tgt, settings.options.clone()).unwrap();
    let stats = migrator.migrate().await;
    connections.close().await;

    assert_eq!(stats.status, MigrationStatus::Completed);
    assert_eq!(stats.total_databases, 1);
    assert_eq!(stats.total_documents, 1202);
    assert_eq!(stats.migrated_documents, 1201);
    assert_eq!(stats.failed_documents, 0);
    assert!(stats.errors.is_empty());

    let copied = target.documents(&Namespace::new("shop", "orders"));
    assert_eq!(copied.len(), 1200);
    assert!(target
        .indexes(&Namespace::new("shop", "orders"))
        .iter()
        .any(|index| index.name == "sku_1"));
    assert!(target
        .documents(&Namespace::new("shop", "system.profile"))
        .is_empty());

    assert!(source.is_closed());
    assert!(target.is_closed());
}

#[tokio::test]
async fn test_rerun_with_drop_target_is_idempotent() {
    let (source, target, connector) = memory_pair();
    source.seed("crm", "contacts", orders(42));

    let options = MigrationOptions {
        drop_target: true,
        ..MigrationOptions::default()
    };
    let mut connections = ConnectionManager::new(Arc::new(connector));

    for _ in 0..2 {
        let (src, tgt) = connections
            .connect(
                &ConnectionConfig::new(SOURCE_URI),
                &ConnectionConfig::new(TARGET_URI),
            )
            .await
            .unwrap();
        let stats = Migrator::new(src, tgt, options.clone())
            .unwrap()
            .migrate()
            .await;
        assert_eq!(stats.status, MigrationStatus::Completed);
        assert_eq!(stats.migrated_documents, 42);
        connections.close().await;
    }

    assert_eq!(target.documents(&Namespace::new("crm", "contacts")).len(), 42);
}

#[tokio::test]
async fn test_rerun_without_drop_target_reports_duplicates() {
    let (source, target, connector) = memory_pair();
    source.seed("crm", "contacts", orders(10));
    target.seed("crm", "contacts", orders(4));

    let mut connections = ConnectionManager::new(Arc::new(connector));
    let (src, tgt) = connections
        .connect(
            &ConnectionConfig::new(SOURCE_URI),
            &ConnectionConfig::new(TARGET_URI),
        )
        .await
        .unwrap();
    let stats = Migrator::new(src, tgt, MigrationOptions::default())
        .unwrap()
        .migrate()
        .await;
    connections.close().await;

    assert_eq!(stats.status, MigrationStatus::Completed);
    assert_eq!(stats.migrated_documents, 6);
    assert_eq!(stats.failed_documents, 4);
    assert!(!stats.errors.is_empty());
    assert_eq!(target.documents(&Namespace::new("crm", "contacts")).len(), 10);
}

#[tokio::test]
async fn test_analysis_and_compatibility_warnings() {
    let (source, target, connector) = memory_pair();
    source.seed("shop", "orders", orders(3));
    source.seed("analytics", "events", orders(5));
    source.seed("admin", "system.version", vec![doc! { "_id": "v" }]);
    target.set_server_info(ServerInfo::from_version("5.0.14", Some("wiredTiger")));

    let mut connections = ConnectionManager::new(Arc::new(connector));
    let (src, tgt) = connections
        .connect(
            &ConnectionConfig::new(SOURCE_URI),
            &ConnectionConfig::new(TARGET_URI),
        )
        .await
        .unwrap();

    let databases = analyze_databases(src.as_ref(), None).await.unwrap();
    let names: Vec<_> = databases.iter().map(|db| db.name.as_str()).collect();
    assert_eq!(names, vec!["analytics", "shop"]);

    let only_shop = vec!["shop".to_string()];
    let databases = analyze_databases(src.as_ref(), Some(only_shop.as_slice())).await.unwrap();
    assert_eq!(databases.len(), 1);
    assert_eq!(databases[0].total_documents, 3);

    let compatibility = validate_compatibility(src.as_ref(), tgt.as_ref()).await;
    assert!(!compatibility.compatible);
    assert_eq!(compatibility.issues.len(), 1);
    connections.close().await;
}

#[tokio::test]
async fn test_unreachable_target_releases_source() {
    let (source, target, connector) = memory_pair();
    target.set_unreachable(true);

    let mut connections = ConnectionManager::new(Arc::new(connector));
    let err = connections
        .connect(
            &ConnectionConfig::new(SOURCE_URI),
            &ConnectionConfig::new(TARGET_URI),
        )
        .await
        .err()
        .unwrap();

    assert!(err.to_string().contains("target"));
    assert!(source.is_closed());
    assert!(connections.source().is_none());
}

/// Helper to check if live deployment tests are enabled
fn live_uris() -> Option<(String, String)> {
    let source = env::var("MONGOFERRY_TEST_SOURCE_URI").ok()?;
    let target = env::var("MONGOFERRY_TEST_TARGET_URI").ok()?;
    Some((source, target))
}

#[tokio::test]
#[ignore] // Run with --ignored flag when env vars are set
async fn test_live_analysis() {
    let Some((source_uri, _)) = live_uris() else {
        eprintln!("Skipping: MONGOFERRY_TEST_SOURCE_URI and MONGOFERRY_TEST_TARGET_URI not set");
        return;
    };

    let mut connections = ConnectionManager::new(Arc::new(MongoConnector::default()));
    let source = connections
        .connect_source(&ConnectionConfig::new(source_uri))
        .await
        .expect("Failed to connect");

    let databases = analyze_databases(source.as_ref(), None)
        .await
        .expect("Failed to analyze");
    for db in &databases {
        println!("{}: {} collections", db.name, db.collections.len());
        assert!(!["admin", "local", "config"].contains(&db.name.as_str()));
    }
    connections.close().await;
}

#[tokio::test]
#[ignore]
async fn test_live_dry_run() {
    let Some((source_uri, target_uri)) = live_uris() else {
        eprintln!("Skipping: MONGOFERRY_TEST_SOURCE_URI and MONGOFERRY_TEST_TARGET_URI not set");
        return;
    };

    let mut connections = ConnectionManager::new(Arc::new(MongoConnector::default()));
    let (source, target) = connections
        .connect(
            &ConnectionConfig::new(source_uri),
            &ConnectionConfig::new(target_uri),
        )
        .await
        .expect("Failed to connect");

    let options = MigrationOptions {
        dry_run: true,
        ..MigrationOptions::default()
    };
    let stats = Migrator::new(source, target, options)
        .unwrap()
        .migrate()
        .await;
    connections.close().await;

    assert_eq!(stats.status, MigrationStatus::Completed);
    assert_eq!(stats.migrated_documents, 0);
}
