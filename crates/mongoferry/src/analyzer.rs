//! Source analysis and compatibility checks.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::connectors::{Deployment, IndexSpec, Namespace};
use crate::error::{Error, Result};

/// Databases never migrated unless named explicitly.
pub const SYSTEM_DATABASES: [&str; 3] = ["admin", "local", "config"];

/// Metadata of one collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionStats {
    /// Collection name.
    pub name: String,
    /// Document count.
    pub count: u64,
    /// Data size in bytes.
    pub size: u64,
    /// Indexes in listing order.
    pub indexes: Vec<IndexSpec>,
}

/// Metadata of one database.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStats {
    /// Database name.
    pub name: String,
    /// Collections in listing order.
    pub collections: Vec<CollectionStats>,
    /// Sum of collection sizes.
    pub total_size: u64,
    /// Sum of collection document counts.
    pub total_documents: u64,
}

/// Outcome of [`validate_compatibility`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Compatibility {
    /// True when no issue was found.
    pub compatible: bool,
    /// Human readable issues.
    pub issues: Vec<String>,
}

/// Collects counts, sizes and indexes for the selected databases.
///
/// Without a filter every database except `admin`, `local` and `config` is
/// analyzed. The whole call fails if any listing or stats command fails.
///
/// # Errors
///
/// Returns [`Error::Analysis`].
pub async fn analyze_databases(
    deployment: &dyn Deployment,
    databases: Option<&[String]>,
) -> Result<Vec<DatabaseStats>> {
    analyze(deployment, databases).await.map_err(|e| {
        error!(error = %e, "Error analyzing databases");
        match e {
            Error::Analysis(message) => Error::Analysis(message),
            other => Error::Analysis(other.to_string()),
        }
    })
}

async fn analyze(
    deployment: &dyn Deployment,
    databases: Option<&[String]>,
) -> Result<Vec<DatabaseStats>> {
    let names: Vec<String> = match databases.filter(|names| !names.is_empty()) {
        Some(names) => names.to_vec(),
        None => deployment
            .list_database_names()
            .await?
            .into_iter()
            .filter(|name| !SYSTEM_DATABASES.contains(&name.as_str()))
            .collect(),
    };
    info!(count = names.len(), databases = %names.join(", "), "Analyzing databases");

    let mut result = Vec::with_capacity(names.len());
    for db in names {
        let mut stats = DatabaseStats {
            name: db.clone(),
            collections: Vec::new(),
            total_size: 0,
            total_documents: 0,
        };

        for coll in deployment.list_collection_names(&db).await? {
            let ns = Namespace::new(&db, &coll);
            let count = deployment.count_documents(&ns).await?;
            let size = deployment.collection_size(&ns).await?;
            let indexes = deployment.list_indexes(&ns).await?;
            debug!(namespace = %ns, count, size, "Analyzed collection");

            stats.total_size += size;
            stats.total_documents += count;
            stats.collections.push(CollectionStats {
                name: coll,
                count,
                size,
                indexes,
            });
        }

        info!(
            database = %stats.name,
            collections = stats.collections.len(),
            documents = stats.total_documents,
            bytes = stats.total_size,
            "Analyzed database"
        );
        result.push(stats);
    }
    Ok(result)
}

/// Compares server versions and storage engines.
///
/// Never fails: errors while querying either side become an issue.
pub async fn validate_compatibility(
    source: &dyn Deployment,
    target: &dyn Deployment,
) -> Compatibility {
    let mut issues = Vec::new();
    if let Err(e) = check_compatibility(source, target, &mut issues).await {
        error!(error = %e, "Error validating compatibility");
        issues.push(format!("Error validating compatibility: {e}"));
        return Compatibility {
            compatible: false,
            issues,
        };
    }
    Compatibility {
        compatible: issues.is_empty(),
        issues,
    }
}

async fn check_compatibility(
    source: &dyn Deployment,
    target: &dyn Deployment,
    issues: &mut Vec<String>,
) -> Result<()> {
    let source_info = source.server_info().await?;
    let target_info = target.server_info().await?;
    info!(version = %source_info.version, "Source MongoDB version");
    info!(version = %target_info.version, "Target MongoDB version");

    if target_info.major() < source_info.major() {
        issues.push(format!(
            "Target MongoDB version ({}) is older than source ({}). This may cause compatibility issues.",
            target_info.version, source_info.version
        ));
    } else if target_info.major() == source_info.major() && target_info.minor() < source_info.minor()
    {
        warn!(
            source = %source_info.version,
            target = %target_info.version,
            "Target MongoDB minor version is older than source"
        );
    }

    if let (Some(source_engine), Some(target_engine)) =
        (&source_info.storage_engine, &target_info.storage_engine)
    {
        if source_engine != target_engine {
            issues.push(format!(
                "Different storage engines detected: source uses {source_engine}, target uses {target_engine}. Some features may not be compatible."
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::{MemoryDeployment, ServerInfo};
    use mongodb::bson::doc;

    fn deployment(version: &str, engine: Option<&str>) -> MemoryDeployment {
        let deployment = MemoryDeployment::new();
        deployment.set_server_info(ServerInfo::from_version(version, engine));
        deployment
    }

    #[tokio::test]
    async fn test_analyze_skips_system_databases() {
        let source = MemoryDeployment::new();
        source.seed("admin", "system.users", vec![doc! { "_id": 1 }]);
        source.seed("local", "startup_log", vec![doc! { "_id": 1 }]);
        source.seed("shop", "orders", vec![doc! { "_id": 1 }, doc! { "_id": 2 }]);
        source.seed("shop", "users", vec![doc! { "_id": 1 }]);

        let stats = analyze_databases(&source, None).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].name, "shop");
        assert_eq!(stats[0].collections.len(), 2);
        assert_eq!(stats[0].total_documents, 3);
        assert_eq!(
            stats[0].total_size,
            stats[0].collections.iter().map(|c| c.size).sum::<u64>()
        );
        assert_eq!(stats[0].collections[0].indexes[0].name, "_id_");
    }

    #[tokio::test]
    async fn test_analyze_explicit_filter() {
        let source = MemoryDeployment::new();
        source.seed("shop", "orders", vec![doc! { "_id": 1 }]);
        source.seed("crm", "leads", vec![doc! { "_id": 1 }]);

        let stats = analyze_databases(&source, Some(&["crm".to_string()]))
            .await
            .unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].name, "crm");
    }

    #[tokio::test]
    async fn test_analyze_is_all_or_nothing() {
        let source = MemoryDeployment::new();
        source.seed("shop", "orders", vec![doc! { "_id": 1 }]);
        source.fail_list_indexes(Namespace::new("shop", "orders"));

        let err = analyze_databases(&source, None).await.unwrap_err();
        assert_eq!(err.code(), "MF-002");
    }

    #[tokio::test]
    async fn test_older_major_version_is_incompatible() {
        let source = deployment("6.0.12", Some("wiredTiger"));
        let target = deployment("5.0.24", Some("wiredTiger"));

        let result = validate_compatibility(&source, &target).await;
        assert!(!result.compatible);
        assert_eq!(result.issues.len(), 1);
        assert!(result.issues[0].contains("5.0.24"));
        assert!(result.issues[0].contains("6.0.12"));
    }

    #[tokio::test]
    async fn test_older_minor_version_only_warns() {
        let source = deployment("6.1.0", Some("wiredTiger"));
        let target = deployment("6.0.0", Some("wiredTiger"));
        let result = validate_compatibility(&source, &target).await;
        assert!(result.compatible);
        assert!(result.issues.is_empty());
    }

    #[tokio::test]
    async fn test_newer_minor_version_is_compatible() {
        let source = deployment("6.0.0", None);
        let target = deployment("6.1.0", None);
        let result = validate_compatibility(&source, &target).await;
        assert!(result.compatible);
    }

    #[tokio::test]
    async fn test_storage_engine_mismatch() {
        let source = deployment("7.0.0", Some("wiredTiger"));
        let target = deployment("7.0.0", Some("inMemory"));
        let result = validate_compatibility(&source, &target).await;
        assert!(!result.compatible);
        assert!(result.issues[0].contains("inMemory"));
    }

    #[tokio::test]
    async fn test_unknown_storage_engine_is_not_an_issue() {
        let source = deployment("7.0.0", Some("wiredTiger"));
        let target = deployment("7.0.0", None);
        assert!(validate_compatibility(&source, &target).await.compatible);
    }

    #[tokio::test]
    async fn test_errors_become_issues() {
        let source = deployment("7.0.0", None);
        let target = deployment("7.0.0", None);
        target.fail_server_info();

        let result = validate_compatibility(&source, &target).await;
        assert!(!result.compatible);
        assert!(result.issues[0].starts_with("Error validating compatibility:"));
    }
}
