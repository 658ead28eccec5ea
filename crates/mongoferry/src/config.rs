//! Configuration types for mongoferry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Topology of a MongoDB deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeploymentType {
    /// Single `mongod`.
    #[default]
    Standalone,
    /// Replica set. The replica-set name is forwarded to the driver.
    ReplicaSet,
    /// Sharded cluster behind `mongos`.
    Sharded,
    /// Managed Atlas cluster. The strict versioned server API is requested.
    Atlas,
}

impl DeploymentType {
    /// Returns all deployment types, in setup-menu order.
    pub fn all() -> [Self; 4] {
        [Self::Standalone, Self::ReplicaSet, Self::Sharded, Self::Atlas]
    }

    /// Value used in settings files and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standalone => "standalone",
            Self::ReplicaSet => "replicaSet",
            Self::Sharded => "sharded",
            Self::Atlas => "atlas",
        }
    }

    /// Human readable name for prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Standalone => "Standalone MongoDB",
            Self::ReplicaSet => "Replica Set",
            Self::Sharded => "Sharded Cluster",
            Self::Atlas => "MongoDB Atlas",
        }
    }
}

impl fmt::Display for DeploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "standalone" => Ok(Self::Standalone),
            "replicaSet" => Ok(Self::ReplicaSet),
            "sharded" => Ok(Self::Sharded),
            "atlas" => Ok(Self::Atlas),
            other => Err(Error::Config(format!(
                "unknown deployment type '{other}'. Valid: standalone, replicaSet, sharded, atlas"
            ))),
        }
    }
}

/// Connection settings for one side of a migration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// Connection string (`mongodb://` or `mongodb+srv://`).
    pub uri: String,
    /// Deployment topology.
    #[serde(default)]
    pub deployment_type: DeploymentType,
    /// Replica-set name, used only for [`DeploymentType::ReplicaSet`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica_set: Option<String>,
    /// Atlas API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Atlas project id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl ConnectionConfig {
    /// Creates a standalone connection config for `uri`.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Sets the deployment type.
    #[must_use]
    pub fn with_deployment_type(mut self, deployment_type: DeploymentType) -> Self {
        self.deployment_type = deployment_type;
        self
    }

    /// Sets the replica-set name.
    #[must_use]
    pub fn with_replica_set(mut self, name: impl Into<String>) -> Self {
        self.replica_set = Some(name.into());
        self
    }

    /// Replica-set name to hand to the driver, if the topology asks for one.
    pub fn effective_replica_set(&self) -> Option<&str> {
        match self.deployment_type {
            DeploymentType::ReplicaSet => self.replica_set.as_deref().filter(|s| !s.is_empty()),
            _ => None,
        }
    }

    /// Whether the strict versioned server API should be requested.
    pub fn uses_server_api(&self) -> bool {
        self.deployment_type == DeploymentType::Atlas
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URI is empty or has an unknown scheme.
    pub fn validate(&self, side: &str) -> Result<()> {
        if self.uri.trim().is_empty() {
            return Err(Error::InvalidValue {
                key: format!("{side}.uri"),
                message: "connection string cannot be empty".to_string(),
            });
        }
        if !self.uri.starts_with("mongodb://") && !self.uri.starts_with("mongodb+srv://") {
            return Err(Error::InvalidValue {
                key: format!("{side}.uri"),
                message: "connection string must start with mongodb:// or mongodb+srv://"
                    .to_string(),
            });
        }
        Ok(())
    }
}

/// Options for one migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationOptions {
    /// Databases to copy. `None` (or empty) means every non-system database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_databases: Option<Vec<String>>,
    /// Target database name override. Applied to every source database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_database: Option<String>,
    /// Collections allow-list. Takes precedence over `skip_collections`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<String>>,
    /// Collections deny-list. Ignored when `collections` is non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_collections: Option<Vec<String>>,
    /// Delete existing target documents before copying each collection.
    #[serde(default)]
    pub drop_target: bool,
    /// Documents per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Accepted and persisted; the copy engine runs one collection at a time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Driver request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Analyze only, never write to the target.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            source_databases: None,
            target_database: None,
            collections: None,
            skip_collections: None,
            drop_target: false,
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            timeout_ms: default_timeout_ms(),
            dry_run: false,
        }
    }
}

pub(crate) fn default_batch_size() -> usize {
    1000
}

pub(crate) fn default_concurrency() -> usize {
    5
}

pub(crate) fn default_timeout_ms() -> u64 {
    30_000
}

impl MigrationOptions {
    /// Validate the options.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric option is zero.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidValue {
                key: "batchSize".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidValue {
                key: "concurrency".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.timeout_ms == 0 {
            return Err(Error::InvalidValue {
                key: "timeoutMs".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Driver request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Source database filter, treating an empty list as "all databases".
    pub fn database_filter(&self) -> Option<&[String]> {
        self.source_databases
            .as_deref()
            .filter(|names| !names.is_empty())
    }
}

/// Splits a comma-separated command line list, dropping empty entries.
pub fn parse_name_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = MigrationOptions::default();
        assert_eq!(options.batch_size, 1000);
        assert_eq!(options.concurrency, 5);
        assert_eq!(options.timeout_ms, 30_000);
        assert!(!options.dry_run);
        assert!(!options.drop_target);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_validate_rejects_zero_batch() {
        let options = MigrationOptions {
            batch_size: 0,
            ..MigrationOptions::default()
        };
        let err = options.validate().unwrap_err();
        assert_eq!(err.code(), "MF-007");
        assert!(err.to_string().contains("batchSize"));
    }

    #[test]
    fn test_options_json_uses_camel_case_and_defaults() {
        let json = r#"{"sourceDatabases":["shop"],"dropTarget":true,"batchSize":500}"#;
        let options: MigrationOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.source_databases, Some(vec!["shop".to_string()]));
        assert!(options.drop_target);
        assert_eq!(options.batch_size, 500);
        assert_eq!(options.concurrency, 5);
        assert_eq!(options.timeout_ms, 30_000);
    }

    #[test]
    fn test_empty_database_filter_means_all() {
        let options = MigrationOptions {
            source_databases: Some(vec![]),
            ..MigrationOptions::default()
        };
        assert!(options.database_filter().is_none());
    }

    #[test]
    fn test_deployment_type_round_trips_through_json() {
        let config = ConnectionConfig::new("mongodb://localhost:27017")
            .with_deployment_type(DeploymentType::ReplicaSet)
            .with_replica_set("rs0");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["deploymentType"], "replicaSet");
        assert_eq!(json["replicaSet"], "rs0");
        assert!(json.get("apiKey").is_none());
    }

    #[test]
    fn test_replica_set_only_forwarded_for_replica_sets() {
        let rs = ConnectionConfig::new("mongodb://a")
            .with_deployment_type(DeploymentType::ReplicaSet)
            .with_replica_set("rs0");
        assert_eq!(rs.effective_replica_set(), Some("rs0"));

        let standalone = ConnectionConfig::new("mongodb://a").with_replica_set("rs0");
        assert_eq!(standalone.effective_replica_set(), None);
    }

    #[test]
    fn test_server_api_only_for_atlas() {
        let atlas =
            ConnectionConfig::new("mongodb+srv://c").with_deployment_type(DeploymentType::Atlas);
        assert!(atlas.uses_server_api());
        assert!(!ConnectionConfig::new("mongodb://a").uses_server_api());
    }

    #[test]
    fn test_connection_validate_rejects_bad_scheme() {
        assert!(ConnectionConfig::new("").validate("source").is_err());
        assert!(ConnectionConfig::new("http://x").validate("source").is_err());
        assert!(ConnectionConfig::new("mongodb://x").validate("source").is_ok());
    }

    #[test]
    fn test_deployment_type_from_str() {
        assert_eq!(
            "replicaSet".parse::<DeploymentType>().unwrap(),
            DeploymentType::ReplicaSet
        );
        assert!("cluster".parse::<DeploymentType>().is_err());
    }

    #[test]
    fn test_parse_name_list() {
        assert_eq!(parse_name_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(parse_name_list("").is_empty());
    }
}
