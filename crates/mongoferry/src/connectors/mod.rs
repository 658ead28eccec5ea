//! Deployment abstraction over MongoDB-compatible servers.
//!
//! Every database call made by the analyzer and the migrator goes through the
//! [`Deployment`] trait. [`Connector`] opens one deployment per connection
//! config.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use mongodb::bson::Document;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::config::ConnectionConfig;
use crate::error::Result;

pub use self::memory::{MemoryConnector, MemoryDeployment};
pub use self::mongo::{MongoConnector, MongoDeployment};

/// Name of the implicit primary-key index.
pub const ID_INDEX_NAME: &str = "_id_";

/// A `database.collection` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace {
    /// Database name.
    pub db: String,
    /// Collection name.
    pub coll: String,
}

impl Namespace {
    /// Creates a namespace.
    pub fn new(db: impl Into<String>, coll: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            coll: coll.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.coll)
    }
}

/// An index descriptor as reported by `listIndexes`.
///
/// `options` holds every field except `key` and `name`, e.g. `unique`,
/// `sparse`, `expireAfterSeconds`, `v`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSpec {
    /// Index name.
    pub name: String,
    /// Key specification.
    pub key: Document,
    /// Remaining index options.
    #[serde(flatten)]
    pub options: Document,
}

impl IndexSpec {
    /// Creates an index spec without options.
    pub fn new(name: impl Into<String>, key: Document) -> Self {
        Self {
            name: name.into(),
            key,
            options: Document::new(),
        }
    }

    /// Adds an option.
    #[must_use]
    pub fn with_option(mut self, key: &str, value: impl Into<mongodb::bson::Bson>) -> Self {
        self.options.insert(key, value);
        self
    }

    /// Whether this is the implicit `_id_` index.
    pub fn is_primary_key(&self) -> bool {
        self.name == ID_INDEX_NAME
    }

    /// Options safe to send to `createIndexes` on another deployment.
    ///
    /// `v` and `ns` describe the source namespace and storage version and are
    /// dropped.
    pub fn transferable_options(&self) -> Document {
        self.options
            .iter()
            .filter(|(k, _)| k.as_str() != "v" && k.as_str() != "ns")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Parses a raw `listIndexes` document.
    pub fn from_document(mut raw: Document) -> Option<Self> {
        let name = match raw.remove("name") {
            Some(mongodb::bson::Bson::String(name)) => name,
            _ => return None,
        };
        let key = match raw.remove("key") {
            Some(mongodb::bson::Bson::Document(key)) => key,
            _ => return None,
        };
        Some(Self {
            name,
            key,
            options: raw,
        })
    }
}

/// Server build and storage information.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    /// Version string, e.g. `7.0.4`.
    pub version: String,
    /// Numeric version components, e.g. `[7, 0, 4, 0]`.
    pub version_array: Vec<i32>,
    /// Storage engine name when the server reports one.
    pub storage_engine: Option<String>,
}

impl ServerInfo {
    /// Creates server info from a dotted version string.
    pub fn from_version(version: &str, storage_engine: Option<&str>) -> Self {
        let version_array = version
            .split('.')
            .map(|part| {
                part.chars()
                    .take_while(char::is_ascii_digit)
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0)
            })
            .collect();
        Self {
            version: version.to_string(),
            version_array,
            storage_engine: storage_engine.map(String::from),
        }
    }

    /// Major version component.
    pub fn major(&self) -> i32 {
        self.version_array.first().copied().unwrap_or(0)
    }

    /// Minor version component.
    pub fn minor(&self) -> i32 {
        self.version_array.get(1).copied().unwrap_or(0)
    }
}

/// Forward-only document cursor.
#[async_trait]
pub trait DocumentCursor: Send {
    /// Returns the next document, or `None` once the cursor is exhausted.
    async fn next_document(&mut self) -> Result<Option<Document>>;
}

/// One connected MongoDB deployment.
#[async_trait]
pub trait Deployment: Send + Sync {
    /// Lists every database name, system databases included.
    async fn list_database_names(&self) -> Result<Vec<String>>;

    /// Lists the collections of `db`.
    async fn list_collection_names(&self, db: &str) -> Result<Vec<String>>;

    /// Counts the documents of a collection.
    async fn count_documents(&self, ns: &Namespace) -> Result<u64>;

    /// Uncompressed data size of a collection in bytes.
    async fn collection_size(&self, ns: &Namespace) -> Result<u64>;

    /// Lists the indexes of a collection.
    async fn list_indexes(&self, ns: &Namespace) -> Result<Vec<IndexSpec>>;

    /// Build version and storage engine.
    async fn server_info(&self) -> Result<ServerInfo>;

    /// Creates one index. `v` and `ns` options are not forwarded.
    async fn create_index(&self, ns: &Namespace, index: &IndexSpec) -> Result<()>;

    /// Deletes every document of a collection, keeping the collection itself.
    async fn delete_all(&self, ns: &Namespace) -> Result<u64>;

    /// Opens a cursor over every document of a collection.
    async fn find_all(&self, ns: &Namespace, batch_size: u32) -> Result<Box<dyn DocumentCursor>>;

    /// Inserts a single document.
    async fn insert_one(&self, ns: &Namespace, doc: Document) -> Result<()>;

    /// Inserts documents without stopping at the first failure.
    ///
    /// Returns the inserted count. On failure the error is
    /// [`crate::Error::Insert`], carrying the persisted count when known.
    async fn insert_many_unordered(&self, ns: &Namespace, docs: Vec<Document>) -> Result<u64>;

    /// Round-trips a `ping` command.
    async fn ping(&self) -> Result<()>;

    /// Releases the connection pool.
    async fn close(&self) -> Result<()>;
}

/// Opens deployments from connection configs.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects and verifies the deployment answers a ping.
    async fn open(&self, config: &ConnectionConfig) -> Result<Arc<dyn Deployment>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_namespace_display() {
        assert_eq!(Namespace::new("shop", "orders").to_string(), "shop.orders");
    }

    #[test]
    fn test_index_spec_from_list_indexes_document() {
        let raw = doc! {
            "v": 2,
            "key": { "email": 1 },
            "name": "email_1",
            "unique": true,
            "ns": "shop.users",
        };
        let index = IndexSpec::from_document(raw).unwrap();
        assert_eq!(index.name, "email_1");
        assert_eq!(index.key, doc! { "email": 1 });
        assert!(!index.is_primary_key());
        assert_eq!(index.transferable_options(), doc! { "unique": true });
    }

    #[test]
    fn test_index_spec_without_name_is_skipped() {
        assert!(IndexSpec::from_document(doc! { "key": { "a": 1 } }).is_none());
    }

    #[test]
    fn test_server_info_from_version() {
        let info = ServerInfo::from_version("7.0.4-rc1", Some("wiredTiger"));
        assert_eq!(info.version_array, vec![7, 0, 4]);
        assert_eq!(info.major(), 7);
        assert_eq!(info.minor(), 0);
        assert_eq!(info.storage_engine.as_deref(), Some("wiredTiger"));
    }
}
