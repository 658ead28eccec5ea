//! MongoDB deployment backed by the official async driver.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, FindOptions, ServerApi, ServerApiVersion};
use mongodb::{Client, Collection, Cursor};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Connector, Deployment, DocumentCursor, IndexSpec, Namespace, ServerInfo};
use crate::config::{default_timeout_ms, ConnectionConfig};
use crate::error::{Error, Result};

/// Server selection gives up after this long.
pub const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);

const APP_NAME: &str = "mongoferry";

/// Opens [`MongoDeployment`]s.
#[derive(Debug, Clone)]
pub struct MongoConnector {
    request_timeout: Duration,
}

impl Default for MongoConnector {
    fn default() -> Self {
        Self::new(Duration::from_millis(default_timeout_ms()))
    }
}

impl MongoConnector {
    /// Creates a connector applying `request_timeout` to connection attempts.
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }

    /// Builds driver options for a connection config.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string cannot be parsed.
    pub async fn client_options(&self, config: &ConnectionConfig) -> Result<ClientOptions> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        options.app_name = Some(APP_NAME.to_string());
        options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
        options.connect_timeout = Some(self.request_timeout);

        if let Some(name) = config.effective_replica_set() {
            options.repl_set_name = Some(name.to_string());
        }
        if config.uses_server_api() {
            let api = ServerApi::builder()
                .version(ServerApiVersion::V1)
                .strict(true)
                .deprecation_errors(true)
                .build();
            options.server_api = Some(api);
        }
        Ok(options)
    }
}

#[async_trait]
impl Connector for MongoConnector {
    async fn open(&self, config: &ConnectionConfig) -> Result<Arc<dyn Deployment>> {
        let options = self.client_options(config).await?;
        let deployment = MongoDeployment::new(Client::with_options(options)?);
        if let Err(e) = deployment.ping().await {
            if let Err(close_err) = deployment.close().await {
                warn!(error = %close_err, "Failed to release client after ping failure");
            }
            return Err(e);
        }
        debug!(deployment_type = %config.deployment_type, "Connected");
        Ok(Arc::new(deployment))
    }
}

/// A connected MongoDB deployment.
#[derive(Debug, Clone)]
pub struct MongoDeployment {
    client: Client,
}

impl MongoDeployment {
    /// Wraps an existing driver client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn collection(&self, ns: &Namespace) -> Collection<Document> {
        self.client.database(&ns.db).collection::<Document>(&ns.coll)
    }

    async fn admin_command(&self, command: Document) -> Result<Document> {
        Ok(self.client.database("admin").run_command(command).await?)
    }
}

/// Options for the full-collection copy cursor.
///
/// No `maxTimeMS`: the server applies it to the whole cursor, not to each
/// `getMore`, so a long copy would expire mid-collection.
fn copy_cursor_options(batch_size: u32) -> FindOptions {
    FindOptions::builder().batch_size(batch_size).build()
}

fn as_u64(value: Option<&Bson>) -> u64 {
    match value {
        Some(Bson::Int32(v)) => u64::try_from(*v).unwrap_or(0),
        Some(Bson::Int64(v)) => u64::try_from(*v).unwrap_or(0),
        Some(Bson::Double(v)) if *v > 0.0 => *v as u64,
        _ => 0,
    }
}

fn insert_error(ns: &Namespace, batch_len: usize, err: mongodb::error::Error) -> Error {
    let inserted = match err.kind.as_ref() {
        ErrorKind::InsertMany(failure) => failure
            .write_errors
            .as_ref()
            .filter(|errors| !errors.is_empty())
            .map(|errors| batch_len.saturating_sub(errors.len()) as u64),
        _ => None,
    };
    Error::Insert {
        namespace: ns.to_string(),
        inserted,
        message: err.to_string(),
    }
}

struct MongoCursor {
    inner: Cursor<Document>,
}

#[async_trait]
impl DocumentCursor for MongoCursor {
    async fn next_document(&mut self) -> Result<Option<Document>> {
        Ok(self.inner.try_next().await?)
    }
}

#[async_trait]
impl Deployment for MongoDeployment {
    async fn list_database_names(&self) -> Result<Vec<String>> {
        Ok(self.client.list_database_names().await?)
    }

    async fn list_collection_names(&self, db: &str) -> Result<Vec<String>> {
        Ok(self.client.database(db).list_collection_names().await?)
    }

    async fn count_documents(&self, ns: &Namespace) -> Result<u64> {
        Ok(self.collection(ns).count_documents(doc! {}).await?)
    }

    async fn collection_size(&self, ns: &Namespace) -> Result<u64> {
        let stats = self
            .client
            .database(&ns.db)
            .run_command(doc! { "collStats": ns.coll.as_str() })
            .await?;
        Ok(as_u64(stats.get("size")))
    }

    async fn list_indexes(&self, ns: &Namespace) -> Result<Vec<IndexSpec>> {
        let raw: Vec<Document> = self
            .client
            .database(&ns.db)
            .run_cursor_command(doc! { "listIndexes": ns.coll.as_str() })
            .await?
            .try_collect()
            .await?;
        Ok(raw.into_iter().filter_map(IndexSpec::from_document).collect())
    }

    async fn server_info(&self) -> Result<ServerInfo> {
        let build = self.admin_command(doc! { "buildInfo": 1 }).await?;
        let version = build.get_str("version").unwrap_or_default().to_string();
        let version_array: Vec<i32> = match build.get_array("versionArray") {
            Ok(parts) => parts
                .iter()
                .map(|part| match part {
                    Bson::Int32(v) => *v,
                    Bson::Int64(v) => i32::try_from(*v).unwrap_or(0),
                    _ => 0,
                })
                .collect(),
            Err(_) => ServerInfo::from_version(&version, None).version_array,
        };

        // serverStatus needs clusterMonitor; shared tiers refuse it.
        let storage_engine = match self.admin_command(doc! { "serverStatus": 1 }).await {
            Ok(status) => status
                .get_document("storageEngine")
                .ok()
                .and_then(|engine| engine.get_str("name").ok())
                .map(String::from),
            Err(e) => {
                debug!(error = %e, "serverStatus unavailable, storage engine unknown");
                None
            }
        };

        Ok(ServerInfo {
            version,
            version_array,
            storage_engine,
        })
    }

    async fn create_index(&self, ns: &Namespace, index: &IndexSpec) -> Result<()> {
        let mut spec = doc! {
            "key": index.key.clone(),
            "name": index.name.clone(),
        };
        for (key, value) in index.transferable_options() {
            spec.insert(key, value);
        }
        self.client
            .database(&ns.db)
            .run_command(doc! {
                "createIndexes": ns.coll.as_str(),
                "indexes": [spec],
            })
            .await
            .map_err(|e| Error::CreateIndex {
                namespace: ns.to_string(),
                index: index.name.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn delete_all(&self, ns: &Namespace) -> Result<u64> {
        let result = self.collection(ns).delete_many(doc! {}).await?;
        Ok(result.deleted_count)
    }

    async fn find_all(&self, ns: &Namespace, batch_size: u32) -> Result<Box<dyn DocumentCursor>> {
        let cursor = self
            .collection(ns)
            .find(doc! {})
            .with_options(copy_cursor_options(batch_size))
            .await?;
        Ok(Box::new(MongoCursor { inner: cursor }))
    }

    async fn insert_one(&self, ns: &Namespace, doc: Document) -> Result<()> {
        self.collection(ns)
            .insert_one(doc)
            .await
            .map_err(|e| insert_error(ns, 1, e))?;
        Ok(())
    }

    async fn insert_many_unordered(&self, ns: &Namespace, docs: Vec<Document>) -> Result<u64> {
        let batch_len = docs.len();
        let result = self
            .collection(ns)
            .insert_many(docs)
            .ordered(false)
            .await
            .map_err(|e| insert_error(ns, batch_len, e))?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn ping(&self) -> Result<()> {
        self.admin_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}
