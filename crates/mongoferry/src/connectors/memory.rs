//! In-process deployment.
//!
//! Keeps collections in ordered maps, enforces `_id` uniqueness on insert and
//! counts write calls and closes. Failures can be injected per namespace so the
//! non-fatal paths of the migrator can be driven without a server.

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{Connector, Deployment, DocumentCursor, IndexSpec, Namespace, ServerInfo, ID_INDEX_NAME};
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Collection {
    docs: Vec<Document>,
    indexes: Vec<IndexSpec>,
}

impl Collection {
    fn new() -> Self {
        Self {
            docs: Vec::new(),
            indexes: vec![IndexSpec::new(ID_INDEX_NAME, mongodb::bson::doc! { "_id": 1 })],
        }
    }

    fn contains_id(&self, id: &Bson) -> bool {
        self.docs.iter().any(|d| d.get("_id") == Some(id))
    }
}

#[derive(Debug, Default)]
struct Failures {
    unreachable: bool,
    list_databases: bool,
    server_info: bool,
    list_indexes: HashSet<Namespace>,
    create_index: HashSet<String>,
    find: HashSet<Namespace>,
    insert: HashSet<Namespace>,
}

#[derive(Debug, Default)]
struct State {
    databases: BTreeMap<String, BTreeMap<String, Collection>>,
    failures: Failures,
    closed: bool,
}

/// A deployment living entirely in memory.
#[derive(Debug)]
pub struct MemoryDeployment {
    state: Mutex<State>,
    server: Mutex<ServerInfo>,
    write_delay: Mutex<Option<Duration>>,
    insert_calls: AtomicUsize,
    closes: AtomicUsize,
}

impl Default for MemoryDeployment {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDeployment {
    /// Creates an empty deployment reporting version 7.0.0 on wiredTiger.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            server: Mutex::new(ServerInfo::from_version("7.0.0", Some("wiredTiger"))),
            write_delay: Mutex::new(None),
            insert_calls: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the build information reported by `server_info`.
    pub fn set_server_info(&self, info: ServerInfo) {
        *self.server.lock().unwrap_or_else(PoisonError::into_inner) = info;
    }

    /// Delays every insert call, giving other tasks a chance to run.
    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    /// Creates a collection, empty unless it already exists.
    pub fn create_collection(&self, db: &str, coll: &str) {
        self.lock()
            .databases
            .entry(db.to_string())
            .or_default()
            .entry(coll.to_string())
            .or_insert_with(Collection::new);
    }

    /// Appends documents directly, bypassing uniqueness checks and counters.
    pub fn seed(&self, db: &str, coll: &str, docs: impl IntoIterator<Item = Document>) {
        let mut state = self.lock();
        let collection = state
            .databases
            .entry(db.to_string())
            .or_default()
            .entry(coll.to_string())
            .or_insert_with(Collection::new);
        collection.docs.extend(docs);
    }

    /// Adds an index definition to a collection.
    pub fn add_index(&self, db: &str, coll: &str, index: IndexSpec) {
        let mut state = self.lock();
        state
            .databases
            .entry(db.to_string())
            .or_default()
            .entry(coll.to_string())
            .or_insert_with(Collection::new)
            .indexes
            .push(index);
    }

    /// Documents currently stored in a collection.
    pub fn documents(&self, ns: &Namespace) -> Vec<Document> {
        self.lock()
            .databases
            .get(&ns.db)
            .and_then(|db| db.get(&ns.coll))
            .map(|c| c.docs.clone())
            .unwrap_or_default()
    }

    /// Indexes currently defined on a collection.
    pub fn indexes(&self, ns: &Namespace) -> Vec<IndexSpec> {
        self.lock()
            .databases
            .get(&ns.db)
            .and_then(|db| db.get(&ns.coll))
            .map(|c| c.indexes.clone())
            .unwrap_or_default()
    }

    /// Number of `insert_one`/`insert_many_unordered` calls received.
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    /// Number of times `close` was called.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Whether the last lifecycle call was `close`.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Makes `ping` fail, as an unreachable server would.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().failures.unreachable = unreachable;
    }

    /// Makes `list_database_names` fail.
    pub fn fail_list_databases(&self) {
        self.lock().failures.list_databases = true;
    }

    /// Makes `server_info` fail.
    pub fn fail_server_info(&self) {
        self.lock().failures.server_info = true;
    }

    /// Makes `list_indexes` fail for a namespace.
    pub fn fail_list_indexes(&self, ns: Namespace) {
        self.lock().failures.list_indexes.insert(ns);
    }

    /// Makes `create_index` fail for an index name.
    pub fn fail_create_index(&self, name: &str) {
        self.lock().failures.create_index.insert(name.to_string());
    }

    /// Makes `find_all` fail for a namespace.
    pub fn fail_find(&self, ns: Namespace) {
        self.lock().failures.find.insert(ns);
    }

    /// Makes every insert into a namespace fail without a persisted count.
    pub fn fail_inserts(&self, ns: Namespace) {
        self.lock().failures.insert.insert(ns);
    }

    fn reopen(&self) {
        self.lock().closed = false;
    }

    async fn before_write(&self) {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.write_delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn missing(ns: &Namespace) -> Error {
        Error::Migration(format!("namespace {ns} does not exist"))
    }
}

fn with_id(mut doc: Document) -> Document {
    if !doc.contains_key("_id") {
        let mut with_id = Document::new();
        with_id.insert("_id", ObjectId::new());
        for (key, value) in doc {
            with_id.insert(key, value);
        }
        doc = with_id;
    }
    doc
}

fn duplicate_key(ns: &Namespace, id: Option<&Bson>) -> String {
    match id {
        Some(id) => format!("E11000 duplicate key error collection: {ns} dup key: {{ _id: {id} }}"),
        None => format!("E11000 duplicate key error collection: {ns}"),
    }
}

struct MemoryCursor {
    docs: VecDeque<Document>,
}

#[async_trait]
impl DocumentCursor for MemoryCursor {
    async fn next_document(&mut self) -> Result<Option<Document>> {
        Ok(self.docs.pop_front())
    }
}

#[async_trait]
impl Deployment for MemoryDeployment {
    async fn list_database_names(&self) -> Result<Vec<String>> {
        let state = self.lock();
        if state.failures.list_databases {
            return Err(Error::Analysis("listDatabases failed".to_string()));
        }
        Ok(state.databases.keys().cloned().collect())
    }

    async fn list_collection_names(&self, db: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()
            .databases
            .get(db)
            .map(|colls| colls.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn count_documents(&self, ns: &Namespace) -> Result<u64> {
        Ok(self.documents(ns).len() as u64)
    }

    async fn collection_size(&self, ns: &Namespace) -> Result<u64> {
        let mut size = 0u64;
        for doc in self.documents(ns) {
            let bytes = mongodb::bson::to_vec(&doc)
                .map_err(|e| Error::Analysis(format!("cannot size {ns}: {e}")))?;
            size += bytes.len() as u64;
        }
        Ok(size)
    }

    async fn list_indexes(&self, ns: &Namespace) -> Result<Vec<IndexSpec>> {
        let state = self.lock();
        if state.failures.list_indexes.contains(ns) {
            return Err(Error::Migration(format!("listIndexes failed on {ns}")));
        }
        state
            .databases
            .get(&ns.db)
            .and_then(|db| db.get(&ns.coll))
            .map(|c| c.indexes.clone())
            .ok_or_else(|| Self::missing(ns))
    }

    async fn server_info(&self) -> Result<ServerInfo> {
        if self.lock().failures.server_info {
            return Err(Error::Migration("buildInfo failed".to_string()));
        }
        Ok(self.server.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    async fn create_index(&self, ns: &Namespace, index: &IndexSpec) -> Result<()> {
        let mut state = self.lock();
        if state.failures.create_index.contains(&index.name) {
            return Err(Error::CreateIndex {
                namespace: ns.to_string(),
                index: index.name.clone(),
                message: "Index build failed".to_string(),
            });
        }
        let collection = state
            .databases
            .entry(ns.db.clone())
            .or_default()
            .entry(ns.coll.clone())
            .or_insert_with(Collection::new);
        let spec = IndexSpec {
            name: index.name.clone(),
            key: index.key.clone(),
            options: index.transferable_options(),
        };
        match collection.indexes.iter_mut().find(|i| i.name == spec.name) {
            Some(existing) if existing.key != spec.key => Err(Error::CreateIndex {
                namespace: ns.to_string(),
                index: spec.name,
                message: "An existing index has the same name but a different key".to_string(),
            }),
            Some(existing) => {
                *existing = spec;
                Ok(())
            }
            None => {
                collection.indexes.push(spec);
                Ok(())
            }
        }
    }

    async fn delete_all(&self, ns: &Namespace) -> Result<u64> {
        let mut state = self.lock();
        let deleted = state
            .databases
            .get_mut(&ns.db)
            .and_then(|db| db.get_mut(&ns.coll))
            .map(|c| std::mem::take(&mut c.docs).len() as u64)
            .unwrap_or(0);
        Ok(deleted)
    }

    async fn find_all(&self, ns: &Namespace, _batch_size: u32) -> Result<Box<dyn DocumentCursor>> {
        if self.lock().failures.find.contains(ns) {
            return Err(Error::Migration(format!("find failed on {ns}")));
        }
        Ok(Box::new(MemoryCursor {
            docs: self.documents(ns).into(),
        }))
    }

    async fn insert_one(&self, ns: &Namespace, doc: Document) -> Result<()> {
        self.before_write().await;
        let mut state = self.lock();
        if state.failures.insert.contains(ns) {
            return Err(Error::Insert {
                namespace: ns.to_string(),
                inserted: None,
                message: "insert rejected".to_string(),
            });
        }
        let doc = with_id(doc);
        let collection = state
            .databases
            .entry(ns.db.clone())
            .or_default()
            .entry(ns.coll.clone())
            .or_insert_with(Collection::new);
        if let Some(id) = doc.get("_id") {
            if collection.contains_id(id) {
                return Err(Error::Insert {
                    namespace: ns.to_string(),
                    inserted: Some(0),
                    message: duplicate_key(ns, Some(id)),
                });
            }
        }
        collection.docs.push(doc);
        Ok(())
    }

    async fn insert_many_unordered(&self, ns: &Namespace, docs: Vec<Document>) -> Result<u64> {
        self.before_write().await;
        let mut state = self.lock();
        if state.failures.insert.contains(ns) {
            return Err(Error::Insert {
                namespace: ns.to_string(),
                inserted: None,
                message: "bulk write rejected".to_string(),
            });
        }
        let collection = state
            .databases
            .entry(ns.db.clone())
            .or_default()
            .entry(ns.coll.clone())
            .or_insert_with(Collection::new);

        let mut inserted = 0u64;
        let mut write_errors = 0usize;
        let mut first_error = None;
        for doc in docs {
            let doc = with_id(doc);
            let duplicate = doc.get("_id").filter(|id| collection.contains_id(id)).cloned();
            match duplicate {
                Some(id) => {
                    write_errors += 1;
                    first_error.get_or_insert_with(|| duplicate_key(ns, Some(&id)));
                }
                None => {
                    collection.docs.push(doc);
                    inserted += 1;
                }
            }
        }

        if write_errors > 0 {
            return Err(Error::Insert {
                namespace: ns.to_string(),
                inserted: Some(inserted),
                message: format!(
                    "{write_errors} write error(s), first: {}",
                    first_error.unwrap_or_else(|| duplicate_key(ns, None))
                ),
            });
        }
        Ok(inserted)
    }

    async fn ping(&self) -> Result<()> {
        if self.lock().failures.unreachable {
            return Err(Error::Migration(
                "Server selection timeout: No available servers".to_string(),
            ));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.lock().closed = true;
        Ok(())
    }
}

/// Resolves connection URIs to registered in-memory deployments.
#[derive(Debug, Default, Clone)]
pub struct MemoryConnector {
    deployments: HashMap<String, Arc<MemoryDeployment>>,
}

impl MemoryConnector {
    /// Creates a connector with no deployments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a deployment under `uri`.
    #[must_use]
    pub fn with_deployment(mut self, uri: impl Into<String>, deployment: Arc<MemoryDeployment>) -> Self {
        self.deployments.insert(uri.into(), deployment);
        self
    }

    /// Returns the deployment registered under `uri`.
    pub fn deployment(&self, uri: &str) -> Option<Arc<MemoryDeployment>> {
        self.deployments.get(uri).cloned()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self, config: &ConnectionConfig) -> Result<Arc<dyn Deployment>> {
        let deployment = self.deployments.get(&config.uri).cloned().ok_or_else(|| {
            Error::Migration(format!(
                "Server selection timeout: no deployment at {}",
                config.uri
            ))
        })?;
        deployment.ping().await?;
        deployment.reopen();
        Ok(deployment)
    }
}
