//! Common test utilities for mongoferry-server integration tests.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use mongoferry::{Connector, MemoryConnector, MemoryDeployment};
use mongoferry_server::{api_router, AppState};

pub const SOURCE_URI: &str = "mongodb://source.test:27017";
pub const TARGET_URI: &str = "mongodb://target.test:27017";

/// Router backed by two in-memory deployments and a temporary config file.
pub struct TestApp {
    pub router: Router,
    pub source: Arc<MemoryDeployment>,
    pub target: Arc<MemoryDeployment>,
    pub dir: TempDir,
    /// Request timeout of every connector the server asked for.
    pub timeouts: Arc<Mutex<Vec<Duration>>>,
}

/// Helper to create test app with all routes
pub fn create_test_app() -> TestApp {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let source = Arc::new(MemoryDeployment::new());
    let target = Arc::new(MemoryDeployment::new());
    let connector: Arc<dyn Connector> = Arc::new(
        MemoryConnector::new()
            .with_deployment(SOURCE_URI, Arc::clone(&source))
            .with_deployment(TARGET_URI, Arc::clone(&target)),
    );
    let timeouts = Arc::new(Mutex::new(Vec::new()));
    let requested = Arc::clone(&timeouts);

    let state = Arc::new(AppState::new(
        Arc::new(move |timeout: Duration| {
            requested.lock().expect("timeouts lock").push(timeout);
            Arc::clone(&connector)
        }),
        dir.path().join("config.json"),
    ));

    TestApp {
        router: api_router(state),
        source,
        target,
        dir,
        timeouts,
    }
}

impl TestApp {
    /// Request timeouts handed to the connector factory so far.
    pub fn requested_timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().expect("timeouts lock").clone()
    }

    /// Sends a request and decodes the JSON body.
    pub async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Polls the status endpoint until the migration leaves `running`.
    pub async fn wait_for_migration(&self, id: &str) -> Value {
        for _ in 0..500 {
            let (status, body) = self
                .send("GET", &format!("/api/migrate/status/{id}"), None)
                .await;
            assert_eq!(status, StatusCode::OK);
            if body["status"] != "running" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("migration {id} did not finish");
    }
}
