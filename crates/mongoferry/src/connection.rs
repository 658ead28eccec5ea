//! Connection manager for the source and target deployments.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ConnectionConfig;
use crate::connectors::{Connector, Deployment};
use crate::error::{Error, Result};

/// Opens, holds and closes the two sides of a migration.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    source: Option<Arc<dyn Deployment>>,
    target: Option<Arc<dyn Deployment>>,
}

impl ConnectionManager {
    /// Creates a manager without open connections.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            source: None,
            target: None,
        }
    }

    /// Connects both sides.
    ///
    /// If either side fails, the side that succeeded is closed before the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] naming the side that failed.
    pub async fn connect(
        &mut self,
        source: &ConnectionConfig,
        target: &ConnectionConfig,
    ) -> Result<(Arc<dyn Deployment>, Arc<dyn Deployment>)> {
        self.close().await;

        let source_handle = self.open("source", source).await?;
        let target_handle = match self.open("target", target).await {
            Ok(handle) => handle,
            Err(e) => {
                release("source", source_handle.as_ref()).await;
                return Err(e);
            }
        };

        info!("Connected to source and target deployments");
        self.source = Some(Arc::clone(&source_handle));
        self.target = Some(Arc::clone(&target_handle));
        Ok((source_handle, target_handle))
    }

    /// Connects the source side only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the source cannot be reached.
    pub async fn connect_source(&mut self, source: &ConnectionConfig) -> Result<Arc<dyn Deployment>> {
        self.close().await;
        let handle = self.open("source", source).await?;
        info!("Connected to source deployment");
        self.source = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Source handle, if connected.
    pub fn source(&self) -> Option<Arc<dyn Deployment>> {
        self.source.clone()
    }

    /// Target handle, if connected.
    pub fn target(&self) -> Option<Arc<dyn Deployment>> {
        self.target.clone()
    }

    /// Closes every open handle. Safe to call repeatedly.
    pub async fn close(&mut self) {
        if let Some(source) = self.source.take() {
            release("source", source.as_ref()).await;
        }
        if let Some(target) = self.target.take() {
            release("target", target.as_ref()).await;
        }
    }

    async fn open(&self, side: &str, config: &ConnectionConfig) -> Result<Arc<dyn Deployment>> {
        config.validate(side)?;
        self.connector.open(config).await.map_err(|e| match e {
            Error::Connection { message, .. } => Error::connection(side, message),
            other => Error::connection(side, other.to_string()),
        })
    }
}

async fn release(side: &str, deployment: &dyn Deployment) {
    match deployment.close().await {
        Ok(()) => info!(side, "Connection closed"),
        Err(e) => warn!(side, error = %e, "Failed to close connection"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::{MemoryConnector, MemoryDeployment};

    fn setup() -> (Arc<MemoryDeployment>, Arc<MemoryDeployment>, ConnectionManager) {
        let source = Arc::new(MemoryDeployment::new());
        let target = Arc::new(MemoryDeployment::new());
        let connector = MemoryConnector::new()
            .with_deployment("mongodb://source", Arc::clone(&source))
            .with_deployment("mongodb://target", Arc::clone(&target));
        (source, target, ConnectionManager::new(Arc::new(connector)))
    }

    #[tokio::test]
    async fn test_connect_and_close() {
        let (source, target, mut manager) = setup();
        manager
            .connect(
                &ConnectionConfig::new("mongodb://source"),
                &ConnectionConfig::new("mongodb://target"),
            )
            .await
            .unwrap();
        assert!(manager.source().is_some());
        assert!(manager.target().is_some());

        manager.close().await;
        manager.close().await;
        assert_eq!(source.close_count(), 1);
        assert_eq!(target.close_count(), 1);
        assert!(manager.source().is_none());
    }

    #[tokio::test]
    async fn test_failed_target_closes_source() {
        let (source, target, mut manager) = setup();
        target.set_unreachable(true);

        let err = manager
            .connect(
                &ConnectionConfig::new("mongodb://source"),
                &ConnectionConfig::new("mongodb://target"),
            )
            .await
            .err()
            .unwrap();

        match err {
            Error::Connection { side, .. } => assert_eq!(side, "target"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(source.close_count(), 1);
        assert!(source.is_closed());
        assert!(manager.source().is_none());
    }

    #[tokio::test]
    async fn test_failed_source_opens_nothing() {
        let (source, target, mut manager) = setup();
        source.set_unreachable(true);

        let err = manager
            .connect(
                &ConnectionConfig::new("mongodb://source"),
                &ConnectionConfig::new("mongodb://target"),
            )
            .await
            .err()
            .unwrap();

        assert!(err.to_string().contains("(source)"));
        assert_eq!(target.close_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_uri_names_side() {
        let (_, _, mut manager) = setup();
        let err = manager
            .connect_source(&ConnectionConfig::new(""))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("source.uri"));
    }

    #[tokio::test]
    async fn test_connect_source_only() {
        let (source, _, mut manager) = setup();
        manager
            .connect_source(&ConnectionConfig::new("mongodb://source"))
            .await
            .unwrap();
        assert!(manager.target().is_none());
        manager.close().await;
        assert_eq!(source.close_count(), 1);
    }
}
