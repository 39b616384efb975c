//! XmlStore - Store Handle
//!
//! The single entry point callers hold. It is built from an explicit
//! configuration (no global connection), shares one database handle between
//! the services, and exposes every document operation as a method. Each call
//! acquires its own connection and releases it when the call returns.

use crate::config::XmlSpaceConfig;
use crate::db::DatabaseService;
use crate::models::{DocumentSummary, NodeId};
use crate::services::error::XmlStoreError;
use crate::services::line_resolver::LineAddressResolver;
use crate::services::mutation_service::MutationService;
use crate::services::search_service::SearchService;
use crate::services::tree_store::TreeStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct XmlStore {
    db: Arc<DatabaseService>,
    config: XmlSpaceConfig,
    trees: TreeStore,
    resolver: LineAddressResolver,
    mutations: MutationService,
    searches: SearchService,
}

impl XmlStore {
    /// Open the store described by `config`, creating the database if needed
    pub async fn open(config: XmlSpaceConfig) -> Result<Self, XmlStoreError> {
        config.validate().map_err(XmlStoreError::invalid_config)?;

        let db_path = config
            .resolve_database_path()
            .map_err(|e| XmlStoreError::invalid_config(e.to_string()))?;
        let db = Arc::new(
            DatabaseService::with_busy_timeout(db_path, config.busy_timeout_ms).await?,
        );

        tracing::info!("Opened XmlSpace store at {}", db.db_path.display());

        Ok(Self {
            trees: TreeStore::new(db.clone(), config.max_depth),
            resolver: LineAddressResolver::new(db.clone()),
            mutations: MutationService::new(db.clone(), config.max_depth),
            searches: SearchService::new(db.clone()),
            db,
            config,
        })
    }

    /// Open the store at `path` with default settings
    pub async fn open_path(path: impl Into<PathBuf>) -> Result<Self, XmlStoreError> {
        Self::open(XmlSpaceConfig::with_database_path(path)).await
    }

    pub fn config(&self) -> &XmlSpaceConfig {
        &self.config
    }

    pub fn database_path(&self) -> &Path {
        &self.db.db_path
    }

    /// Parse and persist a document; see [`TreeStore::store`]
    pub async fn store(&self, text: &str) -> Result<NodeId, XmlStoreError> {
        self.trees.store(text).await
    }

    pub async fn retrieve(&self, root_id: NodeId) -> Result<String, XmlStoreError> {
        self.trees.retrieve(root_id).await
    }

    pub async fn list(&self) -> Result<Vec<DocumentSummary>, XmlStoreError> {
        self.trees.list().await
    }

    pub async fn remove(&self, root_id: NodeId) -> Result<(), XmlStoreError> {
        self.trees.remove(root_id).await
    }

    pub async fn remove_stepwise(&self, root_id: NodeId) -> Result<(), XmlStoreError> {
        self.trees.remove_stepwise(root_id).await
    }

    pub async fn clear(&self) -> Result<(), XmlStoreError> {
        self.trees.clear().await
    }

    pub async fn resolve(&self, root_id: NodeId, line: usize) -> Result<NodeId, XmlStoreError> {
        self.resolver.resolve(root_id, line).await
    }

    pub async fn set_value(
        &self,
        root_id: NodeId,
        line: usize,
        edit: &str,
    ) -> Result<(), XmlStoreError> {
        self.mutations.set_value(root_id, line, edit).await
    }

    pub async fn insert(
        &self,
        root_id: NodeId,
        line: usize,
        fragment: &str,
    ) -> Result<NodeId, XmlStoreError> {
        self.mutations.insert(root_id, line, fragment).await
    }

    pub async fn reorder(
        &self,
        root_id: NodeId,
        line: usize,
        position: i64,
    ) -> Result<(), XmlStoreError> {
        self.mutations.reorder(root_id, line, position).await
    }

    pub async fn search(&self, value: &str) -> Result<Vec<String>, XmlStoreError> {
        self.searches.search(value).await
    }

    pub async fn search_in(
        &self,
        root_id: NodeId,
        value: &str,
    ) -> Result<Vec<String>, XmlStoreError> {
        self.searches.search_in(root_id, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_rejects_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = XmlSpaceConfig {
            database_path: Some(temp_dir.path().join("x.db")),
            max_depth: 0,
            ..Default::default()
        };

        let err = XmlStore::open(config).await.unwrap_err();
        assert!(matches!(err, XmlStoreError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_open_path_uses_given_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.db");

        let store = XmlStore::open_path(path.clone()).await.unwrap();
        assert_eq!(store.database_path(), path.as_path());
        assert!(store.list().await.unwrap().is_empty());
    }
}
