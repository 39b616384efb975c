//! Tree Store - Document Persistence
//!
//! Maps a parsed element tree onto `nodes` and `fields` rows and back:
//!
//! - `store` writes a whole document in one transaction, parent before children
//! - `retrieve` rebuilds the tree from two subtree queries and renders it
//! - `list` enumerates document roots in id order
//! - `remove` deletes a document bottom-up, descendants before ancestors
//!
//! # Sibling ranks
//!
//! Every child set holds ranks `1..=n` with no gaps. Store and insert assign
//! `position + 1`; reorder only exchanges two existing ranks; only whole
//! documents are ever removed.

use crate::db::{DatabaseError, DatabaseService};
use crate::models::{DocumentSummary, NodeId, StoredDocument, XmlTree, TEXT_FIELD_KEY};
use crate::services::error::XmlStoreError;
use crate::utils::{parse_document, render_document};
use libsql::Connection;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TreeStore {
    db: Arc<DatabaseService>,
    max_depth: usize,
}

impl TreeStore {
    pub fn new(db: Arc<DatabaseService>, max_depth: usize) -> Self {
        Self { db, max_depth }
    }

    /// Parse `text` with this store's depth limit
    pub fn parse(&self, text: &str) -> Result<XmlTree, XmlStoreError> {
        Ok(parse_document(text, self.max_depth)?)
    }

    /// Parse and persist a document, returning the new root's id
    ///
    /// # Errors
    ///
    /// - `Parse` if `text` is not one well-formed document; nothing is written
    /// - `Persistence` if any insert fails; every row written so far is rolled back
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use xmlspace_core::XmlStore;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let store = XmlStore::open_path("./data/xmlspace.db").await?;
    /// let root = store.store("<root><item id=\"1\">a</item></root>").await?;
    /// println!("{}", store.retrieve(root).await?);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn store(&self, text: &str) -> Result<NodeId, XmlStoreError> {
        let tree = self.parse(text)?;

        let conn = self.db.begin_transaction().await?;
        let result = persist_tree(&self.db, &conn, &tree, None, 1)
            .await
            .map_err(XmlStoreError::from);
        let root_id = self.db.finish_transaction(&conn, result).await?;

        tracing::info!(
            "Stored document '{}' as {} ({} elements)",
            tree.root().name,
            root_id,
            tree.len()
        );
        Ok(root_id)
    }

    /// Render the document rooted at `root_id` in canonical line-per-element form
    pub async fn retrieve(&self, root_id: NodeId) -> Result<String, XmlStoreError> {
        let conn = self.db.connect_with_timeout().await?;
        let document = load_document(&self.db, &conn, root_id).await?;
        Ok(render_document(&document.to_xml_tree())?)
    }

    /// All document roots in ascending id order
    pub async fn list(&self) -> Result<Vec<DocumentSummary>, XmlStoreError> {
        let conn = self.db.connect_with_timeout().await?;
        Ok(self.db.db_list_roots(&conn).await?)
    }

    /// Delete a document and every row beneath it in one transaction
    pub async fn remove(&self, root_id: NodeId) -> Result<(), XmlStoreError> {
        let conn = self.db.begin_transaction().await?;
        let result = self.remove_on(&conn, root_id).await;
        let removed = self.db.finish_transaction(&conn, result).await?;

        tracing::info!("Removed document {} ({} elements)", root_id, removed);
        Ok(())
    }

    /// Delete a document one row group at a time, each step committed on its own
    ///
    /// A failure part-way leaves the already deleted descendants gone and the
    /// rest of the document in place. Prefer [`remove`](Self::remove).
    pub async fn remove_stepwise(&self, root_id: NodeId) -> Result<(), XmlStoreError> {
        let conn = self.db.connect_with_timeout().await?;
        let document = load_document(&self.db, &conn, root_id).await?;

        for id in document.deletion_order() {
            self.db.db_delete_fields(&conn, id).await?;
            self.db.db_delete_node(&conn, id).await?;
        }

        tracing::info!(
            "Removed document {} stepwise ({} elements)",
            root_id,
            document.len()
        );
        Ok(())
    }

    /// Delete every document and restart id generation
    pub async fn clear(&self) -> Result<(), XmlStoreError> {
        let conn = self.db.begin_transaction().await?;
        let result = self.db.db_clear(&conn).await.map_err(XmlStoreError::from);
        self.db.finish_transaction(&conn, result).await?;

        tracing::info!("Cleared all documents");
        Ok(())
    }

    async fn remove_on(&self, conn: &Connection, root_id: NodeId) -> Result<usize, XmlStoreError> {
        let document = load_document(&self.db, conn, root_id).await?;
        for id in document.deletion_order() {
            self.db.db_delete_fields(conn, id).await?;
            self.db.db_delete_node(conn, id).await?;
        }
        Ok(document.len())
    }
}

/// Load a whole document; `root_id` must name a document root
pub(crate) async fn load_document(
    db: &DatabaseService,
    conn: &Connection,
    root_id: NodeId,
) -> Result<StoredDocument, XmlStoreError> {
    let document = db
        .db_load_subtree(conn, root_id)
        .await?
        .ok_or_else(|| XmlStoreError::document_not_found(root_id))?;

    if !document.root().is_root() {
        return Err(XmlStoreError::document_not_found(root_id));
    }

    tracing::debug!("Loaded document {} ({} elements)", root_id, document.len());
    Ok(document)
}

/// Insert `tree` in preorder under `parent` and return the id of its root.
///
/// The tree root takes `root_rank`; every other element takes its 1-based
/// position among its siblings. Text goes into the sentinel field, written
/// before the attributes.
pub(crate) async fn persist_tree(
    db: &DatabaseService,
    conn: &Connection,
    tree: &XmlTree,
    parent: Option<NodeId>,
    root_rank: i64,
) -> Result<NodeId, DatabaseError> {
    let mut ids: Vec<NodeId> = vec![0; tree.len()];

    for entry in tree.preorder() {
        let element = &tree[entry.index];
        let (parent_id, rank) = match entry.parent {
            Some(parent_index) => (Some(ids[parent_index]), entry.rank),
            None => (parent, root_rank),
        };

        let id = db
            .db_insert_node(conn, &element.name, parent_id, rank)
            .await?;
        ids[entry.index] = id;

        if let Some(text) = element.text.as_deref().filter(|t| !t.trim().is_empty()) {
            db.db_insert_field(conn, id, TEXT_FIELD_KEY, text).await?;
        }
        for (key, value) in &element.attributes {
            db.db_insert_field(conn, id, key, value).await?;
        }
    }

    Ok(ids[XmlTree::ROOT])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_store() -> (TreeStore, Arc<DatabaseService>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(
            DatabaseService::new(temp_dir.path().join("test.db"))
                .await
                .unwrap(),
        );
        (TreeStore::new(db.clone(), 64), db, temp_dir)
    }

    #[tokio::test]
    async fn test_store_assigns_preorder_ids_and_ranks() {
        let (store, db, _temp) = create_test_store().await;
        let root = store
            .store(r#"<r><a k="v">t</a><b/><c><d/></c></r>"#)
            .await
            .unwrap();

        let conn = db.connect_with_timeout().await.unwrap();
        let document = db.db_load_subtree(&conn, root).await.unwrap().unwrap();
        let order = document.preorder();
        assert_eq!(order, vec![1, 2, 3, 4, 5]);

        let ranks: Vec<i64> = order
            .iter()
            .map(|&id| document.node(id).unwrap().sibling_rank)
            .collect();
        assert_eq!(ranks, vec![1, 1, 2, 3, 1]);

        let keys: Vec<&str> = document.fields(2).iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec![TEXT_FIELD_KEY, "k"]);
    }

    #[tokio::test]
    async fn test_retrieve_child_is_not_a_document() {
        let (store, _db, _temp) = create_test_store().await;
        store.store("<r><a/></r>").await.unwrap();

        let err = store.retrieve(2).await.unwrap_err();
        assert!(matches!(err, XmlStoreError::DocumentNotFound { id: 2 }));
    }

    #[tokio::test]
    async fn test_depth_limit_applies() {
        let (store, _db, _temp) = create_test_store().await;
        let deep = format!("{}{}", "<a>".repeat(80), "</a>".repeat(80));

        let err = store.store(&deep).await.unwrap_err();
        assert!(matches!(err, XmlStoreError::Parse(_)));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_child_id_is_rejected() {
        let (store, _db, _temp) = create_test_store().await;
        store.store("<r><a/></r>").await.unwrap();

        assert!(store.remove(2).await.unwrap_err().is_not_found());
        assert!(store.remove_stepwise(2).await.unwrap_err().is_not_found());
        assert_eq!(store.retrieve(1).await.unwrap(), "<r>\n<a/></r>");
    }
}
