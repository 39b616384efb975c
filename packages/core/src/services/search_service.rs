//! Search Service - Exact Value Lookup
//!
//! Finds nodes owning an attribute or text field whose value equals the query
//! and renders each as a standalone element: its own attributes and text, no
//! descendants. There is one result per matching field, in field order, so a
//! node matching through several fields is reported once for each.

use crate::db::DatabaseService;
use crate::models::{element_from_rows, NodeId};
use crate::services::error::XmlStoreError;
use crate::services::tree_store::load_document;
use crate::utils::render_element;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SearchService {
    db: Arc<DatabaseService>,
}

impl SearchService {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Matches across every stored document
    pub async fn search(&self, value: &str) -> Result<Vec<String>, XmlStoreError> {
        let conn = self.db.connect_with_timeout().await?;
        let ids = self.db.db_find_value_matches(&conn, value).await?;

        let mut rendered: HashMap<NodeId, String> = HashMap::new();
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(element) = rendered.get(&id) {
                results.push(element.clone());
                continue;
            }
            let Some(node) = self.db.db_get_node(&conn, id).await? else {
                continue;
            };
            let fields = self.db.db_get_fields(&conn, id).await?;
            let element = render_element(&element_from_rows(&node, &fields))?;
            rendered.insert(id, element.clone());
            results.push(element);
        }

        tracing::debug!("Search for '{}' matched {} fields", value, results.len());
        Ok(results)
    }

    /// Matches inside the document rooted at `root_id` only
    pub async fn search_in(
        &self,
        root_id: NodeId,
        value: &str,
    ) -> Result<Vec<String>, XmlStoreError> {
        let conn = self.db.connect_with_timeout().await?;
        let document = load_document(&self.db, &conn, root_id).await?;
        let ids = self.db.db_find_value_matches(&conn, value).await?;

        let mut results = Vec::new();
        for id in ids {
            if let Some(element) = document.element(id) {
                results.push(render_element(&element)?);
            }
        }

        tracing::debug!(
            "Search for '{}' in document {} matched {} fields",
            value,
            root_id,
            results.len()
        );
        Ok(results)
    }
}
