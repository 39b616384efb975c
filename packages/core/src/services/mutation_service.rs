//! Mutation Service - Line-Addressed Edits
//!
//! Value replacement, subtree insertion and sibling reorder. Each call parses
//! and validates its input before touching storage, then resolves the line
//! and applies the change inside a single transaction, so the node a line
//! resolved to cannot change before the write lands.

use crate::db::DatabaseService;
use crate::models::{FieldEdit, NodeId, XmlTree};
use crate::services::error::XmlStoreError;
use crate::services::line_resolver::resolve_on;
use crate::services::tree_store::persist_tree;
use crate::utils::parse_document;
use libsql::Connection;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct MutationService {
    db: Arc<DatabaseService>,
    max_depth: usize,
}

impl MutationService {
    pub fn new(db: Arc<DatabaseService>, max_depth: usize) -> Self {
        Self { db, max_depth }
    }

    /// Overwrite one field of the node on `line`
    ///
    /// `edit` is `key=value`, split on the first `=`. The key `__text__`
    /// addresses the element text. Fields are never created here.
    ///
    /// # Errors
    ///
    /// - `BadFormat` if `edit` has no `=` or an empty key
    /// - `LineNotFound` / `DocumentNotFound` if the line does not resolve
    /// - `FieldNotFound` if the node has no field with that key
    pub async fn set_value(
        &self,
        root_id: NodeId,
        line: usize,
        edit: &str,
    ) -> Result<(), XmlStoreError> {
        let edit = FieldEdit::parse(edit).inspect_err(|e| {
            tracing::warn!("Rejected edit for document {}: {}", root_id, e);
        })?;

        let conn = self.db.begin_transaction().await?;
        let result = self.set_value_on(&conn, root_id, line, &edit).await;
        let node_id = self.db.finish_transaction(&conn, result).await?;

        tracing::info!(
            "Set '{}' on node {} (document {}, line {})",
            edit.key,
            node_id,
            root_id,
            line
        );
        Ok(())
    }

    /// Append `fragment` as the last child of the node on `line`
    ///
    /// Returns the id of the fragment's root element.
    pub async fn insert(
        &self,
        root_id: NodeId,
        line: usize,
        fragment: &str,
    ) -> Result<NodeId, XmlStoreError> {
        let tree = parse_document(fragment, self.max_depth)?;

        let conn = self.db.begin_transaction().await?;
        let result = self.insert_on(&conn, root_id, line, &tree).await;
        let inserted = self.db.finish_transaction(&conn, result).await?;

        tracing::info!(
            "Inserted '{}' as node {} under line {} of document {}",
            tree.root().name,
            inserted,
            line,
            root_id
        );
        Ok(inserted)
    }

    /// Swap the node on `line` with the sibling currently at `position`
    ///
    /// Only the two ranks are exchanged; siblings in between keep theirs, so
    /// applying the same call twice restores the original order.
    ///
    /// # Errors
    ///
    /// - `InvalidPosition` if `position < 1`
    /// - `SiblingNotFound` if no sibling holds `position`
    /// - `NoSiblings` if the line resolves to the document root
    pub async fn reorder(
        &self,
        root_id: NodeId,
        line: usize,
        position: i64,
    ) -> Result<(), XmlStoreError> {
        if position < 1 {
            tracing::warn!("Rejected reorder to position {}", position);
            return Err(XmlStoreError::invalid_position(
                position,
                "positions start at 1",
            ));
        }

        let conn = self.db.begin_transaction().await?;
        let result = self.reorder_on(&conn, root_id, line, position).await;
        let swapped = self.db.finish_transaction(&conn, result).await?;

        match swapped {
            Some(other) => tracing::info!(
                "Swapped line {} of document {} with sibling node {} at position {}",
                line,
                root_id,
                other,
                position
            ),
            None => tracing::debug!(
                "Line {} of document {} already at position {}",
                line,
                root_id,
                position
            ),
        }
        Ok(())
    }

    async fn set_value_on(
        &self,
        conn: &Connection,
        root_id: NodeId,
        line: usize,
        edit: &FieldEdit,
    ) -> Result<NodeId, XmlStoreError> {
        let (_, node_id) = resolve_on(&self.db, conn, root_id, line).await?;

        let field = self
            .db
            .db_find_field(conn, node_id, &edit.key)
            .await?
            .ok_or_else(|| XmlStoreError::field_not_found(node_id, edit.key.clone()))?;

        self.db
            .db_update_field_value(conn, field.id, &edit.value)
            .await?;
        Ok(node_id)
    }

    async fn insert_on(
        &self,
        conn: &Connection,
        root_id: NodeId,
        line: usize,
        tree: &XmlTree,
    ) -> Result<NodeId, XmlStoreError> {
        let (_, parent_id) = resolve_on(&self.db, conn, root_id, line).await?;
        let child_count = self.db.db_count_children(conn, parent_id).await?;

        Ok(persist_tree(&self.db, conn, tree, Some(parent_id), child_count + 1).await?)
    }

    /// Returns the id of the sibling swapped with, `None` when already in place
    async fn reorder_on(
        &self,
        conn: &Connection,
        root_id: NodeId,
        line: usize,
        position: i64,
    ) -> Result<Option<NodeId>, XmlStoreError> {
        let (document, node_id) = resolve_on(&self.db, conn, root_id, line).await?;
        let node = document
            .node(node_id)
            .ok_or_else(|| XmlStoreError::line_not_found(root_id, line))?;
        let parent_id = node
            .parent_id
            .ok_or(XmlStoreError::NoSiblings { node_id })?;

        let sibling = self
            .db
            .db_find_sibling(conn, parent_id, position)
            .await?
            .ok_or_else(|| XmlStoreError::sibling_not_found(parent_id, position))?;

        if sibling.id == node.id {
            return Ok(None);
        }

        self.db.db_swap_sibling_ranks(conn, node, &sibling).await?;
        Ok(Some(sibling.id))
    }
}
