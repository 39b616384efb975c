//! Line Address Resolution
//!
//! Translates a line of the canonical rendering into the id of the node that
//! opens on it. Lines count nodes in document order (node before children,
//! children by ascending sibling rank) with the root on line 1.
//!
//! Editors usually hide the root's own line. [`addressable_lines`] strips it
//! and [`body_line_to_address`] converts a body line back to a resolver line.

use crate::db::DatabaseService;
use crate::models::{NodeId, StoredDocument};
use crate::services::error::XmlStoreError;
use crate::services::tree_store::load_document;
use libsql::Connection;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct LineAddressResolver {
    db: Arc<DatabaseService>,
}

impl LineAddressResolver {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Id of the node on `line` of document `root_id`
    ///
    /// # Errors
    ///
    /// - `DocumentNotFound` if `root_id` is not a document root
    /// - `LineNotFound` if `line` is 0 or past the last node
    pub async fn resolve(&self, root_id: NodeId, line: usize) -> Result<NodeId, XmlStoreError> {
        let conn = self.db.connect_with_timeout().await?;
        let (_, node_id) = resolve_on(&self.db, &conn, root_id, line).await?;
        Ok(node_id)
    }
}

/// Resolve on an existing connection, returning the loaded document as well
/// so the caller can act on it within the same transaction.
pub(crate) async fn resolve_on(
    db: &DatabaseService,
    conn: &Connection,
    root_id: NodeId,
    line: usize,
) -> Result<(StoredDocument, NodeId), XmlStoreError> {
    let document = load_document(db, conn, root_id).await?;
    let node_id = document
        .node_at_line(line)
        .ok_or_else(|| XmlStoreError::line_not_found(root_id, line))?;

    tracing::debug!("Resolved line {} of document {} to node {}", line, root_id, node_id);
    Ok((document, node_id))
}

/// The editable body of a rendering: everything after the root's line
pub fn addressable_lines(rendered: &str) -> &str {
    rendered
        .split_once('\n')
        .map(|(_, body)| body)
        .unwrap_or("")
}

/// Resolver line for 1-based line `body_line` of [`addressable_lines`]
pub fn body_line_to_address(body_line: usize) -> usize {
    body_line + 1
}
