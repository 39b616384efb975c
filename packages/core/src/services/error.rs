//! Service Layer Error Types
//!
//! Typed outcomes of the document operations. Parse and validation errors are
//! raised before any write; persistence errors arrive after the enclosing
//! transaction has been rolled back.

use crate::db::DatabaseError;
use crate::models::{NodeId, ValidationError};
use crate::utils::XmlError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlStoreError {
    /// Input is not well-formed XML
    #[error("Parse error: {0}")]
    Parse(#[from] XmlError),

    /// No node occupies `line` in the document rooted at `root`
    #[error("No node at line {line} of document {root}")]
    LineNotFound { root: NodeId, line: usize },

    /// The resolved node has no field with this key
    #[error("Node {node_id} has no field '{key}'")]
    FieldNotFound { node_id: NodeId, key: String },

    /// Id does not name a stored document root
    #[error("Document not found: {id}")]
    DocumentNotFound { id: NodeId },

    /// The resolved node is a document root and has no siblings
    #[error("Node {node_id} is a document root and has no siblings")]
    NoSiblings { node_id: NodeId },

    /// No sibling holds the requested position under `parent_id`
    #[error("Node {parent_id} has no child at position {position}")]
    SiblingNotFound { parent_id: NodeId, position: i64 },

    /// Edit string is not of the form `key=value`
    #[error("Bad edit format: {0}")]
    BadFormat(String),

    /// Target sibling position is below 1
    #[error("Invalid position {position}: {reason}")]
    InvalidPosition { position: i64, reason: String },

    /// Storage failure; the operation's writes were rolled back
    #[error("Persistence error: {0}")]
    Persistence(#[from] DatabaseError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl XmlStoreError {
    /// Create a line not found error
    pub fn line_not_found(root: NodeId, line: usize) -> Self {
        Self::LineNotFound { root, line }
    }

    /// Create a field not found error
    pub fn field_not_found(node_id: NodeId, key: impl Into<String>) -> Self {
        Self::FieldNotFound {
            node_id,
            key: key.into(),
        }
    }

    /// Create a document not found error
    pub fn document_not_found(id: NodeId) -> Self {
        Self::DocumentNotFound { id }
    }

    /// Create a sibling not found error
    pub fn sibling_not_found(parent_id: NodeId, position: i64) -> Self {
        Self::SiblingNotFound {
            parent_id,
            position,
        }
    }

    /// Create an invalid position error
    pub fn invalid_position(position: i64, reason: impl Into<String>) -> Self {
        Self::InvalidPosition {
            position,
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// True for every flavour of "the addressed thing does not exist"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::LineNotFound { .. }
                | Self::FieldNotFound { .. }
                | Self::DocumentNotFound { .. }
                | Self::NoSiblings { .. }
                | Self::SiblingNotFound { .. }
        )
    }
}

impl From<ValidationError> for XmlStoreError {
    fn from(err: ValidationError) -> Self {
        Self::BadFormat(err.to_string())
    }
}
