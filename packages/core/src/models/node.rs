//! Persisted Row Structures
//!
//! This module defines the row-level types that mirror the two relational
//! tables backing every stored document:
//!
//! - `nodes` - one row per XML element (`Node`)
//! - `fields` - one row per attribute or text value (`Field`)
//!
//! # Text Sentinel
//!
//! Element text shares the `fields` table with attributes. A field whose key is
//! [`TEXT_FIELD_KEY`] holds the element's text content; every other key is a
//! genuine XML attribute. The codec refuses documents that use the sentinel as
//! a real attribute name, so the two never collide in storage.
//!
//! # Examples
//!
//! ```rust
//! use xmlspace_core::models::{FieldEdit, TEXT_FIELD_KEY};
//!
//! let edit = FieldEdit::parse("__text__=updated").unwrap();
//! assert_eq!(edit.key, TEXT_FIELD_KEY);
//! assert_eq!(edit.value, "updated");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Surrogate key of a row in the `nodes` table
pub type NodeId = i64;

/// Reserved field key marking a node's text content
pub const TEXT_FIELD_KEY: &str = "__text__";

/// Validation errors for caller-supplied edit strings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Edit must have the form key=value, got '{0}'")]
    MissingSeparator(String),

    #[error("Edit key must not be empty")]
    EmptyKey,
}

/// One XML element as stored in the `nodes` table.
///
/// # Fields
///
/// - `id`: Surrogate integer assigned by the database on insert
/// - `name`: Element tag name
/// - `parent_id`: Parent element, `None` for a document root
/// - `sibling_rank`: 1-based position among the parent's children
///
/// The parent link is a back-reference used for traversal only. The engine
/// computes deletion order itself instead of relying on a storage cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub parent_id: Option<NodeId>,
    pub sibling_rank: i64,
}

impl Node {
    /// Whether this node is the root of a stored document
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// One key/value pair attached to a node, stored in the `fields` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: i64,
    pub node_id: NodeId,
    pub key: String,
    pub value: String,
}

impl Field {
    /// Whether this field carries the element text rather than an attribute
    pub fn is_text(&self) -> bool {
        self.key == TEXT_FIELD_KEY
    }
}

/// Entry returned by document listing: a root node's id and tag name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: NodeId,
    pub name: String,
}

impl From<(NodeId, String)> for DocumentSummary {
    fn from((id, name): (NodeId, String)) -> Self {
        Self { id, name }
    }
}

/// A parsed `key=value` edit request.
///
/// The string is split on the first `=`, so values may themselves contain
/// `=`. A key of [`TEXT_FIELD_KEY`] targets the element text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEdit {
    pub key: String,
    pub value: String,
}

impl FieldEdit {
    /// Parse an edit string of the form `key=value`
    ///
    /// # Errors
    ///
    /// - `MissingSeparator` if the string has no `=`
    /// - `EmptyKey` if nothing precedes the first `=`
    pub fn parse(edit: &str) -> Result<Self, ValidationError> {
        let (key, value) = edit
            .split_once('=')
            .ok_or_else(|| ValidationError::MissingSeparator(edit.to_string()))?;

        if key.is_empty() {
            return Err(ValidationError::EmptyKey);
        }

        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    /// Whether the edit targets the element text
    pub fn targets_text(&self) -> bool {
        self.key == TEXT_FIELD_KEY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_edit_splits_on_first_separator() {
        let edit = FieldEdit::parse("formula=a=b").unwrap();
        assert_eq!(edit.key, "formula");
        assert_eq!(edit.value, "a=b");
    }

    #[test]
    fn test_parse_edit_allows_empty_value() {
        let edit = FieldEdit::parse("name=").unwrap();
        assert_eq!(edit.key, "name");
        assert_eq!(edit.value, "");
    }

    #[test]
    fn test_parse_edit_without_separator() {
        assert_eq!(
            FieldEdit::parse("name"),
            Err(ValidationError::MissingSeparator("name".to_string()))
        );
    }

    #[test]
    fn test_parse_edit_with_empty_key() {
        assert_eq!(FieldEdit::parse("=value"), Err(ValidationError::EmptyKey));
    }

    #[test]
    fn test_text_edit_detection() {
        assert!(FieldEdit::parse("__text__=x").unwrap().targets_text());
        assert!(!FieldEdit::parse("id=x").unwrap().targets_text());
    }

    #[test]
    fn test_node_serializes_camel_case() {
        let node = Node {
            id: 3,
            name: "age".to_string(),
            parent_id: Some(2),
            sibling_rank: 1,
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["parentId"], 2);
        assert_eq!(json["siblingRank"], 1);
        assert!(!node.is_root());
    }
}
