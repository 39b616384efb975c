//! Data Models
//!
//! This module contains the data structures used throughout XmlSpace:
//!
//! - `Node` / `Field` - row-level mirrors of the `nodes` and `fields` tables
//! - `XmlTree` - index-addressed element arena produced by the parser
//! - `StoredDocument` - one document's rows assembled for traversal

mod document;
mod element;
mod node;

pub use document::{element_from_rows, StoredDocument};
pub use element::{ElementIndex, PreorderEntry, XmlElement, XmlTree};
pub use node::{
    DocumentSummary, Field, FieldEdit, Node, NodeId, ValidationError, TEXT_FIELD_KEY,
};
