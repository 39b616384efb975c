//! XmlSpace Core
//!
//! Stores XML documents as rows of a relational database and edits them by
//! the line a node occupies in the document's canonical rendering.
//!
//! # Architecture
//!
//! - **Two tables**: `nodes` (tag, parent link, sibling rank) and `fields`
//!   (attributes plus a reserved `__text__` key for element text)
//! - **libsql**: Embedded SQLite-compatible database, one transaction per call
//! - **Line addressing**: one opening tag per rendered line, resolved in preorder
//!
//! # Modules
//!
//! - [`models`] - Row types, element arena and stored-document view
//! - [`db`] - Database layer with libsql integration
//! - [`services`] - TreeStore, line resolution, mutations, search, `XmlStore`
//! - [`utils`] - quick-xml parsing and canonical rendering
//! - [`config`] - Store configuration
//!
//! # Example
//!
//! ```no_run
//! use xmlspace_core::XmlStore;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = XmlStore::open_path("./data/xmlspace.db").await?;
//! let root = store.store(r#"<root><person id="1"><age>30</age></person></root>"#).await?;
//! store.set_value(root, 3, "__text__=31").await?;
//! println!("{}", store.retrieve(root).await?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::XmlSpaceConfig;
pub use models::*;
pub use services::*;
