//! Document Services
//!
//! This module contains the operations over stored documents:
//!
//! - `TreeStore` - store, retrieve, list and remove whole documents
//! - `LineAddressResolver` - map a rendered line to the node on it
//! - `MutationService` - set values, insert subtrees, reorder siblings
//! - `SearchService` - exact-match value lookup
//! - `XmlStore` - the handle that bundles all of the above
//!
//! Services share one `DatabaseService`; each mutating call runs in its own
//! transaction.

pub mod error;
pub mod line_resolver;
pub mod mutation_service;
pub mod search_service;
pub mod tree_store;
pub mod xml_store;

pub use error::XmlStoreError;
pub use line_resolver::{addressable_lines, body_line_to_address, LineAddressResolver};
pub use mutation_service::MutationService;
pub use search_service::SearchService;
pub use tree_store::TreeStore;
pub use xml_store::XmlStore;
