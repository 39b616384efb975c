//! Database Layer
//!
//! This module handles all database interactions using libsql:
//!
//! - Database initialization and connection management
//! - The two-table schema: `nodes` (tree) and `fields` (attributes and text)
//! - Row-level primitives the services compose inside one transaction
//!
//! # Architecture
//!
//! The parent link on `nodes` is a plain foreign key used for traversal. The
//! engine never relies on cascades: subtree deletion order is computed in
//! memory and executed bottom-up.

mod database;
mod error;

pub use database::{DatabaseService, DEFAULT_BUSY_TIMEOUT_MS};
pub use error::DatabaseError;
