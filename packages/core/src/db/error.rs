//! Database Error Types
//!
//! Errors raised by the storage layer: opening the database file, creating the
//! schema, and executing statements against the `nodes` and `fields` tables.

use std::path::PathBuf;
use thiserror::Error;

/// Storage layer errors
///
/// Service-level outcomes (unknown line, missing field, bad position) are not
/// represented here; they belong to `XmlStoreError`.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open the database file
    #[error("Failed to connect to database at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Failed to create tables or indexes
    #[error("Failed to initialize database schema: {0}")]
    InitializationFailed(String),

    /// Permission denied when creating the database directory
    #[error("Permission denied for database path: {path}")]
    PermissionDenied { path: PathBuf },

    /// Failed to create parent directory
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// libsql operation error
    #[error("Database operation failed: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },

    /// A row did not have the expected column types
    #[error("Unexpected row shape in {table}: {message}")]
    RowDecodeFailed { table: &'static str, message: String },
}

impl DatabaseError {
    /// Create a connection failed error
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    /// Create an initialization failed error
    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create a permission denied error
    pub fn permission_denied(path: PathBuf) -> Self {
        Self::PermissionDenied { path }
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }

    /// Create a row decode error for `table`
    pub fn row_decode(table: &'static str, message: impl Into<String>) -> Self {
        Self::RowDecodeFailed {
            table,
            message: message.into(),
        }
    }
}
