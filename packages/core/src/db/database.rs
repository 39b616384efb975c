//! Database Connection Management
//!
//! This module provides the database connection, schema initialization and the
//! row-level SQL used by the document services, on top of libsql.
//!
//! # Architecture
//!
//! - **Two tables**: `nodes` (element tree) and `fields` (attributes and text)
//! - **WAL mode**: Write-Ahead Logging for durable single-writer commits
//! - **Foreign keys**: Enabled on every connection, no `ON DELETE CASCADE`;
//!   deletion order is computed by the caller, bottom-up
//! - **Unique sibling ranks**: `(parent_id, sibling_rank)` is a UNIQUE index
//!
//! # Connections and transactions
//!
//! Every `db_*` method takes the connection to run on. A service opens one
//! connection per call with [`DatabaseService::begin_transaction`], runs all of
//! its reads and writes on it, and hands the outcome to
//! [`DatabaseService::finish_transaction`], which commits on success and rolls
//! back on failure.
//!
//! ```no_run
//! # use xmlspace_core::db::{DatabaseError, DatabaseService};
//! # use std::path::PathBuf;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db = DatabaseService::new(PathBuf::from("./data/xmlspace.db")).await?;
//! let conn = db.begin_transaction().await?;
//! let result: Result<i64, DatabaseError> = db.db_insert_node(&conn, "root", None, 1).await;
//! let root_id = db.finish_transaction(&conn, result).await?;
//! # Ok(())
//! # }
//! ```

use crate::db::error::DatabaseError;
use crate::models::{DocumentSummary, Field, Node, NodeId, StoredDocument};
use libsql::{Builder, Connection, Database, Row};
use std::path::PathBuf;
use std::sync::Arc;

/// Busy timeout applied to every connection unless configured otherwise
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Rank a node holds briefly while two siblings exchange positions.
/// Real ranks start at 1, so the unique index never sees a clash on it.
const PARKED_RANK: i64 = 0;

const NODE_COLUMNS: &str = "id, name, parent_id, sibling_rank";
const FIELD_COLUMNS: &str = "id, node_id, key, value";

const SUBTREE_CTE: &str = "WITH RECURSIVE subtree(id) AS (
        SELECT id FROM nodes WHERE id = ?1
        UNION ALL
        SELECT n.id FROM nodes n JOIN subtree s ON n.parent_id = s.id
    )";

/// Database service for the libsql connection and schema
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,

    busy_timeout_ms: u64,
}

impl DatabaseService {
    /// Open (or create) the database at `db_path` with the default busy timeout
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the directory cannot be created, the file
    /// cannot be opened, or schema creation fails.
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        Self::with_busy_timeout(db_path, DEFAULT_BUSY_TIMEOUT_MS).await
    }

    /// Open (or create) the database with an explicit busy timeout in milliseconds
    pub async fn with_busy_timeout(
        db_path: PathBuf,
        busy_timeout_ms: u64,
    ) -> Result<Self, DatabaseError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
            busy_timeout_ms,
        };

        service.initialize_schema().await?;
        tracing::debug!("Opened database at {}", service.db_path.display());

        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements may return rows, so they go through query() rather
    /// than execute().
    async fn execute_pragma(&self, conn: &Connection, pragma: &str) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Create tables and indexes, idempotently
    async fn initialize_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS nodes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                parent_id INTEGER,
                sibling_rank INTEGER NOT NULL,
                FOREIGN KEY (parent_id) REFERENCES nodes(id)
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!("Failed to create nodes table: {}", e))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS fields (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                node_id INTEGER NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                FOREIGN KEY (node_id) REFERENCES nodes(id)
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!("Failed to create fields table: {}", e))
        })?;

        self.create_indexes(&conn).await
    }

    async fn create_indexes(&self, conn: &Connection) -> Result<(), DatabaseError> {
        let indexes = [
            (
                "idx_nodes_parent",
                "CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent_id)",
            ),
            // Sibling ranks are unique per parent; NULL parents (roots) never collide
            (
                "idx_nodes_parent_rank",
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_nodes_parent_rank
                 ON nodes(parent_id, sibling_rank)",
            ),
            (
                "idx_fields_node",
                "CREATE INDEX IF NOT EXISTS idx_fields_node ON fields(node_id)",
            ),
            (
                "idx_fields_value",
                "CREATE INDEX IF NOT EXISTS idx_fields_value ON fields(value)",
            ),
        ];

        for (name, sql) in indexes {
            conn.execute(sql, ()).await.map_err(|e| {
                DatabaseError::initialization_failed(format!(
                    "Failed to create index '{}': {}",
                    name, e
                ))
            })?;
        }

        Ok(())
    }

    /// Get a bare connection with no per-connection settings applied
    ///
    /// Prefer [`connect_with_timeout`](Self::connect_with_timeout), which also
    /// sets the busy timeout and enables foreign keys.
    pub fn connect(&self) -> Result<Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get a connection with busy timeout and foreign keys configured
    pub async fn connect_with_timeout(&self) -> Result<Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, &format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms))
            .await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        Ok(conn)
    }

    /// Open a connection and start a write transaction on it
    pub async fn begin_transaction(&self) -> Result<Connection, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        conn.execute("BEGIN IMMEDIATE", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;
        Ok(conn)
    }

    /// Commit when `result` is `Ok`, roll back when it is `Err`
    ///
    /// A failed COMMIT is rolled back and reported as a `DatabaseError`.
    pub async fn finish_transaction<T, E>(
        &self,
        conn: &Connection,
        result: Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<DatabaseError> + std::fmt::Display,
    {
        match result {
            Ok(value) => {
                if let Err(e) = conn.execute("COMMIT", ()).await {
                    let _rollback = conn.execute("ROLLBACK", ()).await;
                    return Err(DatabaseError::sql_execution(format!(
                        "Failed to commit transaction: {}",
                        e
                    ))
                    .into());
                }
                Ok(value)
            }
            Err(err) => {
                tracing::warn!("Rolling back transaction: {}", err);
                let _rollback = conn.execute("ROLLBACK", ()).await;
                Err(err)
            }
        }
    }

    fn row_to_node(row: &Row) -> Result<Node, DatabaseError> {
        let decode = |e: libsql::Error| DatabaseError::row_decode("nodes", e.to_string());
        Ok(Node {
            id: row.get(0).map_err(decode)?,
            name: row.get(1).map_err(decode)?,
            parent_id: row.get(2).map_err(decode)?,
            sibling_rank: row.get(3).map_err(decode)?,
        })
    }

    fn row_to_field(row: &Row) -> Result<Field, DatabaseError> {
        let decode = |e: libsql::Error| DatabaseError::row_decode("fields", e.to_string());
        Ok(Field {
            id: row.get(0).map_err(decode)?,
            node_id: row.get(1).map_err(decode)?,
            key: row.get(2).map_err(decode)?,
            value: row.get(3).map_err(decode)?,
        })
    }

    async fn collect_nodes(mut rows: libsql::Rows) -> Result<Vec<Node>, DatabaseError> {
        let mut nodes = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            nodes.push(Self::row_to_node(&row)?);
        }
        Ok(nodes)
    }

    async fn collect_fields(mut rows: libsql::Rows) -> Result<Vec<Field>, DatabaseError> {
        let mut fields = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            fields.push(Self::row_to_field(&row)?);
        }
        Ok(fields)
    }

    //
    // NODE OPERATIONS
    //

    /// Insert one node row and return its generated id
    pub async fn db_insert_node(
        &self,
        conn: &Connection,
        name: &str,
        parent_id: Option<NodeId>,
        sibling_rank: i64,
    ) -> Result<NodeId, DatabaseError> {
        conn.execute(
            "INSERT INTO nodes (name, parent_id, sibling_rank) VALUES (?, ?, ?)",
            (name, parent_id, sibling_rank),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to insert node '{}': {}", name, e))
        })?;

        Ok(conn.last_insert_rowid())
    }

    /// Fetch one node row by id
    pub async fn db_get_node(
        &self,
        conn: &Connection,
        id: NodeId,
    ) -> Result<Option<Node>, DatabaseError> {
        let mut rows = conn
            .query(&format!("SELECT {} FROM nodes WHERE id = ?", NODE_COLUMNS), [id])
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to execute get_node query: {}", e))
            })?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            Some(row) => Ok(Some(Self::row_to_node(&row)?)),
            None => Ok(None),
        }
    }

    /// All document roots (`parent_id IS NULL`) in ascending id order
    pub async fn db_list_roots(
        &self,
        conn: &Connection,
    ) -> Result<Vec<DocumentSummary>, DatabaseError> {
        let mut rows = conn
            .query(
                "SELECT id, name FROM nodes WHERE parent_id IS NULL ORDER BY id ASC",
                (),
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to list roots: {}", e)))?;

        let mut roots = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            let decode = |e: libsql::Error| DatabaseError::row_decode("nodes", e.to_string());
            let id: NodeId = row.get(0).map_err(decode)?;
            let name: String = row.get(1).map_err(decode)?;
            roots.push(DocumentSummary { id, name });
        }

        Ok(roots)
    }

    /// Number of direct children of `parent_id`
    pub async fn db_count_children(
        &self,
        conn: &Connection,
        parent_id: NodeId,
    ) -> Result<i64, DatabaseError> {
        let mut rows = conn
            .query("SELECT COUNT(*) FROM nodes WHERE parent_id = ?", [parent_id])
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to count children: {}", e))
            })?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            Some(row) => row
                .get(0)
                .map_err(|e| DatabaseError::row_decode("nodes", e.to_string())),
            None => Ok(0),
        }
    }

    /// The child of `parent_id` holding `sibling_rank`, if any
    pub async fn db_find_sibling(
        &self,
        conn: &Connection,
        parent_id: NodeId,
        sibling_rank: i64,
    ) -> Result<Option<Node>, DatabaseError> {
        let rows = conn
            .query(
                &format!(
                    "SELECT {} FROM nodes WHERE parent_id = ? AND sibling_rank = ?",
                    NODE_COLUMNS
                ),
                (parent_id, sibling_rank),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to look up sibling: {}", e))
            })?;

        Ok(Self::collect_nodes(rows).await?.into_iter().next())
    }

    /// Exchange the sibling ranks of two nodes
    ///
    /// Parks `first` on a rank no real sibling holds so the unique
    /// `(parent_id, sibling_rank)` index is satisfied after each statement.
    pub async fn db_swap_sibling_ranks(
        &self,
        conn: &Connection,
        first: &Node,
        second: &Node,
    ) -> Result<(), DatabaseError> {
        let steps = [
            (first.id, PARKED_RANK),
            (second.id, first.sibling_rank),
            (first.id, second.sibling_rank),
        ];

        for (id, rank) in steps {
            conn.execute(
                "UPDATE nodes SET sibling_rank = ? WHERE id = ?",
                (rank, id),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to set rank of node {}: {}", id, e))
            })?;
        }

        Ok(())
    }

    /// Delete one node row
    ///
    /// The node's fields and children must already be gone.
    pub async fn db_delete_node(
        &self,
        conn: &Connection,
        id: NodeId,
    ) -> Result<u64, DatabaseError> {
        conn.execute("DELETE FROM nodes WHERE id = ?", [id])
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to delete node {}: {}", id, e))
            })
    }

    //
    // FIELD OPERATIONS
    //

    /// Insert one field row and return its generated id
    pub async fn db_insert_field(
        &self,
        conn: &Connection,
        node_id: NodeId,
        key: &str,
        value: &str,
    ) -> Result<i64, DatabaseError> {
        conn.execute(
            "INSERT INTO fields (node_id, key, value) VALUES (?, ?, ?)",
            (node_id, key, value),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to insert field '{}' on node {}: {}",
                key, node_id, e
            ))
        })?;

        Ok(conn.last_insert_rowid())
    }

    /// Fields of one node in insertion order
    pub async fn db_get_fields(
        &self,
        conn: &Connection,
        node_id: NodeId,
    ) -> Result<Vec<Field>, DatabaseError> {
        let rows = conn
            .query(
                &format!(
                    "SELECT {} FROM fields WHERE node_id = ? ORDER BY id ASC",
                    FIELD_COLUMNS
                ),
                [node_id],
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to get fields: {}", e)))?;

        Self::collect_fields(rows).await
    }

    /// First field of `node_id` with `key`, if any
    pub async fn db_find_field(
        &self,
        conn: &Connection,
        node_id: NodeId,
        key: &str,
    ) -> Result<Option<Field>, DatabaseError> {
        let rows = conn
            .query(
                &format!(
                    "SELECT {} FROM fields WHERE node_id = ? AND key = ? ORDER BY id ASC LIMIT 1",
                    FIELD_COLUMNS
                ),
                (node_id, key),
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to find field: {}", e)))?;

        Ok(Self::collect_fields(rows).await?.into_iter().next())
    }

    /// Overwrite the value of one field
    pub async fn db_update_field_value(
        &self,
        conn: &Connection,
        field_id: i64,
        value: &str,
    ) -> Result<u64, DatabaseError> {
        conn.execute("UPDATE fields SET value = ? WHERE id = ?", (value, field_id))
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to update field: {}", e)))
    }

    /// Delete every field of one node
    pub async fn db_delete_fields(
        &self,
        conn: &Connection,
        node_id: NodeId,
    ) -> Result<u64, DatabaseError> {
        conn.execute("DELETE FROM fields WHERE node_id = ?", [node_id])
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!(
                    "Failed to delete fields of node {}: {}",
                    node_id, e
                ))
            })
    }

    /// Owning node of every field whose value equals `value`, in field order
    ///
    /// A node matching through several fields appears once per field.
    pub async fn db_find_value_matches(
        &self,
        conn: &Connection,
        value: &str,
    ) -> Result<Vec<NodeId>, DatabaseError> {
        let mut rows = conn
            .query(
                "SELECT node_id FROM fields WHERE value = ? ORDER BY id ASC",
                [value],
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to search values: {}", e)))?;

        let mut ids = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            ids.push(
                row.get(0)
                    .map_err(|e| DatabaseError::row_decode("fields", e.to_string()))?,
            );
        }

        Ok(ids)
    }

    //
    // DOCUMENT OPERATIONS
    //

    /// Load every node and field of the subtree rooted at `root_id`
    ///
    /// Two queries over a recursive CTE; ordering and tree assembly happen in
    /// [`StoredDocument`]. Returns `None` if `root_id` does not exist.
    pub async fn db_load_subtree(
        &self,
        conn: &Connection,
        root_id: NodeId,
    ) -> Result<Option<StoredDocument>, DatabaseError> {
        let node_rows = conn
            .query(
                &format!(
                    "{} SELECT n.id, n.name, n.parent_id, n.sibling_rank
                     FROM nodes n JOIN subtree s ON n.id = s.id",
                    SUBTREE_CTE
                ),
                [root_id],
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to load subtree nodes: {}", e))
            })?;
        let nodes = Self::collect_nodes(node_rows).await?;

        if nodes.is_empty() {
            return Ok(None);
        }

        let field_rows = conn
            .query(
                &format!(
                    "{} SELECT f.id, f.node_id, f.key, f.value
                     FROM fields f JOIN subtree s ON f.node_id = s.id
                     ORDER BY f.id ASC",
                    SUBTREE_CTE
                ),
                [root_id],
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to load subtree fields: {}", e))
            })?;
        let fields = Self::collect_fields(field_rows).await?;

        Ok(StoredDocument::from_rows(root_id, nodes, fields))
    }

    /// Delete every row in both tables and restart id generation
    pub async fn db_clear(&self, conn: &Connection) -> Result<(), DatabaseError> {
        for sql in [
            "DELETE FROM fields",
            "DELETE FROM nodes",
            "DELETE FROM sqlite_sequence WHERE name IN ('nodes', 'fields')",
        ] {
            conn.execute(sql, ()).await.map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to clear tables: {}", e))
            })?;
        }
        Ok(())
    }
}
