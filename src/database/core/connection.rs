//! Database connection management
//!
//! This module provides the SQLite connection wrapper shared by the version
//! store, the schema registry and the migration runner.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use crate::database::error::{StoreError, StoreResult};

/// Default time SQLite keeps retrying a locked database before giving up
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Core database connection wrapper
///
/// `DatabaseConn` provides a thin wrapper around SQLite connections,
/// handling both file-based and in-memory databases with consistent
/// configuration and error handling.
pub struct DatabaseConn {
    pub conn: Connection,
}

impl DatabaseConn {
    /// Open a database at the specified path
    ///
    /// If the path is `None`, an in-memory database is created.
    pub fn open(path: Option<&Path>, busy_timeout: Duration) -> StoreResult<Self> {
        let conn = match path {
            Some(p) => Connection::open(p).map_err(|e| {
                StoreError::storage(
                    &format!("Failed to open database at '{}'", p.display()),
                    e,
                )
            })?,
            None => Connection::open_in_memory()
                .map_err(|e| StoreError::storage("Failed to create in-memory database", e))?,
        };

        let db = DatabaseConn { conn };
        db.configure(busy_timeout)?;
        Ok(db)
    }

    /// Open an existing database file for inspection only
    ///
    /// Skips the connection setup of [`open`](Self::open): the journal mode
    /// and header stay as they are and no file is created.
    pub fn open_read_only(path: &Path, busy_timeout: Duration) -> StoreResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            StoreError::storage(
                &format!("Failed to open database at '{}'", path.display()),
                e,
            )
        })?;

        conn.busy_timeout(busy_timeout)
            .map_err(|e| StoreError::storage("Failed to set busy timeout", e))?;

        // First read of the file header, so a corrupt file fails here
        let _: i64 = conn
            .query_row("PRAGMA schema_version", [], |row| row.get(0))
            .map_err(|e| StoreError::storage("Failed to read database header", e))?;

        Ok(DatabaseConn { conn })
    }

    /// Open a database file with the default busy timeout
    pub fn open_path(path: &Path) -> StoreResult<Self> {
        Self::open(Some(path), DEFAULT_BUSY_TIMEOUT)
    }

    /// Create an in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open(None, DEFAULT_BUSY_TIMEOUT)
    }

    fn configure(&self, busy_timeout: Duration) -> StoreResult<()> {
        // Lock contention is retried by SQLite until the timeout expires
        self.conn
            .busy_timeout(busy_timeout)
            .map_err(|e| StoreError::storage("Failed to set busy timeout", e))?;

        // Also the first read of the file header, so a corrupt file fails here
        let _: String = self
            .conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(|e| StoreError::storage("Failed to set journal mode", e))?;

        self.conn
            .execute("PRAGMA synchronous=NORMAL", [])
            .map_err(|e| StoreError::storage("Failed to set synchronous mode", e))?;

        self.conn
            .execute("PRAGMA foreign_keys=ON", [])
            .map_err(|e| StoreError::storage("Failed to enable foreign keys", e))?;

        Ok(())
    }

    /// Execute a SQL statement
    pub fn execute(&self, sql: &str) -> StoreResult<usize> {
        self.conn
            .execute(sql, [])
            .map_err(|e| StoreError::storage("Failed to execute SQL", e))
    }

    /// Begin an unchecked transaction
    ///
    /// Every reconciliation path runs its schema change and its version write
    /// inside one of these.
    pub fn transaction(&self) -> StoreResult<rusqlite::Transaction<'_>> {
        self.conn
            .unchecked_transaction()
            .map_err(|e| StoreError::storage("Failed to begin transaction", e))
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> StoreResult<bool> {
        table_exists(&self.conn, table_name)
    }

    /// Get the row count for a table
    pub fn table_count(&self, table_name: &str) -> StoreResult<u64> {
        let query = format!("SELECT COUNT(*) FROM \"{}\"", table_name);
        let count: u64 = self
            .conn
            .query_row(&query, [], |row| row.get(0))
            .map_err(|e| StoreError::storage("Failed to get table count", e))?;
        Ok(count)
    }

    /// List the column names of a table, in declaration order
    pub fn column_names(&self, table_name: &str) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1)")
            .map_err(|e| StoreError::storage("Failed to read table info", e))?;
        let names = stmt
            .query_map([table_name], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::storage("Failed to read table info", e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::storage("Failed to read table info", e))?;
        Ok(names)
    }

    /// Close the connection, reporting any error from SQLite
    pub fn close(self) -> StoreResult<()> {
        self.conn
            .close()
            .map_err(|(_, e)| StoreError::storage("Failed to close database", e))
    }
}

/// Check if a table exists on any connection or transaction
pub(crate) fn table_exists(conn: &Connection, table_name: &str) -> StoreResult<bool> {
    let count: i32 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [table_name],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::storage("Failed to check table existence", e))?;
    Ok(count > 0)
}
