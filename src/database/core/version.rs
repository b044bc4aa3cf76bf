//! Schema version cell
//!
//! The version lives in SQLite's `user_version` header field rather than in a
//! table, so it exists in every database file, reads as `0` until first
//! written, and is updated atomically with the surrounding transaction.

use rusqlite::Connection;

use crate::database::error::{StoreError, StoreResult};

/// Version value of a database that has never been initialized
pub const UNSET_VERSION: u32 = 0;

/// Largest version the header cell can hold (`user_version` is a signed 32-bit field)
pub const MAX_VERSION: u32 = i32::MAX as u32;

/// Reads and writes the schema version stored in the database header
pub struct VersionStore<'a> {
    conn: &'a Connection,
}

impl<'a> VersionStore<'a> {
    /// Create a version store over a connection or an open transaction
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Read the stored schema version, `0` when unset
    pub fn read(&self) -> StoreResult<u32> {
        let raw: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .map_err(|e| StoreError::storage("Failed to read schema version", e))?;

        u32::try_from(raw).map_err(|_| {
            StoreError::StorageUnavailable(format!("Invalid schema version stored: {}", raw))
        })
    }

    /// Write the schema version
    ///
    /// Inside a transaction the value becomes visible to other connections
    /// only once the transaction commits. Versions above [`MAX_VERSION`] are
    /// rejected, SQLite would silently store them as something else.
    pub fn write(&self, version: u32) -> StoreResult<()> {
        check_version(version)?;
        self.conn
            .pragma_update(None, "user_version", version)
            .map_err(|e| StoreError::storage("Failed to write schema version", e))
    }
}

/// Fail for versions the header cell cannot represent
pub(crate) fn check_version(version: u32) -> StoreResult<()> {
    if version > MAX_VERSION {
        return Err(StoreError::StorageUnavailable(format!(
            "Schema version {} exceeds the maximum storable version {}",
            version, MAX_VERSION
        )));
    }
    Ok(())
}
