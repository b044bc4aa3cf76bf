//! Error types for opening and reconciling a store

use thiserror::Error;

/// Errors surfaced to callers of [`crate::database::Database`].
///
/// Migration problems never appear here: they are recovered internally by a
/// destructive rebuild. Only storage, rebuild and downgrade failures are fatal.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file or connection cannot be opened, configured or read.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Creating or dropping the entity set failed.
    #[error("schema rebuild failed: {0}")]
    RebuildFailure(String),

    /// The stored schema version is newer than this build understands.
    #[error("database schema version {found} is newer than supported version {target}")]
    SchemaTooNew { found: u32, target: u32 },

    /// The handle was used after `close()`.
    #[error("database is closed")]
    Closed,
}

impl StoreError {
    pub(crate) fn storage(context: &str, err: impl std::fmt::Display) -> Self {
        StoreError::StorageUnavailable(format!("{}: {}", context, err))
    }

    pub(crate) fn rebuild(context: &str, err: impl std::fmt::Display) -> Self {
        StoreError::RebuildFailure(format!("{}: {}", context, err))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StoreError::storage("Failed to open database", "disk I/O error");
        assert_eq!(
            err.to_string(),
            "storage unavailable: Failed to open database: disk I/O error"
        );

        let err = StoreError::SchemaTooNew {
            found: 14,
            target: 13,
        };
        assert_eq!(
            err.to_string(),
            "database schema version 14 is newer than supported version 13"
        );
    }
}
