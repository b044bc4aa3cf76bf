//! Schema reconciliation on open
//!
//! [`Database`] owns the connection to a store and, before handing it out,
//! brings the file to the target schema version:
//!
//! - version unset: create every entity, write the target version
//! - version older than the target: apply the migration chain and write the
//!   target version; if the chain cannot be applied, drop and recreate every
//!   entity instead (all data is lost)
//! - version equal to the target: nothing
//! - version newer than the target: refuse to open
//!
//! Each path runs in a single transaction, so the stored version always
//! describes the tables that are actually on disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, warn};

use crate::database::core::{
    check_version, DatabaseConn, Entity, Field, SchemaRegistry, SchemaStatus, VersionStore,
    DEFAULT_BUSY_TIMEOUT,
};
use crate::database::entities::SCHEMA_VERSION;
use crate::database::error::{StoreError, StoreResult};
use crate::database::log::{MigrationLog, TracingLog};
use crate::database::migration::MigrationRunner;

/// Default database file name inside the storage directory
pub const DEFAULT_DB_NAME: &str = "stratum.db";

static DEFAULT_LOG: TracingLog = TracingLog;

/// What opening the store did to bring it to the target version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Reconciliation {
    /// Fresh file, all entities created
    Created { version: u32 },
    /// Already at the target version, nothing touched
    Current { version: u32 },
    /// Migration chain applied, data preserved
    Migrated { from: u32, to: u32, steps: usize },
    /// Migration impossible, all entities dropped and recreated
    Rebuilt { from: u32, to: u32, cause: String },
}

impl Reconciliation {
    /// Schema version after reconciliation
    pub fn version(&self) -> u32 {
        match self {
            Reconciliation::Created { version } | Reconciliation::Current { version } => *version,
            Reconciliation::Migrated { to, .. } | Reconciliation::Rebuilt { to, .. } => *to,
        }
    }
}

impl std::fmt::Display for Reconciliation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reconciliation::Created { version } => write!(f, "created schema v{}", version),
            Reconciliation::Current { version } => write!(f, "schema v{} is current", version),
            Reconciliation::Migrated { from, to, steps } => {
                write!(f, "migrated v{} -> v{} ({} steps)", from, to, steps)
            }
            Reconciliation::Rebuilt { from, to, cause } => {
                write!(f, "rebuilt v{} -> v{}, data discarded ({})", from, to, cause)
            }
        }
    }
}

/// Options for opening a [`Database`]
pub struct DatabaseOptions<'a> {
    entities: &'a [Entity],
    fields: &'a [Field],
    db_dir: PathBuf,
    db_name: String,
    migrate_dir: Option<PathBuf>,
    target_version: u32,
    busy_timeout: Duration,
    log: &'a dyn MigrationLog,
}

impl<'a> DatabaseOptions<'a> {
    /// Options for a store of `entities` in `db_dir`, targeting [`SCHEMA_VERSION`]
    pub fn new(entities: &'a [Entity], fields: &'a [Field], db_dir: impl AsRef<Path>) -> Self {
        Self {
            entities,
            fields,
            db_dir: db_dir.as_ref().to_path_buf(),
            db_name: DEFAULT_DB_NAME.to_string(),
            migrate_dir: None,
            target_version: SCHEMA_VERSION,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            log: &DEFAULT_LOG,
        }
    }

    pub fn db_name(mut self, name: impl Into<String>) -> Self {
        self.db_name = name.into();
        self
    }

    /// Directory holding migration steps; `None` disables migrations
    pub fn migrate_dir(mut self, dir: Option<&Path>) -> Self {
        self.migrate_dir = dir.map(Path::to_path_buf);
        self
    }

    /// Schema version the entity set describes
    pub fn target_version(mut self, version: u32) -> Self {
        self.target_version = version;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Receiver for create/migrate/drop reports
    pub fn logger(mut self, log: &'a dyn MigrationLog) -> Self {
        self.log = log;
        self
    }

    /// Full path of the database file
    pub fn path(&self) -> PathBuf {
        self.db_dir.join(&self.db_name)
    }

    /// Open the store and reconcile its schema
    pub fn open(self) -> StoreResult<Database> {
        check_version(self.target_version)?;
        std::fs::create_dir_all(&self.db_dir).map_err(|e| {
            StoreError::storage(
                &format!(
                    "Failed to create storage directory '{}'",
                    self.db_dir.display()
                ),
                e,
            )
        })?;

        let path = self.path();
        debug!("Opening database {}", path.display());
        let db = DatabaseConn::open(Some(path.as_path()), self.busy_timeout)?;
        let reconciliation = self.reconcile(&db)?;

        Ok(Database {
            db: Some(db),
            path,
            target_version: self.target_version,
            reconciliation,
        })
    }

    fn reconcile(&self, db: &DatabaseConn) -> StoreResult<Reconciliation> {
        let registry = SchemaRegistry::new(self.entities, self.fields, self.log);
        let stored = VersionStore::new(&db.conn).read()?;

        match SchemaStatus::classify(stored, self.target_version) {
            SchemaStatus::NotInitialized => {
                let tx = db.transaction()?;
                registry.create_all(&tx, self.target_version)?;
                VersionStore::new(&tx).write(self.target_version)?;
                tx.commit()
                    .map_err(|e| StoreError::rebuild("Failed to commit new schema", e))?;
                Ok(Reconciliation::Created {
                    version: self.target_version,
                })
            }
            SchemaStatus::Current { version } => Ok(Reconciliation::Current { version }),
            SchemaStatus::NeedsMigration { from, to } => self.migrate(db, &registry, from, to),
            SchemaStatus::Incompatible {
                database_version,
                required_version,
            } => Err(StoreError::SchemaTooNew {
                found: database_version,
                target: required_version,
            }),
        }
    }

    fn migrate(
        &self,
        db: &DatabaseConn,
        registry: &SchemaRegistry<'_>,
        from: u32,
        to: u32,
    ) -> StoreResult<Reconciliation> {
        self.log.info(&format!(
            "Migrating database schema from version {} to {}",
            from, to
        ));

        let tx = db.transaction()?;
        let cause = match MigrationRunner::new(self.migrate_dir.as_deref()).run(&tx, from, to) {
            Ok(steps) => {
                VersionStore::new(&tx).write(to)?;
                tx.commit()
                    .map_err(|e| StoreError::storage("Failed to commit migration", e))?;
                return Ok(Reconciliation::Migrated { from, to, steps });
            }
            Err(err) => {
                tx.rollback()
                    .map_err(|e| StoreError::storage("Failed to roll back migration", e))?;
                err
            }
        };

        self.log
            .warning(&format!("Cannot migrate database schema: {}", cause));

        let tx = db.transaction()?;
        registry.drop_all(&tx)?;
        registry.create_all(&tx, to)?;
        VersionStore::new(&tx).write(to)?;
        tx.commit()
            .map_err(|e| StoreError::rebuild("Failed to commit rebuilt schema", e))?;

        Ok(Reconciliation::Rebuilt {
            from,
            to,
            cause: cause.to_string(),
        })
    }
}

/// An open store whose schema is at the target version
pub struct Database {
    db: Option<DatabaseConn>,
    path: PathBuf,
    target_version: u32,
    reconciliation: Reconciliation,
}

impl Database {
    /// Open `db_dir/db_name` for the given entity set and reconcile it to
    /// [`SCHEMA_VERSION`]
    ///
    /// A stale store is migrated from `migrate_dir`; when that is `None` or
    /// the migration fails, the store is rebuilt empty.
    pub fn open(
        entities: &[Entity],
        fields: &[Field],
        db_dir: impl AsRef<Path>,
        db_name: &str,
        migrate_dir: Option<&Path>,
    ) -> StoreResult<Self> {
        DatabaseOptions::new(entities, fields, db_dir)
            .db_name(db_name)
            .migrate_dir(migrate_dir)
            .open()
    }

    /// Close the connection; further calls are no-ops
    pub fn close(&mut self) -> StoreResult<()> {
        match self.db.take() {
            Some(db) => db.close(),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.db.is_none()
    }

    /// Underlying connection, for the application's own queries
    pub fn connection(&self) -> StoreResult<&Connection> {
        self.db.as_ref().map(|db| &db.conn).ok_or(StoreError::Closed)
    }

    /// Stored schema version
    pub fn get_version(&self) -> StoreResult<u32> {
        VersionStore::new(self.connection()?).read()
    }

    /// Overwrite the stored schema version
    pub fn set_version(&self, version: u32) -> StoreResult<()> {
        VersionStore::new(self.connection()?).write(version)
    }

    /// What happened when this store was opened
    pub fn reconciliation(&self) -> &Reconciliation {
        &self.reconciliation
    }

    pub fn target_version(&self) -> u32 {
        self.target_version
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::{Column, ColumnKind};
    use crate::database::entities::{ENTITIES, FIELDS};
    use crate::database::log::testing::RecordingLog;
    use tempfile::TempDir;

    const MIGRATIONS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/migrations");

    fn insert_payment(db: &Database, subtask: &str) {
        db.connection()
            .unwrap()
            .execute(
                "INSERT INTO payment (subtask, payee, value, created, modified) \
                 VALUES (?1, 'payee', '0x10', 0, 0)",
                [subtask],
            )
            .unwrap();
    }

    fn count(db: &Database, table: &str) -> u64 {
        db.connection()
            .unwrap()
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })
            .unwrap()
    }

    fn open_logged(dir: &TempDir, migrate_dir: Option<&Path>, log: &RecordingLog) -> Database {
        DatabaseOptions::new(ENTITIES, FIELDS, dir.path())
            .migrate_dir(migrate_dir)
            .logger(log)
            .open()
            .unwrap()
    }

    /// Store at `version` with one payment row and all tables present
    fn stale_store(dir: &TempDir, version: u32) {
        let mut db = Database::open(ENTITIES, FIELDS, dir.path(), DEFAULT_DB_NAME, None).unwrap();
        insert_payment(&db, "old-subtask");
        db.set_version(version).unwrap();
        db.close().unwrap();
    }

    #[test]
    fn test_fresh_open_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let log = RecordingLog::default();
        let db = open_logged(&dir, None, &log);

        assert_eq!(db.get_version().unwrap(), SCHEMA_VERSION);
        assert_eq!(
            db.reconciliation(),
            &Reconciliation::Created {
                version: SCHEMA_VERSION
            }
        );
        for entity in ENTITIES {
            assert_eq!(count(&db, entity.name), 0);
        }
        assert_eq!(log.infos(), vec!["Creating tables, schema version 13"]);
        assert!(log.warnings().is_empty());
        assert!(dir.path().join(DEFAULT_DB_NAME).exists());
    }

    #[test]
    fn test_reopen_current_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = Database::open(ENTITIES, FIELDS, dir.path(), DEFAULT_DB_NAME, None).unwrap();
            insert_payment(&db, "kept");
        }

        let log = RecordingLog::default();
        let db = open_logged(&dir, None, &log);

        assert_eq!(
            db.reconciliation(),
            &Reconciliation::Current {
                version: SCHEMA_VERSION
            }
        );
        assert!(log.entries().is_empty());
        assert_eq!(count(&db, "payment"), 1);
    }

    #[test]
    fn test_migration_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut db =
                Database::open(ENTITIES, FIELDS, dir.path(), DEFAULT_DB_NAME, None).unwrap();
            let conn = db.connection().unwrap();
            conn.execute("ALTER TABLE payment DROP COLUMN charged_from_deposit", [])
                .unwrap();
            insert_payment(&db, "before-migration");
            db.set_version(12).unwrap();
            db.close().unwrap();
        }

        let log = RecordingLog::default();
        let db = open_logged(&dir, Some(Path::new(MIGRATIONS_DIR)), &log);

        assert_eq!(db.get_version().unwrap(), 13);
        assert_eq!(
            db.reconciliation(),
            &Reconciliation::Migrated {
                from: 12,
                to: 13,
                steps: 1
            }
        );
        assert!(log.warnings().is_empty());

        let (subtask, deposit): (String, Option<bool>) = db
            .connection()
            .unwrap()
            .query_row(
                "SELECT subtask, charged_from_deposit FROM payment",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(subtask, "before-migration");
        assert_eq!(deposit, None);
    }

    #[test]
    fn test_stale_without_migrate_dir_rebuilds() {
        let dir = tempfile::tempdir().unwrap();
        stale_store(&dir, 5);

        let log = RecordingLog::default();
        let db = open_logged(&dir, None, &log);

        assert_eq!(db.get_version().unwrap(), 13);
        assert!(matches!(
            db.reconciliation(),
            Reconciliation::Rebuilt { from: 5, to: 13, .. }
        ));
        assert_eq!(count(&db, "payment"), 0);

        let warnings = log.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("no migration directory configured"));
        assert!(log.infos().contains(&"Removing tables".to_string()));
    }

    #[test]
    fn test_missing_step_rebuilds() {
        let dir = tempfile::tempdir().unwrap();
        stale_store(&dir, 5);

        let log = RecordingLog::default();
        let db = open_logged(&dir, Some(Path::new(MIGRATIONS_DIR)), &log);

        assert_eq!(db.get_version().unwrap(), 13);
        match db.reconciliation() {
            Reconciliation::Rebuilt { cause, .. } => {
                assert_eq!(cause, "missing migration step 5 -> 6")
            }
            other => panic!("unexpected reconciliation: {:?}", other),
        }
        assert_eq!(count(&db, "payment"), 0);
        for entity in ENTITIES {
            assert!(db
                .connection()
                .unwrap()
                .prepare(&format!("SELECT * FROM {}", entity.name))
                .is_ok());
        }
    }

    #[test]
    fn test_failing_step_rolls_back_then_rebuilds() {
        let dir = tempfile::tempdir().unwrap();
        let steps = tempfile::tempdir().unwrap();
        std::fs::write(
            steps.path().join("011_012.sql"),
            "UPDATE payment SET payee = 'changed';",
        )
        .unwrap();
        std::fs::write(steps.path().join("012_013.sql"), "THIS IS NOT SQL;").unwrap();
        stale_store(&dir, 11);

        let log = RecordingLog::default();
        let db = open_logged(&dir, Some(steps.path()), &log);

        assert_eq!(db.get_version().unwrap(), 13);
        match db.reconciliation() {
            Reconciliation::Rebuilt { cause, .. } => {
                assert!(cause.starts_with("migration step 12 -> 13 failed"))
            }
            other => panic!("unexpected reconciliation: {:?}", other),
        }
        assert_eq!(count(&db, "payment"), 0);
        assert_eq!(log.warnings().len(), 1);
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        stale_store(&dir, SCHEMA_VERSION + 1);

        match Database::open(ENTITIES, FIELDS, dir.path(), DEFAULT_DB_NAME, None) {
            Err(StoreError::SchemaTooNew { found, target }) => {
                assert_eq!((found, target), (SCHEMA_VERSION + 1, SCHEMA_VERSION))
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("newer schema must not open"),
        }

        // Untouched: data and version are still there
        let conn = DatabaseConn::open_path(&dir.path().join(DEFAULT_DB_NAME)).unwrap();
        assert_eq!(
            VersionStore::new(&conn.conn).read().unwrap(),
            SCHEMA_VERSION + 1
        );
        assert_eq!(conn.table_count("payment").unwrap(), 1);
    }

    #[test]
    fn test_unknown_field_is_rebuild_failure() {
        const BROKEN_COLUMNS: &[Column] = &[Column::new("amount", ColumnKind::Field("Money"))];
        const BROKEN: &[Entity] = &[Entity::new("ledger", BROKEN_COLUMNS)];

        let dir = tempfile::tempdir().unwrap();
        let result = Database::open(BROKEN, &[], dir.path(), DEFAULT_DB_NAME, None);
        assert!(matches!(result, Err(StoreError::RebuildFailure(_))));

        // Nothing committed: the file is still unversioned
        let conn = DatabaseConn::open_path(&dir.path().join(DEFAULT_DB_NAME)).unwrap();
        assert_eq!(VersionStore::new(&conn.conn).read().unwrap(), 0);
    }

    #[test]
    fn test_corrupt_file_is_storage_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_DB_NAME), vec![0x42u8; 4096]).unwrap();

        let result = Database::open(ENTITIES, FIELDS, dir.path(), DEFAULT_DB_NAME, None);
        assert!(matches!(result, Err(StoreError::StorageUnavailable(_))));
    }

    #[test]
    fn test_custom_target_version() {
        const NOTE_COLUMNS: &[Column] = &[
            Column::new("id", ColumnKind::Integer).primary_key(),
            Column::new("body", ColumnKind::Text),
        ];
        const NOTES: &[Entity] = &[Entity::new("note", NOTE_COLUMNS)];

        let dir = tempfile::tempdir().unwrap();
        let db = DatabaseOptions::new(NOTES, &[], dir.path())
            .db_name("notes.db")
            .target_version(2)
            .open()
            .unwrap();

        assert_eq!(db.target_version(), 2);
        assert_eq!(db.get_version().unwrap(), 2);
        assert_eq!(db.path(), dir.path().join("notes.db"));
    }

    #[test]
    fn test_unstorable_versions_are_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let result = DatabaseOptions::new(ENTITIES, FIELDS, dir.path())
            .target_version(u32::MAX)
            .open();
        assert!(matches!(result, Err(StoreError::StorageUnavailable(_))));
        assert!(!dir.path().join(DEFAULT_DB_NAME).exists());

        let mut db = Database::open(ENTITIES, FIELDS, dir.path(), DEFAULT_DB_NAME, None).unwrap();
        assert!(matches!(
            db.set_version(u32::MAX),
            Err(StoreError::StorageUnavailable(_))
        ));
        db.close().unwrap();

        let db = Database::open(ENTITIES, FIELDS, dir.path(), DEFAULT_DB_NAME, None).unwrap();
        assert_eq!(
            db.reconciliation(),
            &Reconciliation::Current {
                version: SCHEMA_VERSION
            }
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(ENTITIES, FIELDS, dir.path(), DEFAULT_DB_NAME, None).unwrap();

        assert!(!db.is_closed());
        db.close().unwrap();
        assert!(db.is_closed());
        db.close().unwrap();

        assert!(matches!(db.get_version(), Err(StoreError::Closed)));
        assert!(matches!(db.set_version(1), Err(StoreError::Closed)));
    }

    #[test]
    fn test_open_creates_storage_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        let db = Database::open(ENTITIES, FIELDS, &nested, "nested.db", None).unwrap();
        assert_eq!(db.get_version().unwrap(), SCHEMA_VERSION);
        assert!(nested.join("nested.db").exists());
    }
}
