use std::path::Path;

use rusqlite::Connection;
use tracing::debug;

use super::{MigrationError, MigrationRegistry};

/// Applies chains of migration steps from a migration directory
///
/// The runner never writes the schema version; the caller does that in the
/// same transaction once the whole chain has succeeded.
#[derive(Debug, Clone, Copy)]
pub struct MigrationRunner<'a> {
    location: Option<&'a Path>,
}

impl<'a> MigrationRunner<'a> {
    /// `None` or an empty path means migrations are disabled
    pub fn new(location: Option<&'a Path>) -> Self {
        Self { location }
    }

    fn registry(&self) -> Result<MigrationRegistry, MigrationError> {
        match self.location {
            Some(dir) if !dir.as_os_str().is_empty() => MigrationRegistry::scan(dir),
            _ => Err(MigrationError::Unavailable(
                "no migration directory configured".to_string(),
            )),
        }
    }

    /// Apply every step from `from` up to `to`, in order
    ///
    /// The whole chain is resolved before the first step runs, so a missing
    /// link is reported without touching the schema. Execution stops at the
    /// first failing step. Returns the number of steps applied.
    pub fn run(&self, conn: &Connection, from: u32, to: u32) -> Result<usize, MigrationError> {
        let registry = self.registry()?;
        let chain = registry.chain(from, to)?;

        for step in &chain {
            debug!(
                "Applying migration step {} -> {} ({})",
                step.from_version,
                step.to_version,
                step.file_name()
            );

            let sql = step.load_sql()?;
            conn.execute_batch(&sql)
                .map_err(|e| MigrationError::StepFailed {
                    from: step.from_version,
                    to: step.to_version,
                    reason: e.to_string(),
                })?;
        }

        Ok(chain.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::DatabaseConn;
    use std::path::PathBuf;

    fn write_step(dir: &Path, name: &str, sql: &str) {
        std::fs::write(dir.join(name), sql).unwrap();
    }

    fn setup() -> DatabaseConn {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE item (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .unwrap();
        db.execute("INSERT INTO item (id, name) VALUES (1, 'first')")
            .unwrap();
        db
    }

    #[test]
    fn test_run_chain() {
        let dir = tempfile::tempdir().unwrap();
        write_step(
            dir.path(),
            "001_002_add_size.sql",
            "ALTER TABLE item ADD COLUMN size INTEGER;",
        );
        write_step(
            dir.path(),
            "002_003_add_tag.sql",
            "CREATE TABLE tag (id INTEGER PRIMARY KEY, item_id INTEGER NOT NULL);\n\
             INSERT INTO tag (item_id) SELECT id FROM item;",
        );

        let db = setup();
        let runner = MigrationRunner::new(Some(dir.path()));
        assert_eq!(runner.run(&db.conn, 1, 3).unwrap(), 2);

        assert_eq!(
            db.column_names("item").unwrap(),
            vec!["id".to_string(), "name".to_string(), "size".to_string()]
        );
        assert_eq!(db.table_count("tag").unwrap(), 1);
        assert_eq!(db.table_count("item").unwrap(), 1);
    }

    #[test]
    fn test_run_partial_chain_from_middle() {
        let dir = tempfile::tempdir().unwrap();
        write_step(dir.path(), "001_002.sql", "SELECT missing_function();");
        write_step(
            dir.path(),
            "002_003.sql",
            "ALTER TABLE item ADD COLUMN size INTEGER;",
        );

        let db = setup();
        // 1 -> 2 is broken but must not run when starting at 2
        assert_eq!(
            MigrationRunner::new(Some(dir.path()))
                .run(&db.conn, 2, 3)
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_run_without_location() {
        let db = setup();

        let err = MigrationRunner::new(None).run(&db.conn, 1, 2).unwrap_err();
        assert!(err.is_unavailable());

        let empty = PathBuf::new();
        let err = MigrationRunner::new(Some(empty.as_path()))
            .run(&db.conn, 1, 2)
            .unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_missing_step_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write_step(
            dir.path(),
            "001_002.sql",
            "ALTER TABLE item ADD COLUMN size INTEGER;",
        );

        let db = setup();
        match MigrationRunner::new(Some(dir.path())).run(&db.conn, 1, 3) {
            Err(MigrationError::StepMissing { from, to }) => assert_eq!((from, to), (2, 3)),
            other => panic!("unexpected result: {:?}", other),
        }

        assert_eq!(db.column_names("item").unwrap().len(), 2);
    }

    #[test]
    fn test_failing_step_stops_chain() {
        let dir = tempfile::tempdir().unwrap();
        write_step(
            dir.path(),
            "001_002.sql",
            "ALTER TABLE item ADD COLUMN size INTEGER;",
        );
        write_step(dir.path(), "002_003.sql", "ALTER TABLE nope ADD COLUMN x;");
        write_step(
            dir.path(),
            "003_004.sql",
            "ALTER TABLE item ADD COLUMN color TEXT;",
        );

        let db = setup();
        match MigrationRunner::new(Some(dir.path())).run(&db.conn, 1, 4) {
            Err(MigrationError::StepFailed { from, to, reason }) => {
                assert_eq!((from, to), (2, 3));
                assert!(reason.contains("nope"));
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let columns = db.column_names("item").unwrap();
        assert!(!columns.contains(&"color".to_string()));
    }
}
