//! Logging collaborator for schema reconciliation
//!
//! The engine reports its actions through [`MigrationLog`] instead of a
//! process-wide logger so that embedders can route or capture them.
//! [`TracingLog`] is the default and forwards everything to `tracing`.

use tracing::{info, warn};

/// Receives the engine's create/migrate/drop reports
pub trait MigrationLog {
    /// Report a schema action (create, migrate, drop)
    fn info(&self, message: &str);

    /// Report a recoverable problem, such as a failed migration
    fn warning(&self, message: &str);
}

/// Forwards reconciliation messages to `tracing` under the `stratum::db` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl MigrationLog for TracingLog {
    fn info(&self, message: &str) {
        info!(target: "stratum::db", "{}", message);
    }

    fn warning(&self, message: &str) {
        warn!(target: "stratum::db", "{}", message);
    }
}
