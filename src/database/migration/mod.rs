//! Incremental schema migrations
//!
//! A migration directory holds one SQL script per version increment, named
//! `<from>_<to>[_<description>].sql`, for example `012_013_payment_deposit.sql`.
//! [`MigrationRegistry`] indexes a directory and resolves chains of steps;
//! [`MigrationRunner`] applies a chain on an open connection or transaction.
//!
//! Steps run inside the caller's transaction and must not issue their own
//! `BEGIN`/`COMMIT`.

mod registry;
mod runner;

pub use registry::{MigrationRegistry, MigrationStep, StepInfo};
pub use runner::MigrationRunner;

use thiserror::Error;

/// Why an incremental migration could not be completed
///
/// Every variant is recoverable from the engine's point of view: it answers
/// any of them with a destructive rebuild.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// No usable migration directory is configured
    #[error("migrations unavailable: {0}")]
    Unavailable(String),

    /// A step of the requested chain has no script
    #[error("missing migration step {from} -> {to}")]
    StepMissing { from: u32, to: u32 },

    /// A script in the directory is malformed, duplicated or skips versions
    #[error("invalid migration step '{path}': {reason}")]
    InvalidStep { path: String, reason: String },

    /// A step script failed to load or execute
    #[error("migration step {from} -> {to} failed: {reason}")]
    StepFailed { from: u32, to: u32, reason: String },

    /// The chain would go backwards
    #[error("cannot migrate from version {from} down to {to}")]
    InvalidRange { from: u32, to: u32 },
}

impl MigrationError {
    /// True when migrations are disabled or the directory is absent, as
    /// opposed to a problem with a specific step
    pub fn is_unavailable(&self) -> bool {
        matches!(self, MigrationError::Unavailable(_))
    }
}
