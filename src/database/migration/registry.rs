use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use super::MigrationError;

/// One migration script, advancing the schema by exactly one version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStep {
    pub from_version: u32,
    pub to_version: u32,
    pub path: PathBuf,
}

impl MigrationStep {
    /// Script file name, for display
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Read the step's SQL
    pub fn load_sql(&self) -> Result<String, MigrationError> {
        std::fs::read_to_string(&self.path).map_err(|e| MigrationError::StepFailed {
            from: self.from_version,
            to: self.to_version,
            reason: format!("cannot read '{}': {}", self.path.display(), e),
        })
    }
}

/// One line of a registry listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct StepInfo {
    pub from: u32,
    pub to: u32,
    pub file: String,
    /// On the chain a stale database would run
    pub needed: bool,
}

/// Parse `<from>_<to>[_<description>]` from a script's file stem
///
/// Returns `None` for files that are not steps at all (no leading number),
/// and an error for files that look like steps but are malformed.
fn parse_step_name(stem: &str) -> Option<Result<(u32, u32), String>> {
    let mut parts = stem.splitn(3, '_');
    let from: u32 = parts.next()?.parse().ok()?;

    let to = match parts.next().map(str::parse::<u32>) {
        Some(Ok(to)) => to,
        _ => return Some(Err("expected '<from>_<to>' version prefix".to_string())),
    };

    if from.checked_add(1) != Some(to) {
        return Some(Err(format!(
            "step {} -> {} must advance exactly one version",
            from, to
        )));
    }

    Some(Ok((from, to)))
}

/// Index of the migration steps found in a directory, keyed by source version
#[derive(Debug, Clone)]
pub struct MigrationRegistry {
    dir: PathBuf,
    steps: BTreeMap<u32, MigrationStep>,
}

impl MigrationRegistry {
    /// Scan a migration directory
    ///
    /// Only `.sql` files whose name starts with a version number are
    /// considered; anything else in the directory is ignored.
    pub fn scan(dir: &Path) -> Result<Self, MigrationError> {
        if !dir.is_dir() {
            return Err(MigrationError::Unavailable(format!(
                "migration directory '{}' does not exist",
                dir.display()
            )));
        }

        let entries = std::fs::read_dir(dir).map_err(|e| {
            MigrationError::Unavailable(format!(
                "cannot read migration directory '{}': {}",
                dir.display(),
                e
            ))
        })?;

        let mut steps: BTreeMap<u32, MigrationStep> = BTreeMap::new();
        for entry in entries {
            let path = entry
                .map_err(|e| {
                    MigrationError::Unavailable(format!(
                        "cannot read migration directory '{}': {}",
                        dir.display(),
                        e
                    ))
                })?
                .path();

            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("sql") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let (from, to) = match parse_step_name(stem) {
                None => continue,
                Some(Ok(versions)) => versions,
                Some(Err(reason)) => {
                    return Err(MigrationError::InvalidStep {
                        path: path.display().to_string(),
                        reason,
                    })
                }
            };

            if let Some(existing) = steps.get(&from) {
                return Err(MigrationError::InvalidStep {
                    path: path.display().to_string(),
                    reason: format!(
                        "duplicate step {} -> {}, already provided by '{}'",
                        from,
                        to,
                        existing.file_name()
                    ),
                });
            }

            debug!("Found migration step {} -> {}: {}", from, to, path.display());
            steps.insert(
                from,
                MigrationStep {
                    from_version: from,
                    to_version: to,
                    path,
                },
            );
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            steps,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All steps, in version order
    pub fn steps(&self) -> impl Iterator<Item = &MigrationStep> {
        self.steps.values()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The step leaving `from_version`, if any
    pub fn get(&self, from_version: u32) -> Option<&MigrationStep> {
        self.steps.get(&from_version)
    }

    /// Resolve the ordered chain of steps from `from` to `to`
    ///
    /// Fails on the first missing link; an empty chain is returned when the
    /// versions are equal.
    pub fn chain(&self, from: u32, to: u32) -> Result<Vec<&MigrationStep>, MigrationError> {
        if from > to {
            return Err(MigrationError::InvalidRange { from, to });
        }

        (from..to)
            .map(|v| {
                self.get(v)
                    .ok_or(MigrationError::StepMissing { from: v, to: v + 1 })
            })
            .collect()
    }

    /// Every step, none marked as needed
    pub fn list(&self) -> Vec<StepInfo> {
        self.steps()
            .map(|s| StepInfo {
                from: s.from_version,
                to: s.to_version,
                file: s.file_name(),
                needed: false,
            })
            .collect()
    }

    /// Every step, marking the chain from `from` to `to`
    ///
    /// Fails like [`chain`](Self::chain) when that chain has a gap.
    pub fn plan(&self, from: u32, to: u32) -> Result<Vec<StepInfo>, MigrationError> {
        self.chain(from, to)?;
        Ok(self
            .list()
            .into_iter()
            .map(|mut info| {
                info.needed = info.from >= from && info.to <= to;
                info
            })
            .collect())
    }
}
