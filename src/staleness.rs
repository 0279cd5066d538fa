//! Timestamp-based rebuild decisions.
//!
//! Modification times are compared at whole-second resolution, and a
//! dependency whose time is greater than *or equal to* the target's forces a
//! rebuild.

use crate::{
    error::BuildError,
    rule::{Rule, RuleRepository},
};
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

/// Why a rule must run, or that it need not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    /// The target names no existing file (phony or not yet built).
    MissingTarget,
    /// A rule-type dependency has not produced its file yet.
    MissingRuleOutput(String),
    /// A dependency is at least as new as the target.
    OutdatedBy(String),
    /// The target is newer than every dependency.
    UpToDate,
}

impl Staleness {
    /// Whether the rule's commands must run.
    #[must_use]
    pub fn must_run(&self) -> bool {
        !matches!(self, Self::UpToDate)
    }
}

/// Decides whether rules need their commands run, resolving relative file
/// names against a build directory.
#[derive(Debug, Clone, Copy)]
pub struct StalenessPolicy<'a> {
    repository: &'a RuleRepository,
    directory: &'a Path,
}

impl<'a> StalenessPolicy<'a> {
    pub fn new(repository: &'a RuleRepository, directory: &'a Path) -> Self {
        Self {
            repository,
            directory,
        }
    }

    /// Whether `rule`'s commands must run.
    ///
    /// # Errors
    /// A file that has to be compared cannot be inspected.
    pub fn should_run(&self, rule: &Rule) -> Result<bool, BuildError> {
        self.assess(rule).map(|staleness| staleness.must_run())
    }

    /// Classifies `rule` against the filesystem as it is now.
    ///
    /// # Errors
    /// A file that has to be compared cannot be inspected. A dependency
    /// that is neither a rule nor an existing file lands here too.
    pub fn assess(&self, rule: &Rule) -> Result<Staleness, BuildError> {
        let target = self.directory.join(rule.target());
        if !exists(&target)? {
            return Ok(Staleness::MissingTarget);
        }

        for dependency in rule.dependencies() {
            if self.repository.is_rule(dependency) && !exists(&self.directory.join(dependency))? {
                return Ok(Staleness::MissingRuleOutput(dependency.clone()));
            }
        }

        let target_time = modified_secs(&target)?;
        for dependency in rule.dependencies() {
            if modified_secs(&self.directory.join(dependency))? >= target_time {
                return Ok(Staleness::OutdatedBy(dependency.clone()));
            }
        }
        Ok(Staleness::UpToDate)
    }
}

fn metadata_error(path: &Path) -> impl FnOnce(io::Error) -> BuildError {
    let path = PathBuf::from(path);
    move |source| BuildError::Metadata { path, source }
}

fn exists(path: &Path) -> Result<bool, BuildError> {
    path.try_exists().map_err(metadata_error(path))
}

/// Modification time in whole seconds relative to the Unix epoch.
fn modified_secs(path: &Path) -> Result<i64, BuildError> {
    let modified = fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .map_err(metadata_error(path))?;
    Ok(whole_secs(modified))
}

fn whole_secs(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_secs()).unwrap_or(i64::MAX),
        Err(before) => {
            let before = before.duration();
            let secs = i64::try_from(before.as_secs()).unwrap_or(i64::MAX);
            if before.subsec_nanos() == 0 { -secs } else { -secs - 1 }
        }
    }
}
