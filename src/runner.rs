use crate::error::BuildError;
use std::{path::PathBuf, process::Command, sync::Arc};
use tracing::{debug, info};

/// Executes one command string on behalf of a target.
///
/// Workers call it for each command of a rule in order and stop at the
/// first error.
pub trait CommandRunner: Send + Sync {
    /// Runs `command` for `target` to completion.
    ///
    /// # Errors
    /// The command could not be started or did not exit successfully.
    fn run(&self, target: &str, command: &str) -> Result<(), BuildError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for Arc<R> {
    fn run(&self, target: &str, command: &str) -> Result<(), BuildError> {
        (**self).run(target, command)
    }
}

/// Runs commands through `sh -c` in a working directory, synchronously and
/// with inherited stdio.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: PathBuf,
    directory: PathBuf,
}

impl ShellRunner {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            shell: PathBuf::from("/bin/sh"),
            directory: directory.into(),
        }
    }

    /// Uses `shell` (invoked as `shell -c <command>`) instead of `/bin/sh`.
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(".")
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, target: &str, command: &str) -> Result<(), BuildError> {
        info!(rule = target, command, "running");
        let status = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .current_dir(&self.directory)
            .status()
            .map_err(|source| BuildError::Spawn {
                target: target.to_owned(),
                command: command.to_owned(),
                source,
            })?;
        debug!(rule = target, %status, "command exited");
        if status.success() {
            Ok(())
        } else {
            Err(BuildError::CommandFailed {
                target: target.to_owned(),
                command: command.to_owned(),
                status,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn runs_in_the_working_directory() {
        let dir = TempDir::new().unwrap();
        let runner = ShellRunner::new(dir.path());
        runner.run("out", "echo hi > out").unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("out")).unwrap(), "hi\n");
    }

    #[test]
    fn non_zero_exit_is_reported() {
        let runner = ShellRunner::default();
        let err = runner.run("x", "exit 3").unwrap_err();
        match err {
            BuildError::CommandFailed { target, command, status } => {
                assert_eq!(target, "x");
                assert_eq!(command, "exit 3");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_shell_is_a_spawn_error() {
        let runner = ShellRunner::default().with_shell("/nonexistent/shell");
        let err = runner.run("x", "true").unwrap_err();
        assert!(matches!(err, BuildError::Spawn { .. }), "{err:?}");
    }
}
