use std::{io, path::PathBuf, process::ExitStatus};
use thiserror::Error;

/// Every way a build can fail.
///
/// Configuration and parse errors are raised before any worker starts.
/// `Metadata`, `Spawn` and `CommandFailed` are raised by a worker mid-build.
/// They cancel the run, so no further rule is dispatched.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    /// No build file was given and none of the conventional names exist.
    #[error("no build file found in `{}` (looked for {})", .directory.display(), .candidates.join(", "))]
    NoBuildFile {
        directory: PathBuf,
        candidates: Vec<&'static str>,
    },
    /// The build file exists but cannot be read.
    #[error("cannot read build file `{}`", .path.display())]
    BuildFileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The build file is syntactically invalid.
    #[error("{}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    /// A requested goal is not declared by any rule.
    #[error("no rule to make target `{0}`")]
    UnknownTarget(String),
    /// A file consulted by the staleness check has unreadable metadata.
    #[error("cannot read metadata of `{}`", .path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The shell could not be started for a command.
    #[error("cannot spawn shell for target `{target}`: {command}")]
    Spawn {
        target: String,
        command: String,
        #[source]
        source: io::Error,
    },
    /// A command exited unsuccessfully.
    #[error("command for target `{target}` failed ({status}): {command}")]
    CommandFailed {
        target: String,
        command: String,
        status: ExitStatus,
    },
    /// The worker pool could not be created.
    #[error("cannot start worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
