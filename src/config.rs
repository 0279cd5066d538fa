use crate::error::BuildError;
use core::num::NonZeroUsize;
use std::{
    fs::File,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Build file names tried, in order, when none is given explicitly.
pub const DEFAULT_BUILD_FILES: [&str; 2] = ["makefile", "Makefile"];

/// Everything a build run needs to know before parsing starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Build file to parse.
    pub build_file: PathBuf,
    /// Directory commands run in and file names resolve against.
    pub directory: PathBuf,
    /// Worker thread count.
    pub jobs: NonZeroUsize,
    /// Goals to bring up to date; empty means the build file's first target.
    pub targets: Vec<String>,
}

impl BuildConfig {
    /// Locates and validates the build file.
    ///
    /// An explicit `build_file` is resolved against `directory` and must be
    /// readable. Otherwise the first readable entry of
    /// [`DEFAULT_BUILD_FILES`] in `directory` is used.
    ///
    /// # Errors
    /// The explicit build file cannot be opened, or no default build file
    /// exists.
    pub fn resolve(
        directory: impl Into<PathBuf>,
        build_file: Option<&Path>,
        jobs: NonZeroUsize,
        targets: Vec<String>,
    ) -> Result<Self, BuildError> {
        let directory = directory.into();
        let build_file = match build_file {
            Some(path) => {
                let path = directory.join(path);
                File::open(&path).map_err(|source| BuildError::BuildFileUnreadable {
                    path: path.clone(),
                    source,
                })?;
                path
            }
            None => DEFAULT_BUILD_FILES
                .iter()
                .map(|name| directory.join(name))
                .find(|path| path.is_file() && File::open(path).is_ok())
                .ok_or_else(|| BuildError::NoBuildFile {
                    directory: directory.clone(),
                    candidates: DEFAULT_BUILD_FILES.to_vec(),
                })?,
        };
        debug!(build_file = %build_file.display(), jobs = jobs.get(), "resolved build configuration");
        Ok(Self {
            build_file,
            directory,
            jobs,
            targets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const ONE: NonZeroUsize = NonZeroUsize::MIN;

    #[test]
    fn lowercase_makefile_is_preferred() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Makefile"), "b:\n").unwrap();
        let config = BuildConfig::resolve(dir.path(), None, ONE, vec![]).unwrap();
        // Case-insensitive filesystems resolve both names to the same file.
        assert!(config.build_file.ends_with("Makefile") || config.build_file.ends_with("makefile"));

        fs::write(dir.path().join("makefile"), "a:\n").unwrap();
        let config = BuildConfig::resolve(dir.path(), None, ONE, vec![]).unwrap();
        assert!(config.build_file.ends_with("makefile"));
    }

    #[test]
    fn missing_default_build_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = BuildConfig::resolve(dir.path(), None, ONE, vec![]).unwrap_err();
        assert!(matches!(err, BuildError::NoBuildFile { .. }), "{err:?}");
    }

    #[test]
    fn explicit_build_file_must_exist() {
        let dir = TempDir::new().unwrap();
        let err =
            BuildConfig::resolve(dir.path(), Some(Path::new("rules.mk")), ONE, vec![]).unwrap_err();
        assert!(matches!(err, BuildError::BuildFileUnreadable { .. }), "{err:?}");

        fs::write(dir.path().join("rules.mk"), "all:\n").unwrap();
        let config = BuildConfig::resolve(
            dir.path(),
            Some(Path::new("rules.mk")),
            ONE,
            vec!["all".to_owned()],
        )
        .unwrap();
        assert_eq!(config.build_file, dir.path().join("rules.mk"));
        assert_eq!(config.targets, ["all"]);
    }
}
