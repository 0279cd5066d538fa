mod pool;
mod worker;

use crate::{
    error::BuildError,
    queue::ReadyQueue,
    registry::{CompletionRegistry, Outcome},
    rule::RuleRepository,
    runner::CommandRunner,
    sync::{Mutex, lock},
    types::IndexMap,
};
use core::num::NonZeroUsize;
use derive_more::Debug;
use std::{path::PathBuf, sync::Arc};

/// Parallel build executor over a fixed pool of worker threads.
///
/// Every worker repeatedly:
/// - takes a ready rule from the shared [`ReadyQueue`] (or blocks until the
///   front rule becomes ready),
/// - asks the staleness policy whether its commands must run,
/// - runs them in order through the [`CommandRunner`],
/// - publishes the rule to the [`CompletionRegistry`] and wakes every
///   blocked worker so it rechecks readiness.
///
/// A failed command cancels the build: blocked workers wake up and exit,
/// running workers stop before their next command, and no further rule is
/// dispatched. The first error is returned from [`execute`](Self::execute).
///
/// Dependency cycles are not detected; a cycle leaves its workers blocked
/// forever.
#[must_use]
#[derive(Debug)]
pub struct Executor<R> {
    context: BuildContext<R>,
    workers: NonZeroUsize,
}

/// State shared by all workers for the duration of one build.
#[derive(Debug)]
pub(crate) struct BuildContext<R> {
    repository: RuleRepository,
    queue: ReadyQueue,
    registry: CompletionRegistry,
    #[debug(skip)]
    runner: R,
    directory: PathBuf,
    failure: Mutex<Option<BuildError>>,
}

impl<R: CommandRunner + 'static> Executor<R> {
    /// Prepares a build of every rule in `repository`, dispatched in
    /// declaration order.
    pub fn new(repository: RuleRepository, runner: R, workers: NonZeroUsize) -> Self {
        let queue = ReadyQueue::new(repository.iter().cloned());
        Self {
            context: BuildContext {
                repository,
                queue,
                registry: CompletionRegistry::new(),
                runner,
                directory: PathBuf::from("."),
                failure: Mutex::new(None),
            },
            workers,
        }
    }

    /// Resolves target and dependency file names against `directory`
    /// (default: the current directory).
    pub fn in_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.context.directory = directory.into();
        self
    }

    /// Runs the build to completion on the worker pool.
    ///
    /// Returns only after every worker has been joined.
    ///
    /// # Errors
    /// The first failure observed by any worker: an unreadable file during
    /// a staleness check, a command that could not start or failed, or a
    /// pool that could not be created.
    pub fn execute(self) -> Result<BuildReport, BuildError> {
        let Self { context, workers } = self;
        let context = Arc::new(context);
        pool::run(workers, Arc::clone(&context))?;
        if let Some(err) = lock(&context.failure).take() {
            return Err(err);
        }
        Ok(BuildReport {
            outcomes: context.registry.snapshot(),
        })
    }
}

/// What a successful build did, in completion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    outcomes: IndexMap<String, Outcome>,
}

impl BuildReport {
    /// Every completed target with its outcome.
    #[must_use]
    pub fn outcomes(&self) -> &IndexMap<String, Outcome> {
        &self.outcomes
    }

    /// Completed targets.
    pub fn completed(&self) -> impl Iterator<Item = &str> {
        self.outcomes.keys().map(String::as_str)
    }

    /// Targets whose commands ran.
    pub fn ran(&self) -> impl Iterator<Item = &str> {
        self.with_outcome(Outcome::Ran)
    }

    /// Targets skipped as already up to date.
    pub fn up_to_date(&self) -> impl Iterator<Item = &str> {
        self.with_outcome(Outcome::UpToDate)
    }

    #[must_use]
    pub fn outcome(&self, target: &str) -> Option<Outcome> {
        self.outcomes.get(target).copied()
    }

    fn with_outcome(&self, wanted: Outcome) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(move |(_, outcome)| **outcome == wanted)
            .map(|(target, _)| target.as_str())
    }
}
