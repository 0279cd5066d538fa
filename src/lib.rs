//! Parallel make: brings build targets up to date on a fixed pool of worker
//! threads.
//!
//! A build file declares rules. Each rule has a target name, an ordered list
//! of dependencies and an ordered list of shell commands. The executor:
//! - Queues every rule needed for the requested goals, in declaration order.
//! - Lets each worker take the first queued rule whose rule-type
//!   dependencies have completed, or block on the front rule until they have.
//! - Runs a rule's commands only if its target file is missing or not newer
//!   than every dependency.
//! - Publishes completions through a writer-preferring reader/writer lock and
//!   wakes blocked workers after each one.
//! - Cancels the whole build on the first failing command.
//!
//! Key modules:
//! - `parser`: reads the build file and reports rules through [`RuleSink`].
//! - `rule`: the immutable [`Rule`] and [`RuleRepository`].
//! - `queue`, `registry`, `rwlock`: the shared scheduling state.
//! - `staleness`, `runner`: the per-rule decision and command execution.
//! - `executor`: the worker loop and pool.
//!
//! Quick start:
//! 1. Resolve a [`BuildConfig`].
//! 2. Call [`build`], or parse into a [`RuleRepository`] yourself and drive an
//!    [`Executor`] with any [`CommandRunner`].

/// Build configuration: build file discovery, worker count and goals.
pub mod config;
/// Error type shared by every stage of a build.
pub mod error;
/// The parallel executor: shared build context, worker loop and pool.
pub mod executor;
/// Build file parsing into the three rule callbacks.
pub mod parser;
/// The ready queue workers take rules from.
pub mod queue;
/// Registry of completed rules.
pub mod registry;
/// Rules and the repository of all declared rules.
pub mod rule;
/// Command execution.
pub mod runner;
/// Writer-preferring reader/writer lock guarding the completion registry.
pub mod rwlock;
/// Timestamp-based rebuild decisions.
pub mod staleness;
mod sync;
/// Hash collection aliases and the interior-mutability cell.
pub mod types;

pub use crate::{
    config::BuildConfig,
    error::BuildError,
    executor::{BuildReport, Executor},
    parser::RuleSink,
    registry::Outcome,
    rule::{Rule, RuleRepository},
    runner::{CommandRunner, ShellRunner},
};

/// Parses the configured build file and runs the build it describes.
///
/// # Errors
/// Any [`BuildError`]: the build file cannot be read or parsed, a goal is
/// unknown, a file cannot be inspected, or a command fails.
pub fn build(config: &BuildConfig) -> Result<BuildReport, BuildError> {
    let mut rules = RuleRepository::builder();
    parser::parse_build_file(&config.build_file, &config.targets, &mut rules)?;
    let repository = rules.finish();
    tracing::debug!(rules = repository.len(), "build file parsed");
    Executor::new(
        repository,
        ShellRunner::new(&config.directory),
        config.jobs,
    )
    .in_directory(&config.directory)
    .execute()
}
