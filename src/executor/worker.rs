use crate::{
    error::BuildError,
    executor::BuildContext,
    queue::Dispatch,
    registry::Outcome,
    rule::Rule,
    runner::CommandRunner,
    staleness::StalenessPolicy,
    sync::lock,
};
use tracing::{debug, info, warn};

impl<R: CommandRunner> BuildContext<R> {
    /// Worker loop: dispatch, decide, run, publish, until the queue is
    /// drained or the build is cancelled.
    pub(super) fn work(&self, worker: usize) {
        debug!(worker, "worker started");
        loop {
            let rule = match self.queue.take_ready_or_wait(|rule| self.is_ready(rule)) {
                Dispatch::Ready(rule) => rule,
                Dispatch::Drained => {
                    debug!(worker, "ready queue drained; worker exiting");
                    return;
                }
                Dispatch::Cancelled => {
                    debug!(worker, "build cancelled; worker exiting");
                    return;
                }
            };
            debug!(worker, rule = rule.target(), "dispatched");

            match self.process(&rule) {
                Ok(Some(outcome)) => {
                    let first = self.registry.publish(rule.target(), outcome);
                    debug_assert!(first, "rule `{}` completed twice", rule.target());
                    self.queue.notify_completion();
                }
                Ok(None) => {
                    debug!(worker, rule = rule.target(), "abandoned after cancellation");
                    return;
                }
                Err(err) => {
                    self.fail(err);
                    return;
                }
            }
        }
    }

    /// A rule is ready when every dependency that names a rule has been
    /// published. Plain files never hold a rule back here.
    fn is_ready(&self, rule: &Rule) -> bool {
        rule.dependencies().iter().all(|dependency| {
            !self.repository.is_rule(dependency) || self.registry.is_complete(dependency)
        })
    }

    /// Runs `rule`'s commands if it is stale. Returns `None` if the build
    /// was cancelled between two of its commands.
    fn process(&self, rule: &Rule) -> Result<Option<Outcome>, BuildError> {
        let staleness = StalenessPolicy::new(&self.repository, &self.directory).assess(rule)?;
        if !staleness.must_run() {
            info!(rule = rule.target(), "up to date");
            return Ok(Some(Outcome::UpToDate));
        }
        debug!(rule = rule.target(), ?staleness, "out of date");

        for command in rule.commands() {
            if self.queue.is_cancelled() {
                return Ok(None);
            }
            self.runner.run(rule.target(), command)?;
        }
        Ok(Some(Outcome::Ran))
    }

    /// Records the first failure and cancels the build.
    fn fail(&self, err: BuildError) {
        {
            let mut failure = lock(&self.failure);
            if failure.is_none() {
                warn!(%err, "cancelling build");
                *failure = Some(err);
            } else {
                debug!(%err, "additional failure after cancellation");
            }
        }
        self.queue.cancel();
    }
}
