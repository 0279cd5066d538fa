use crate::{rule::Rule, sync::*};
use std::{collections::VecDeque, sync::Arc};
use tracing::debug;

/// Result of asking the [`ReadyQueue`] for work.
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// A rule whose rule-type dependencies are all complete. The caller now
    /// owns it exclusively.
    Ready(Arc<Rule>),
    /// The queue is empty; the worker should exit.
    Drained,
    /// The build was cancelled; the worker should exit without taking more
    /// work.
    Cancelled,
}

/// Rules not yet handed to a worker.
///
/// Every rule is removed exactly once, by one worker, under the queue mutex.
/// Workers that find nothing ready park on the completion condition, which
/// is broadcast after every published completion and on cancellation.
#[derive(Debug)]
pub struct ReadyQueue {
    pending: Mutex<VecDeque<Arc<Rule>>>,
    completion: Condvar,
    cancelled: AtomicBool,
}

impl ReadyQueue {
    pub fn new(rules: impl IntoIterator<Item = Arc<Rule>>) -> Self {
        Self {
            pending: Mutex::new(rules.into_iter().collect()),
            completion: Condvar::new(),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Hands out the next rule for the calling worker.
    ///
    /// Scans the queue in order and takes the first rule for which
    /// `is_ready` holds. If no queued rule is ready, takes the front rule
    /// and blocks until a completion broadcast makes it ready. Returns
    /// [`Dispatch::Drained`] once the queue is empty and
    /// [`Dispatch::Cancelled`] as soon as the build is cancelled, including
    /// while blocked. A rule held by a cancelled wait is dropped.
    ///
    /// `is_ready` runs with the queue mutex held.
    pub fn take_ready_or_wait(&self, is_ready: impl Fn(&Rule) -> bool) -> Dispatch {
        let mut pending = lock(&self.pending);
        if self.is_cancelled() {
            return Dispatch::Cancelled;
        }

        let position = pending.iter().position(|rule| is_ready(rule.as_ref()));
        if let Some(rule) = position.and_then(|idx| pending.remove(idx)) {
            return Dispatch::Ready(rule);
        }

        let Some(rule) = pending.pop_front() else {
            return Dispatch::Drained;
        };
        debug!(
            rule = rule.target(),
            queued = pending.len(),
            "nothing ready; holding front rule until its dependencies complete"
        );
        loop {
            if self.is_cancelled() {
                return Dispatch::Cancelled;
            }
            if is_ready(rule.as_ref()) {
                return Dispatch::Ready(rule);
            }
            pending = wait(&self.completion, pending);
        }
    }

    /// Wakes every worker blocked in [`take_ready_or_wait`](Self::take_ready_or_wait)
    /// so it rechecks readiness.
    ///
    /// Takes the queue mutex before broadcasting, so a worker that is
    /// between its readiness check and its wait cannot miss the signal.
    pub fn notify_completion(&self) {
        let _pending = lock(&self.pending);
        self.completion.notify_all();
    }

    /// Stops dispatch: every current and future call returns
    /// [`Dispatch::Cancelled`].
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify_completion();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Number of rules not yet dispatched.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::registry::{CompletionRegistry, Outcome};
    use std::{thread, time::Duration};

    fn rule(target: &str, dependencies: &[&str]) -> Arc<Rule> {
        Arc::new(Rule::new(target, dependencies.iter().copied(), Vec::<String>::new()))
    }

    fn target(dispatch: Dispatch) -> String {
        match dispatch {
            Dispatch::Ready(rule) => rule.target().to_owned(),
            other => panic!("expected a ready rule, got {other:?}"),
        }
    }

    #[test]
    fn greedy_scan_skips_blocked_rules() {
        let queue = ReadyQueue::new([rule("all", &["foo"]), rule("foo", &[])]);
        let done = CompletionRegistry::new();
        let ready = |r: &Rule| r.dependencies().iter().all(|d| done.is_complete(d));

        assert_eq!(target(queue.take_ready_or_wait(ready)), "foo");
        done.publish("foo", Outcome::Ran);
        assert_eq!(target(queue.take_ready_or_wait(ready)), "all");
        assert!(matches!(queue.take_ready_or_wait(ready), Dispatch::Drained));
        assert!(queue.is_empty());
    }

    #[test]
    fn blocked_front_rule_waits_for_completion_broadcast() {
        let queue = Arc::new(ReadyQueue::new([rule("all", &["foo"])]));
        let done = Arc::new(CompletionRegistry::new());

        let waiter = {
            let queue = Arc::clone(&queue);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                queue.take_ready_or_wait(|r| r.dependencies().iter().all(|d| done.is_complete(d)))
            })
        };
        // The waiter has taken the front rule once the queue looks empty.
        while !queue.is_empty() {
            thread::yield_now();
        }

        done.publish("foo", Outcome::Ran);
        queue.notify_completion();
        assert_eq!(target(waiter.join().unwrap()), "all");
    }

    #[test]
    fn cancel_releases_blocked_waiters_and_stops_dispatch() {
        let queue = Arc::new(ReadyQueue::new([rule("a", &["never"]), rule("b", &[])]));
        queue.cancel();
        assert!(matches!(queue.take_ready_or_wait(|_| true), Dispatch::Cancelled));
        assert_eq!(queue.len(), 2);

        let queue = Arc::new(ReadyQueue::new([rule("a", &["never"])]));
        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.take_ready_or_wait(|_| false))
        };
        thread::sleep(Duration::from_millis(50));
        queue.cancel();
        assert!(matches!(waiter.join().unwrap(), Dispatch::Cancelled));
    }
}
