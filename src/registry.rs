use crate::{rwlock::WriterPreferringLock, types::IndexMap};
use derive_more::Debug;

/// How a completed rule was satisfied.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The rule's commands ran and all of them succeeded.
    Ran,
    /// The target was already newer than its dependencies, so the commands
    /// were skipped.
    UpToDate,
}

/// Targets whose processing has finished, in completion order.
///
/// Readiness checks from every worker read it while finishing workers
/// publish to it. All access goes through a [`WriterPreferringLock`].
#[derive(Debug, Default)]
pub struct CompletionRegistry {
    #[debug(skip)]
    completed: WriterPreferringLock<IndexMap<String, Outcome>>,
}

impl CompletionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `target` has been published.
    #[must_use]
    pub fn is_complete(&self, target: &str) -> bool {
        self.completed.read(|completed| completed.contains_key(target))
    }

    /// Records that `target` finished with `outcome`.
    ///
    /// Returns `false`, leaving the first record intact, if `target` was
    /// already published.
    pub fn publish(&self, target: &str, outcome: Outcome) -> bool {
        self.completed.write(|completed| {
            if completed.contains_key(target) {
                return false;
            }
            completed.insert(target.to_owned(), outcome);
            true
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.completed.read(IndexMap::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every record, in completion order.
    #[must_use]
    pub fn snapshot(&self) -> IndexMap<String, Outcome> {
        self.completed.read(Clone::clone)
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn publish_is_first_writer_wins() {
        let registry = CompletionRegistry::new();
        assert!(!registry.is_complete("foo"));
        assert!(registry.publish("foo", Outcome::UpToDate));
        assert!(!registry.publish("foo", Outcome::Ran));
        assert!(registry.is_complete("foo"));
        assert_eq!(registry.snapshot()["foo"], Outcome::UpToDate);
    }

    #[test]
    fn snapshot_keeps_completion_order() {
        let registry = CompletionRegistry::new();
        registry.publish("b", Outcome::Ran);
        registry.publish("a", Outcome::Ran);
        let order: Vec<_> = registry.snapshot().into_keys().collect();
        assert_eq!(order, ["b", "a"]);
    }

    #[test]
    fn many_threads_publish_each_target_exactly_once() {
        let registry = Arc::new(CompletionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let mut published = 0;
                    for idx in 0..64 {
                        // Every worker races on every target; readers interleave.
                        let target = format!("t{idx}");
                        let _ = registry.is_complete(&target);
                        if registry.publish(&target, Outcome::Ran) {
                            published += 1;
                        }
                        assert!(registry.is_complete(&target), "worker {worker}");
                    }
                    published
                })
            })
            .collect();
        let published: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(published, 64);
        assert_eq!(registry.len(), 64);
    }
}
