use std::sync::PoisonError;

#[cfg(feature = "loom")]
mod imp {
    use crate::error::BuildError;
    use core::num::NonZeroUsize;
    pub(crate) use loom::{
        cell::UnsafeCell,
        sync::{
            Condvar, Mutex, MutexGuard,
            atomic::{AtomicBool, Ordering},
        },
        thread,
    };
    use std::sync::Arc;

    /// Runs `op` once on each of `workers` freshly spawned loom threads and
    /// joins them all.
    pub(crate) fn broadcast(
        workers: NonZeroUsize,
        op: impl Fn(usize) + Send + Sync + 'static,
    ) -> Result<(), BuildError> {
        let op = Arc::new(op);
        let handles: Vec<_> = (0..workers.get())
            .map(|worker| {
                let op = Arc::clone(&op);
                thread::spawn(move || op(worker))
            })
            .collect();
        for handle in handles {
            if let Err(panic) = handle.join() {
                std::panic::resume_unwind(panic);
            }
        }
        Ok(())
    }
}

#[cfg(not(feature = "loom"))]
mod imp {
    use crate::{error::BuildError, types::SyncUnsafeCell};
    use core::num::NonZeroUsize;
    pub(crate) use core::{
        cell::UnsafeCell,
        sync::atomic::{AtomicBool, Ordering},
    };
    pub(crate) use std::sync::{Condvar, Mutex, MutexGuard};

    /// Runs `op` once on every thread of a dedicated pool of exactly
    /// `workers` threads and blocks until all of them have returned.
    pub(crate) fn broadcast(
        workers: NonZeroUsize,
        op: impl Fn(usize) + Send + Sync + 'static,
    ) -> Result<(), BuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.get())
            .thread_name(|worker| format!("parmake-worker-{worker}"))
            .build()?;
        pool.broadcast(|ctx| op(ctx.index()));
        Ok(())
    }

    pub(crate) trait LoomPtrCompat: Sized {
        type Ptr;
        fn with<R>(self, f: impl FnOnce(Self::Ptr) -> R) -> R;
    }

    impl<T> LoomPtrCompat for *mut T {
        type Ptr = *mut T;
        fn with<R>(self, f: impl FnOnce(Self::Ptr) -> R) -> R {
            f(self)
        }
    }

    pub(crate) trait LoomUnsafeCellCompat<T> {
        fn get_mut(&self) -> impl LoomPtrCompat<Ptr = *mut T>;
    }

    impl<T> LoomUnsafeCellCompat<T> for SyncUnsafeCell<T> {
        fn get_mut(&self) -> impl LoomPtrCompat<Ptr = *mut T> {
            self.get()
        }
    }
}

pub(crate) use imp::*;

/// Locks `mutex`, recovering the guard if a panicking worker poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Blocks on `condvar`, recovering the guard if a panicking worker poisoned
/// the mutex.
pub(crate) fn wait<'a, T>(condvar: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    condvar.wait(guard).unwrap_or_else(PoisonError::into_inner)
}

