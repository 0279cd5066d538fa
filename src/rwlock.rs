use crate::{sync::*, types::SyncUnsafeCell};
use core::fmt;

/// Bookkeeping for [`WriterPreferringLock`], guarded by its mutex.
#[derive(Debug, Default)]
struct Counters {
    /// Writers that have registered and not yet left, waiting or writing.
    writers: usize,
    /// Writers inside the critical section (never more than one).
    writing: usize,
    /// Readers that have registered and not yet left, waiting or reading.
    readers: usize,
    /// Readers inside the critical section.
    reading: usize,
}

/// A reader/writer lock in which pending writers always go first.
///
/// The protected value is reachable only through [`read`](Self::read) and
/// [`write`](Self::write), which run a closure inside the critical section:
/// - a writer registers, waits until nobody is reading or writing, runs, and
///   then hands off to exactly one other pending writer, or wakes every
///   pending reader when no writer is left;
/// - a reader registers, waits while any writer is pending or active, runs
///   alongside other readers, and the last reader out wakes one pending
///   writer.
///
/// New readers yield to every registered writer, so a stream of readers
/// cannot starve a writer. Readers can wait only while writers keep
/// arriving.
pub struct WriterPreferringLock<T> {
    counters: Mutex<Counters>,
    writer_cv: Condvar,
    reader_cv: Condvar,
    data: SyncUnsafeCell<T>,
}

impl<T> WriterPreferringLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            writer_cv: Condvar::new(),
            reader_cv: Condvar::new(),
            data: SyncUnsafeCell::new(value),
        }
    }

    /// Runs `f` with shared access, concurrently with other readers.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let mut counters = lock(&self.counters);
        counters.readers += 1;
        while counters.writers > 0 {
            counters = wait(&self.reader_cv, counters);
        }
        counters.reading += 1;
        drop(counters);

        // SAFETY: `reading > 0` holds until this reader deregisters below, and
        // writers only enter while `reading == 0`. Concurrent readers take
        // shared references only.
        let result = unsafe { self.data.get().with(|ptr| f(&*ptr)) };

        let mut counters = lock(&self.counters);
        counters.reading -= 1;
        counters.readers -= 1;
        if counters.writers > 0 && counters.reading == 0 {
            self.writer_cv.notify_one();
        }
        result
    }

    /// Runs `f` with exclusive access.
    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut counters = lock(&self.counters);
        counters.writers += 1;
        while counters.writing > 0 || counters.reading > 0 {
            counters = wait(&self.writer_cv, counters);
        }
        counters.writing += 1;
        drop(counters);

        // SAFETY: `writing == 1` keeps other writers waiting, and readers
        // cannot enter while `writers > 0`. The readers that were already
        // inside were drained before `writing` was raised.
        let result = unsafe { self.data.get_mut().with(|ptr| f(&mut *ptr)) };

        let mut counters = lock(&self.counters);
        counters.writing -= 1;
        counters.writers -= 1;
        if counters.writers > 0 {
            self.writer_cv.notify_one();
        } else if counters.readers > 0 {
            self.reader_cv.notify_all();
        }
        result
    }
}

impl<T: Default> Default for WriterPreferringLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for WriterPreferringLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counters = lock(&self.counters);
        f.debug_struct("WriterPreferringLock")
            .field("writers", &counters.writers)
            .field("readers", &counters.readers)
            .finish_non_exhaustive()
    }
}
