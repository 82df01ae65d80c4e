//! A hand-rolled, writer-preferring reader-writer lock.
//!
//! This is deliberately not a wrapper around `std::sync::RwLock` or
//! `parking_lot::RwLock`: the whole point of this primitive is the specific
//! fairness policy it implements. On a writer's arrival, all *subsequent*
//! readers are blocked from entering, and the writer is granted the lock as
//! soon as the already-admitted readers drain — readers never get to starve
//! a waiting writer.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex};

/// Mutable state protected by `RwLock`'s internal mutex.
struct State {
    /// The number of readers currently holding the lock.
    reader_count: usize,
    /// Whether a writer has announced itself (and is either waiting for
    /// readers to drain or already holds the lock).
    writer_entered: bool,
}

/// A reader-preferring-on-entry, writer-preempting-on-arrival lock.
///
/// Held-by state is one of: nobody, N≥1 readers, or exactly one writer.
/// Not recursive: acquiring the same mode twice on the same thread deadlocks,
/// same as a plain mutex would.
pub struct RwLock<T> {
    state: Mutex<State>,
    reader_cv: Condvar,
    writer_cv: Condvar,
    data: UnsafeCell<T>,
}

// Safety: `T` is only ever reachable through a guard that enforces the usual
// shared-xor-mutable discipline via the mutex-protected `State`.
unsafe impl<T: Send> Send for RwLock<T> {}
unsafe impl<T: Send> Sync for RwLock<T> {}

impl<T> RwLock<T> {
    /// Create a new lock wrapping `data`.
    pub fn new(data: T) -> RwLock<T> {
        RwLock {
            state: Mutex::new(State {
                reader_count: 0,
                writer_entered: false,
            }),
            reader_cv: Condvar::new(),
            writer_cv: Condvar::new(),
            data: UnsafeCell::new(data),
        }
    }

    /// Acquire the lock in shared (read) mode.
    pub fn read(&self) -> RwLockReadGuard<T> {
        let mut state = self.state.lock().unwrap();
        while state.writer_entered {
            state = self.reader_cv.wait(state).unwrap();
        }
        state.reader_count += 1;
        drop(state);

        RwLockReadGuard { lock: self }
    }

    /// Acquire the lock in exclusive (write) mode.
    ///
    /// Blocks subsequent readers as soon as this call starts waiting, then
    /// waits for any readers already admitted to release.
    pub fn write(&self) -> RwLockWriteGuard<T> {
        let mut state = self.state.lock().unwrap();
        while state.writer_entered {
            state = self.reader_cv.wait(state).unwrap();
        }
        state.writer_entered = true;
        while state.reader_count > 0 {
            state = self.writer_cv.wait(state).unwrap();
        }
        drop(state);

        RwLockWriteGuard { lock: self }
    }

    /// Consume the lock, returning the inner value without acquiring it.
    ///
    /// Used by the growth paths of the locked hash tables, which already
    /// hold exclusive access to the old bucket array by construction (it has
    /// just been swapped out and is unreachable from any other thread).
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    /// Get a mutable reference to the inner value without locking.
    ///
    /// Only safe to call when the caller has `&mut self`, which the
    /// compiler already proves is exclusive.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

/// A RAII read guard. Releases the read lock on drop.
pub struct RwLockReadGuard<'a, T: 'a> {
    lock: &'a RwLock<T>,
}

impl<'a, T> Deref for RwLockReadGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> Drop for RwLockReadGuard<'a, T> {
    fn drop(&mut self) {
        let mut state = self.lock.state.lock().unwrap();
        state.reader_count -= 1;
        if state.writer_entered && state.reader_count == 0 {
            self.lock.writer_cv.notify_one();
        }
    }
}

/// A RAII write guard. Releases the write lock on drop.
pub struct RwLockWriteGuard<'a, T: 'a> {
    lock: &'a RwLock<T>,
}

impl<'a, T> Deref for RwLockWriteGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for RwLockWriteGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for RwLockWriteGuard<'a, T> {
    fn drop(&mut self) {
        let mut state = self.lock.state.lock().unwrap();
        state.writer_entered = false;
        // Broadcast: every reader that arrived while we held the lock is
        // waiting on this condvar, and they can all proceed now.
        self.lock.reader_cv.notify_all();
    }
}
