//! One-shot completion signals shared between the client thread and workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

/// Starts unset and is set at most once, by whoever finishes the guarded
/// work.
pub trait Latch {
    fn set(&self);
    fn is_set(&self) -> bool;
}

/// A flag that is only ever polled, e.g. an abort request.
#[derive(Debug, Default)]
pub struct SpinLatch(AtomicBool);

impl SpinLatch {
    #[inline]
    pub fn new() -> Self {
        SpinLatch(AtomicBool::new(false))
    }
}

impl Latch for SpinLatch {
    #[inline]
    fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A latch that can be blocked on. Polling it never takes the lock.
#[derive(Debug, Default)]
pub struct LockLatch {
    flag: SpinLatch,
    lock: Mutex<()>,
    cvar: Condvar,
}

impl LockLatch {
    #[inline]
    pub fn new() -> Self {
        LockLatch::default()
    }

    /// Blocks until the latch is set.
    pub fn wait(&self) {
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !self.flag.is_set() {
            guard = self.cvar.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl Latch for LockLatch {
    fn set(&self) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.flag.set();
        self.cvar.notify_all();
    }

    #[inline]
    fn is_set(&self) -> bool {
        self.flag.is_set()
    }
}
