//! Fair async mutual exclusion for store commits.
//!
//! # Responsibilities
//! - Serialize configuration commits in arrival order (FIFO)
//! - Expose lock state and queue depth for statistics
//!
//! # Design Decisions
//! - Built on `tokio::sync::Mutex`, whose wait queue is FIFO-fair
//! - No acquisition timeout: acceptable for single-instance, low-contention
//!   use; an external watchdog is the mitigation if that assumption breaks

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex, MutexGuard};

/// A fair asynchronous lock. Waiters are granted the lock in FIFO order.
pub struct FairLock {
    inner: Mutex<()>,
    locked: AtomicBool,
    waiters: AtomicUsize,
}

impl FairLock {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(()),
            locked: AtomicBool::new(false),
            waiters: AtomicUsize::new(0),
        }
    }

    /// Acquire the lock, queuing behind earlier callers.
    pub async fn acquire(&self) -> FairLockGuard<'_> {
        self.waiters.fetch_add(1, Ordering::Relaxed);
        let guard = self.inner.lock().await;
        self.waiters.fetch_sub(1, Ordering::Relaxed);
        self.locked.store(true, Ordering::Relaxed);
        FairLockGuard {
            _inner: guard,
            lock: self,
        }
    }

    /// Whether the lock is currently held.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Number of callers currently queued for the lock.
    pub fn waiter_count(&self) -> usize {
        self.waiters.load(Ordering::Relaxed)
    }
}

impl Default for FairLock {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard releasing the lock on drop.
pub struct FairLockGuard<'a> {
    _inner: MutexGuard<'a, ()>,
    lock: &'a FairLock,
}

impl Drop for FairLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[tokio::test]
    async fn reports_locked_state() {
        let lock = FairLock::new();
        assert!(!lock.is_locked());

        let guard = lock.acquire().await;
        assert!(lock.is_locked());

        drop(guard);
        assert!(!lock.is_locked());
    }

    #[tokio::test]
    async fn grants_in_arrival_order() {
        let lock = Arc::new(FairLock::new());
        let order = Arc::new(StdMutex::new(Vec::new()));

        // Hold the lock so spawned tasks queue up behind it.
        let held = lock.acquire().await;

        let mut handles = Vec::new();
        for i in 0..4 {
            let task_lock = lock.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _guard = task_lock.acquire().await;
                order.lock().unwrap().push(i);
            }));
            // Let each task reach the wait queue before spawning the next.
            while lock.waiter_count() <= i {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }

        drop(held);
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }
}
