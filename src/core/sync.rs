//! Synchronization utilities for robust lock handling
//!
//! A poisoned lock means some other task panicked while holding the guard.
//! The data protected by the locks in this crate (config snapshots, stats
//! counters, queue buffers) stays structurally valid across a panic, so we
//! log the poison and recover the guard instead of propagating a panic
//! through every poll loop.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Acquire a mutex, recovering from poisoning
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("Recovering from poisoned mutex");
        poisoned.into_inner()
    })
}

/// Acquire a read guard, recovering from poisoning
pub fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        log::warn!("Recovering from poisoned rwlock (read)");
        poisoned.into_inner()
    })
}

/// Acquire a write guard, recovering from poisoning
pub fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        log::warn!("Recovering from poisoned rwlock (write)");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_helpers_plain() {
        let m = Mutex::new(1);
        *lock(&m) += 1;
        assert_eq!(*lock(&m), 2);

        let rw = RwLock::new(10);
        assert_eq!(*read_lock(&rw), 10);
        *write_lock(&rw) = 11;
        assert_eq!(*read_lock(&rw), 11);
    }

    #[test]
    fn test_lock_recovers_after_poison() {
        let m = std::sync::Arc::new(Mutex::new(5));
        let m2 = m.clone();
        let _ = std::thread::spawn(move || {
            let _guard = m2.lock().unwrap();
            panic!("poison the mutex");
        })
        .join();

        assert_eq!(*lock(&m), 5);
    }
}
