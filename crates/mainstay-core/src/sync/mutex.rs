//! Mutual exclusion with a synthesized timed acquisition
//!
//! The underlying pthread mutex offers blocking and non-blocking
//! acquisition but no portable timed one, so [`Mutex::lock_timeout`]
//! polls `try_lock` against a coarse-monotonic deadline. That burns a
//! small, bounded amount of CPU in exchange for portability; timeout
//! granularity is one polling interval, not exact.

use crate::clock::fast_mono_now_us;
use crate::sleep::safe_sleep_us;
use crate::{MainstayError, Result};
use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

/// Pause between acquisition attempts in [`Mutex::lock_timeout`].
pub const LOCK_POLL_INTERVAL_US: i64 = 10_000;

/// A pthread-backed mutex owning a `T`.
pub struct Mutex<T: ?Sized> {
    lock: UnsafeCell<libc::pthread_mutex_t>,
    data: UnsafeCell<T>,
}

// SAFETY: the pthread mutex serializes all access to `data`
unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}
// SAFETY: as above
unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    /// Create a mutex in the unlocked state.
    ///
    /// Default pthread mutexes on the supported platforms hold no
    /// kernel resources, so there is no teardown to run on drop.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            lock: UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER),
            data: UnsafeCell::new(value),
        }
    }

    /// Consume the mutex and return the owned value.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> Mutex<T> {
    pub(super) fn raw(&self) -> *mut libc::pthread_mutex_t {
        self.lock.get()
    }

    /// Block until the mutex is acquired.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        // SAFETY: the mutex lives as long as self
        let r = unsafe { libc::pthread_mutex_lock(self.lock.get()) };
        debug_assert_eq!(r, 0, "pthread_mutex_lock failed");
        MutexGuard {
            mutex: self,
            _not_send: PhantomData,
        }
    }

    /// Acquire the mutex only if it is free right now.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        // SAFETY: the mutex lives as long as self
        let r = unsafe { libc::pthread_mutex_trylock(self.lock.get()) };
        match r {
            0 => Some(MutexGuard {
                mutex: self,
                _not_send: PhantomData,
            }),
            libc::EBUSY => None,
            other => {
                debug_assert!(false, "pthread_mutex_trylock failed: {other}");
                None
            }
        }
    }

    /// Acquire the mutex, giving up after `timeout_us` microseconds.
    ///
    /// Polls [`Self::try_lock`] every [`LOCK_POLL_INTERVAL_US`] against
    /// a coarse-monotonic deadline. The timeout result is distinct from
    /// any OS error.
    pub fn lock_timeout(&self, timeout_us: i64) -> Result<MutexGuard<'_, T>> {
        let deadline = fast_mono_now_us() + timeout_us;
        loop {
            if let Some(guard) = self.try_lock() {
                return Ok(guard);
            }
            if fast_mono_now_us() >= deadline {
                return Err(MainstayError::Timeout(timeout_us));
            }
            safe_sleep_us(LOCK_POLL_INTERVAL_US);
        }
    }

    /// Access the value mutably without locking; the exclusive borrow
    /// proves no other thread holds the mutex.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

impl<T: ?Sized + std::fmt::Debug> std::fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.try_lock() {
            Some(guard) => f.debug_struct("Mutex").field("data", &&*guard).finish(),
            None => f.debug_struct("Mutex").field("data", &"<locked>").finish(),
        }
    }
}

/// RAII guard; the mutex unlocks when the guard drops. Must be released
/// on the thread that acquired it, so the guard is not `Send`.
pub struct MutexGuard<'a, T: ?Sized> {
    pub(super) mutex: &'a Mutex<T>,
    _not_send: PhantomData<*mut ()>,
}

// SAFETY: sharing a guard only shares &T
unsafe impl<T: ?Sized + Sync> Sync for MutexGuard<'_, T> {}

impl<T: ?Sized + std::fmt::Debug> std::fmt::Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard proves this thread holds the lock
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above, with exclusive access through &mut self
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: ?Sized> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        // SAFETY: this thread holds the lock
        let r = unsafe { libc::pthread_mutex_unlock(self.mutex.raw()) };
        debug_assert_eq!(r, 0, "pthread_mutex_unlock failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_guards_the_value() {
        let m = Mutex::new(5);
        {
            let mut g = m.lock();
            *g += 1;
        }
        assert_eq!(*m.lock(), 6);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let m = Mutex::new(());
        let g = m.lock();
        assert!(m.try_lock().is_none());
        drop(g);
        assert!(m.try_lock().is_some());
    }

    #[test]
    fn into_inner_returns_the_value() {
        assert_eq!(Mutex::new("v").into_inner(), "v");
    }
}
