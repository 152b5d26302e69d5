//! Condition variables on the monotonic clock
//!
//! A wall-clock adjustment must never move a timeout, so every
//! [`Condvar`] is configured at initialization to measure timed waits
//! against `CLOCK_MONOTONIC`. If the platform refuses that
//! configuration, initialization aborts the process: every timeout
//! guarantee in the system is built on it, and degrading silently to
//! wall-clock semantics would corrupt them all.

use super::mutex::MutexGuard;
use crate::clock::USEC_PER_SEC;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;

/// Outcome of [`Condvar::timed_wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTimeoutResult(bool);

impl WaitTimeoutResult {
    /// True when the deadline passed without a signal.
    #[must_use]
    pub const fn timed_out(self) -> bool {
        self.0
    }
}

/// A condition variable whose timed waits use the monotonic clock.
pub struct Condvar {
    inner: UnsafeCell<libc::pthread_cond_t>,
}

// SAFETY: pthread condition variables are made to be shared across threads
unsafe impl Send for Condvar {}
// SAFETY: as above
unsafe impl Sync for Condvar {}

impl Condvar {
    /// Create a condition variable configured for monotonic timed
    /// waits. Aborts the process if the platform cannot honor that.
    #[must_use]
    pub fn new() -> Self {
        let mut attr = MaybeUninit::<libc::pthread_condattr_t>::uninit();
        let mut cond = MaybeUninit::<libc::pthread_cond_t>::uninit();
        // SAFETY: attr and cond are valid uninitialized slots, passed
        // through the documented init sequence
        unsafe {
            let r = libc::pthread_condattr_init(attr.as_mut_ptr());
            if r != 0 {
                fatal_init("pthread_condattr_init", r);
            }
            #[cfg(any(
                target_os = "linux",
                target_os = "android",
                target_os = "freebsd",
                target_os = "netbsd",
                target_os = "openbsd"
            ))]
            {
                let r = libc::pthread_condattr_setclock(attr.as_mut_ptr(), libc::CLOCK_MONOTONIC);
                if r != 0 {
                    fatal_init("pthread_condattr_setclock", r);
                }
            }
            #[cfg(not(any(
                target_os = "linux",
                target_os = "android",
                target_os = "freebsd",
                target_os = "netbsd",
                target_os = "openbsd"
            )))]
            {
                fatal_init("pthread_condattr_setclock", libc::ENOTSUP);
            }
            let r = libc::pthread_cond_init(cond.as_mut_ptr(), attr.as_ptr());
            if r != 0 {
                fatal_init("pthread_cond_init", r);
            }
            libc::pthread_condattr_destroy(attr.as_mut_ptr());
            // No waiter can exist before the value reaches its final
            // place, so moving the freshly initialized cond is safe.
            Self {
                inner: UnsafeCell::new(cond.assume_init()),
            }
        }
    }

    /// Wake one waiter, or every waiter if `broadcast`. A signal with
    /// no waiter present is lost, not queued; callers hold the paired
    /// mutex while updating the predicate.
    pub fn signal(&self, broadcast: bool) {
        // SAFETY: inner is an initialized condition variable
        let r = unsafe {
            if broadcast {
                libc::pthread_cond_broadcast(self.inner.get())
            } else {
                libc::pthread_cond_signal(self.inner.get())
            }
        };
        debug_assert_eq!(r, 0, "pthread_cond signal failed");
    }

    /// Wake one waiter.
    pub fn notify_one(&self) {
        self.signal(false);
    }

    /// Wake all waiters.
    pub fn notify_all(&self) {
        self.signal(true);
    }

    /// Release the guarded mutex, block until signaled, reacquire the
    /// mutex before returning. Subject to spurious wakeups; re-check
    /// the predicate.
    pub fn wait<T: ?Sized>(&self, guard: &mut MutexGuard<'_, T>) {
        // SAFETY: guard proves the mutex is held by this thread
        let r = unsafe { libc::pthread_cond_wait(self.inner.get(), guard.mutex.raw()) };
        debug_assert_eq!(r, 0, "pthread_cond_wait failed");
    }

    /// As [`Self::wait`], but gives up once the absolute monotonic
    /// deadline (microseconds, as from [`crate::clock::mono_now_us`])
    /// passes without a signal.
    pub fn timed_wait<T: ?Sized>(
        &self,
        guard: &mut MutexGuard<'_, T>,
        deadline_mono_us: i64,
    ) -> WaitTimeoutResult {
        let ts = libc::timespec {
            tv_sec: (deadline_mono_us / USEC_PER_SEC) as libc::time_t,
            tv_nsec: ((deadline_mono_us % USEC_PER_SEC) * 1_000) as _,
        };
        // SAFETY: guard proves the mutex is held by this thread
        let r = unsafe { libc::pthread_cond_timedwait(self.inner.get(), guard.mutex.raw(), &ts) };
        match r {
            0 => WaitTimeoutResult(false),
            libc::ETIMEDOUT => WaitTimeoutResult(true),
            other => {
                debug_assert!(false, "pthread_cond_timedwait failed: {other}");
                WaitTimeoutResult(false)
            }
        }
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Condvar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Condvar").finish_non_exhaustive()
    }
}

fn fatal_init(call: &str, code: i32) -> ! {
    tracing::error!(call, code, "cannot configure monotonic condition variable");
    eprintln!("mainstay: {call} failed ({code}); monotonic condition variables unavailable");
    std::process::abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::Mutex;

    #[test]
    fn init_succeeds_here() {
        let _cond = Condvar::new();
    }

    #[test]
    fn timed_wait_without_signal_times_out() {
        let m = Mutex::new(());
        let cond = Condvar::new();
        let mut g = m.lock();
        let deadline = crate::clock::mono_now_us() + 50_000;
        loop {
            let r = cond.timed_wait(&mut g, deadline);
            if r.timed_out() {
                break;
            }
        }
        assert!(crate::clock::mono_now_us() >= deadline);
    }
}
