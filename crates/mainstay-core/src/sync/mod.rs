//! Timed coordination primitives
//!
//! - [`Mutex`] — a pthread mutex with a deadline-bounded acquisition
//!   synthesized by bounded polling
//! - [`Condvar`] — a condition variable whose timed waits are defined
//!   against the monotonic clock
//!
//! The two pair with each other; a [`Condvar`] waits on a guard taken
//! from this module's [`Mutex`].

pub mod cond;
pub mod mutex;

pub use cond::{Condvar, WaitTimeoutResult};
pub use mutex::{Mutex, MutexGuard, LOCK_POLL_INTERVAL_US};
