//! # mainstay-core
//!
//! Process-safety and synchronization primitives for a multi-threaded,
//! fork-capable server.
//!
//! This crate normalizes the platform quirks of the raw OS primitives:
//! - descriptor creation serialized against `fork` via a process-wide
//!   fork lock, with close-on-exec applied before the lock is released
//! - deadline-bounded blocking writes and monotonic-clock sleeps
//! - thread creation with short platform labels and an established
//!   signal mask/handler set
//! - a timed mutex acquisition synthesized on top of try-lock
//! - condition variables whose timed waits use the monotonic clock
//! - a comparator sort that carries an auxiliary context value
//!
//! Everything here is a building block; thread pools, schedulers and
//! event loops are built on top of it, not inside it.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

pub mod clock;
pub mod error;
pub mod fd;
pub mod io;
pub mod sleep;
pub mod sort;
pub mod sync;
pub mod thread;

pub use error::MainstayError;
pub use fd::Pipe;
pub use sync::{Condvar, Mutex, MutexGuard, WaitTimeoutResult};

/// Crate-level result type
pub type Result<T> = std::result::Result<T, MainstayError>;
