//! Thread lifecycle wrapper
//!
//! [`spawn_named`] starts an OS thread with a short platform label and
//! an established signal environment: SIGTERM and SIGQUIT are unblocked
//! for the new thread, SIGTERM triggers the orderly-shutdown flag, and
//! SIGQUIT is a deliberate no-op handler whose only job is to make
//! blocking syscalls return `EINTR` so a thread can notice a
//! cancellation flag and exit voluntarily ([`interrupt`] is the sender
//! side). The closure and label form the thread descriptor; ownership
//! moves to the new thread at spawn, and stays with the creator only on
//! the failure path.

use crate::Result;
use nix::sys::signal::{SigHandler, SigSet, Signal};
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use std::thread::JoinHandle;

/// Fixed label tag prepended to every thread name.
pub const THREAD_TAG: &str = "mst:";

/// Label capacity including the tag; platform thread names are short.
pub const LABEL_MAX: usize = 16;

static SHUTDOWN: Lazy<Arc<AtomicBool>> = Lazy::new(|| Arc::new(AtomicBool::new(false)));
static HANDLERS: Once = Once::new();

extern "C" fn quit_noop(_sig: libc::c_int) {}

fn ensure_signal_handlers() {
    HANDLERS.call_once(|| {
        if let Err(e) =
            signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&SHUTDOWN))
        {
            tracing::warn!(error = %e, "cannot register termination handler");
        }
        // Installed without SA_RESTART so blocking syscalls actually
        // return EINTR when a thread is kicked.
        let action = nix::sys::signal::SigAction::new(
            SigHandler::Handler(quit_noop),
            nix::sys::signal::SaFlags::empty(),
            SigSet::empty(),
        );
        // SAFETY: quit_noop does nothing and is async-signal-safe
        if let Err(e) = unsafe { nix::sys::signal::sigaction(Signal::SIGQUIT, &action) } {
            tracing::warn!(error = %e, "cannot register quit handler");
        }
    });
}

/// Whether a termination signal has requested orderly shutdown.
#[must_use]
pub fn shutdown_requested() -> bool {
    ensure_signal_handlers();
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Run `hook` when the termination signal arrives, in addition to
/// setting the shutdown flag. `hook` runs in signal-handler context and
/// must restrict itself to async-signal-safe work.
pub fn on_shutdown<F>(hook: F) -> Result<()>
where
    F: Fn() + Sync + Send + 'static,
{
    ensure_signal_handlers();
    // SAFETY: the caller's contract above
    unsafe { signal_hook::low_level::register(signal_hook::consts::SIGTERM, hook) }?;
    Ok(())
}

/// Build the platform label for a thread: the fixed tag plus the
/// caller's name, truncated to fit [`LABEL_MAX`] bytes. Truncation
/// keeps the result valid UTF-8.
#[must_use]
pub fn thread_label(name: &str) -> String {
    let mut label = String::with_capacity(LABEL_MAX);
    label.push_str(THREAD_TAG);
    for c in name.chars() {
        if label.len() + c.len_utf8() > LABEL_MAX {
            break;
        }
        label.push(c);
    }
    label
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn apply_platform_name(label: &std::ffi::CStr) {
    // prctl truncates to the 15-visible-byte kernel limit itself.
    // SAFETY: label is a valid NUL-terminated string
    unsafe {
        libc::prctl(libc::PR_SET_NAME, label.as_ptr());
    }
}

#[cfg(target_os = "macos")]
fn apply_platform_name(label: &std::ffi::CStr) {
    // SAFETY: label is a valid NUL-terminated string
    unsafe {
        libc::pthread_setname_np(label.as_ptr());
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "macos")))]
fn apply_platform_name(_label: &std::ffi::CStr) {}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn os_tid() -> i64 {
    // SAFETY: gettid takes no arguments and cannot fail
    unsafe { libc::syscall(libc::SYS_gettid) as i64 }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn os_tid() -> i64 {
    0
}

fn bootstrap(label: &str) {
    if let Ok(c) = std::ffi::CString::new(label) {
        apply_platform_name(&c);
    }

    // The creator may have spawned us with these blocked; undo that for
    // this thread only.
    let mut set = SigSet::empty();
    set.add(Signal::SIGTERM);
    set.add(Signal::SIGQUIT);
    if let Err(e) = set.thread_unblock() {
        tracing::warn!(error = %e, "cannot unblock signals for new thread");
    }

    tracing::trace!(tid = os_tid(), name = label, "thread started");
}

/// Spawn an OS thread labeled `name` (tagged and truncated, see
/// [`thread_label`]) whose signal environment is established before `f`
/// runs. The return value of `f` propagates through the join handle.
///
/// Thread-creation failure is returned unchanged; in that case no
/// thread runs and the descriptor (closure) is dropped here.
pub fn spawn_named<F, T>(name: &str, f: F) -> Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    // Install the process-wide handlers before the thread exists, so a
    // kick cannot hit a thread that still has the default disposition.
    ensure_signal_handlers();

    let label = thread_label(name);
    let handle = std::thread::Builder::new()
        .name(label.clone())
        .spawn(move || {
            bootstrap(&label);
            f()
        })?;
    Ok(handle)
}

/// Kick a thread out of a blocking syscall by delivering the no-op quit
/// signal to it. The target observes `EINTR` and re-checks its
/// cancellation condition; nothing is forcibly terminated.
pub fn interrupt<T>(handle: &JoinHandle<T>) -> Result<()> {
    use std::os::unix::thread::JoinHandleExt;
    // SAFETY: the pthread id is valid while the JoinHandle is alive
    let r = unsafe { libc::pthread_kill(handle.as_pthread_t(), libc::SIGQUIT) };
    if r != 0 {
        return Err(std::io::Error::from_raw_os_error(r).into());
    }
    Ok(())
}

/// Best-effort priority adjustment of the calling thread (Linux nice
/// range, -19..=20). Platforms without a supported mechanism compile to
/// a successful no-op.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn renice_current(value: i32) -> Result<()> {
    let tid = os_tid();
    // SAFETY: adjusting our own thread's priority
    let r = unsafe { libc::setpriority(libc::PRIO_PROCESS as _, tid as _, value) };
    if r == -1 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub fn renice_current(_value: i32) -> Result<()> {
    Ok(())
}
