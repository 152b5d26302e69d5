//! Deadline-bounded blocking I/O

use crate::clock::mono_now_us;
use crate::sleep::safe_sleep_us;
use std::os::unix::io::{AsFd, AsRawFd};
use std::time::Duration;

/// Default deadline for [`write_blocking`].
pub const WRITE_DEADLINE_DEFAULT: Duration = Duration::from_secs(25);

/// Pause between retries when the destination is temporarily full.
pub const WRITE_RETRY_SLEEP_US: i64 = 100;

fn retryable(err: &std::io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EAGAIN | libc::EWOULDBLOCK | libc::EINTR)
    )
}

/// Write `buf` to `fd`, retrying partial writes until everything is
/// written or `deadline` elapses on the monotonic clock.
///
/// Returns the number of bytes NOT written; 0 means full success. A
/// retryable error (destination temporarily full, interruption) sleeps
/// briefly and retries while the deadline allows; any other error stops
/// immediately. There is no partial-success ambiguity: the remainder is
/// the whole result.
pub fn write_with_deadline<F: AsFd>(fd: F, buf: &[u8], deadline: Duration) -> usize {
    let limit = mono_now_us() + deadline.as_micros() as i64;
    let raw = fd.as_fd().as_raw_fd();
    let mut rem = buf;

    while !rem.is_empty() {
        // SAFETY: rem points into a live slice of rem.len() bytes
        let n = unsafe { libc::write(raw, rem.as_ptr().cast(), rem.len()) };
        if n < 0 {
            let err = std::io::Error::last_os_error();
            if retryable(&err) {
                if mono_now_us() > limit {
                    break;
                }
                safe_sleep_us(WRITE_RETRY_SLEEP_US);
                continue;
            }
            break;
        }
        rem = &rem[n as usize..];
    }

    rem.len()
}

/// [`write_with_deadline`] with the default deadline.
pub fn write_blocking<F: AsFd>(fd: F, buf: &[u8]) -> usize {
    write_with_deadline(fd, buf, WRITE_DEADLINE_DEFAULT)
}
