//! Monotonic-clock sleeps
//!
//! Single-shot variants report the unslept remainder on interruption so
//! latency-sensitive callers can decide what to do; [`safe_sleep_us`]
//! is the robust loop most callers want.

use crate::clock::USEC_PER_SEC;

fn us_to_timespec(us: i64) -> libc::timespec {
    libc::timespec {
        tv_sec: (us / USEC_PER_SEC) as libc::time_t,
        tv_nsec: ((us % USEC_PER_SEC) * 1_000) as _,
    }
}

fn timespec_to_us(ts: &libc::timespec) -> i64 {
    ts.tv_sec as i64 * USEC_PER_SEC + (ts.tv_nsec as i64 + 500) / 1_000
}

/// Sleep once for `us` microseconds on the monotonic clock.
///
/// Returns 0 on completion (non-positive `us` returns 0 without a
/// syscall), the positive unslept remainder if a signal interrupted the
/// sleep, or a negated OS error code.
pub fn sleep_once_us(us: i64) -> i64 {
    if us <= 0 {
        return 0;
    }
    let req = us_to_timespec(us);
    let mut rem = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    // SAFETY: req and rem are valid timespec values
    let r = unsafe { libc::clock_nanosleep(libc::CLOCK_MONOTONIC, 0, &req, &mut rem) };
    match r {
        0 => 0,
        libc::EINTR => timespec_to_us(&rem),
        err => -i64::from(err),
    }
}

/// Sleep once until the absolute monotonic timestamp `deadline_us`.
///
/// Same return contract as [`sleep_once_us`]; the remainder on
/// interruption is recomputed against the deadline. Sleeping toward an
/// absolute target avoids drift across repeated short sleeps.
pub fn sleep_once_until_us(deadline_us: i64) -> i64 {
    if deadline_us <= 0 {
        return 0;
    }
    let req = us_to_timespec(deadline_us);
    // SAFETY: req is a valid timespec; rmtp is unused with TIMER_ABSTIME
    let r = unsafe {
        libc::clock_nanosleep(
            libc::CLOCK_MONOTONIC,
            libc::TIMER_ABSTIME,
            &req,
            std::ptr::null_mut(),
        )
    };
    match r {
        0 => 0,
        libc::EINTR => (deadline_us - crate::clock::mono_now_us()).max(0),
        err => -i64::from(err),
    }
}

/// Sleep for `us` microseconds, absorbing interruptions.
///
/// Re-sleeps any remainder until completion or a non-retryable error.
pub fn safe_sleep_us(us: i64) {
    let mut left = us;
    loop {
        let r = sleep_once_us(left);
        if r < 0 {
            if r == -i64::from(libc::EAGAIN) {
                continue;
            }
            break;
        }
        if r == 0 {
            break;
        }
        left = r;
    }
}
