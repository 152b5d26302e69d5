//! Monotonic clock sources
//!
//! Every deadline in this crate is computed against `CLOCK_MONOTONIC`,
//! never wall-clock time. A coarse variant is provided for timeout
//! comparisons where sub-millisecond precision buys nothing.

use nix::time::{clock_gettime, ClockId};

/// Microseconds per second, for deadline arithmetic.
pub const USEC_PER_SEC: i64 = 1_000_000;

/// Convert whole seconds to monotonic microseconds.
#[must_use]
pub const fn sec_to_us(secs: i64) -> i64 {
    secs * USEC_PER_SEC
}

fn read_us(clock: ClockId) -> i64 {
    match clock_gettime(clock) {
        Ok(ts) => ts.tv_sec() as i64 * USEC_PER_SEC + ts.tv_nsec() as i64 / 1_000,
        Err(e) => {
            // Every timeout in the process is defined against this clock;
            // there is no degraded mode to fall back to.
            tracing::error!(clock = ?clock, error = %e, "monotonic clock read failed");
            std::process::abort();
        }
    }
}

/// Current monotonic time in microseconds.
#[must_use]
pub fn mono_now_us() -> i64 {
    read_us(ClockId::CLOCK_MONOTONIC)
}

/// Coarse monotonic time in microseconds.
///
/// Reads `CLOCK_MONOTONIC_COARSE` where the platform has it (tick
/// resolution, cheaper than the precise clock); only suitable for
/// timeout comparisons.
#[must_use]
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn fast_mono_now_us() -> i64 {
    read_us(ClockId::CLOCK_MONOTONIC_COARSE)
}

#[must_use]
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub fn fast_mono_now_us() -> i64 {
    mono_now_us()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_never_goes_backward() {
        let mut prev = mono_now_us();
        for _ in 0..1000 {
            let now = mono_now_us();
            assert!(now >= prev);
            prev = now;
        }
    }

    #[test]
    fn coarse_tracks_precise() {
        let precise = mono_now_us();
        let coarse = fast_mono_now_us();
        // Coarse resolution is a scheduler tick; anything within 100ms is sane.
        assert!((precise - coarse).abs() < 100_000);
    }

    #[test]
    fn sec_conversion() {
        assert_eq!(sec_to_us(25), 25_000_000);
    }
}
