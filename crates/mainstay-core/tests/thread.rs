//! Thread lifecycle: labels, signal environment, interruption.

use mainstay_core::sleep::{safe_sleep_us, sleep_once_us};
use mainstay_core::thread::{
    interrupt, on_shutdown, renice_current, shutdown_requested, spawn_named,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn spawned_thread_carries_the_tagged_label() {
    let handle = spawn_named("io", || {
        std::thread::current().name().map(String::from)
    })
    .unwrap();
    assert_eq!(handle.join().unwrap().as_deref(), Some("mst:io"));
}

#[test]
fn interrupt_kicks_a_thread_out_of_a_blocking_sleep() {
    let handle = spawn_named("sleeper", || {
        let start = Instant::now();
        let remainder = sleep_once_us(2_000_000);
        (remainder, start.elapsed())
    })
    .unwrap();

    // Keep kicking until the thread gives up its syscall; a kick that
    // lands between syscalls is harmless and retried.
    while !handle.is_finished() {
        let _ = interrupt(&handle);
        std::thread::sleep(Duration::from_millis(20));
    }
    let (remainder, elapsed) = handle.join().unwrap();
    assert!(remainder > 0, "sleep was not interrupted");
    assert!(elapsed < Duration::from_secs(2));
}

#[test]
fn safe_sleep_absorbs_interruptions() {
    let handle = spawn_named("resleep", || {
        let start = Instant::now();
        safe_sleep_us(300_000);
        start.elapsed()
    })
    .unwrap();

    for _ in 0..10 {
        if handle.is_finished() {
            break;
        }
        let _ = interrupt(&handle);
        std::thread::sleep(Duration::from_millis(20));
    }
    let elapsed = handle.join().unwrap();
    assert!(elapsed >= Duration::from_micros(300_000));
}

#[test]
fn renice_is_accepted_or_a_noop() {
    // Raising niceness of the calling thread needs no privilege.
    renice_current(1).unwrap();
}

#[test]
fn sigterm_sets_the_flag_and_runs_hooks() {
    let hook_ran = Arc::new(AtomicBool::new(false));
    {
        let hook_ran = Arc::clone(&hook_ran);
        on_shutdown(move || hook_ran.store(true, Ordering::Relaxed)).unwrap();
    }
    assert!(!shutdown_requested());

    // raise() delivers synchronously to the calling thread.
    unsafe { libc::raise(libc::SIGTERM) };

    assert!(shutdown_requested());
    assert!(hook_ran.load(Ordering::Relaxed));
}
