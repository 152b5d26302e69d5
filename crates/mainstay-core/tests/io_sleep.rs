//! Deadline-bounded writes against real pipes.

use mainstay_core::fd::guarded_pipe;
use mainstay_core::io::{write_blocking, write_with_deadline};
use nix::fcntl::OFlag;
use std::io::Read;
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

#[test]
fn full_write_returns_zero_remainder() {
    init_tracing();
    let pipe = guarded_pipe(OFlag::empty()).unwrap();
    let (rd, wr) = pipe.split();

    assert_eq!(write_blocking(&wr, b"hello world"), 0);
    drop(wr);

    let mut buf = Vec::new();
    std::fs::File::from(rd).read_to_end(&mut buf).unwrap();
    assert_eq!(buf, b"hello world");
}

#[test]
fn stalled_sink_returns_the_remainder_near_the_deadline() {
    init_tracing();
    let pipe = guarded_pipe(OFlag::O_NONBLOCK).unwrap();

    // Fill the pipe until the kernel refuses more.
    let chunk = [0u8; 65536];
    loop {
        let n = unsafe {
            libc::write(pipe.wr.as_raw_fd(), chunk.as_ptr().cast(), chunk.len())
        };
        if n < 0 {
            let err = std::io::Error::last_os_error();
            assert_eq!(err.raw_os_error(), Some(libc::EAGAIN));
            break;
        }
    }

    let payload = b"never accepted";
    let deadline = Duration::from_millis(250);
    let start = Instant::now();
    let remainder = write_with_deadline(&pipe.wr, payload, deadline);
    let elapsed = start.elapsed();

    assert_eq!(remainder, payload.len());
    assert!(elapsed >= deadline);
    assert!(elapsed < deadline + Duration::from_millis(750));
}

#[test]
fn partial_progress_still_counts() {
    // Writable pipe, payload smaller than the pipe buffer: everything
    // lands even when the kernel splits the write.
    let pipe = guarded_pipe(OFlag::empty()).unwrap();
    let payload = vec![0xa5u8; 4096];
    assert_eq!(
        write_with_deadline(&pipe.wr, &payload, Duration::from_secs(5)),
        0
    );
}
