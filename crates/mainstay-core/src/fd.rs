//! Guarded descriptor creation
//!
//! Every syscall that creates a descriptor runs under a process-wide
//! fork lock and marks the result close-on-exec before the lock is
//! released. Without the lock, a concurrent fork could duplicate a
//! not-yet-marked descriptor into a child that then leaks it across
//! exec. Code that forks must hold [`fork_lock`] for the duration of
//! the fork.

use crate::{MainstayError, Result};
use nix::fcntl::OFlag;
use nix::sys::socket::{self, AddressFamily, SockFlag, SockProtocol, SockType};
use nix::sys::stat::Mode;
use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::path::Path;

static FORK_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

/// The process-wide fork lock.
///
/// Held internally around every descriptor-creating call in this module.
/// A caller about to `fork` must hold it across the fork so no
/// descriptor can be created (and inherited unmarked) concurrently.
/// Created at process start, never destroyed.
#[must_use]
pub fn fork_lock() -> &'static parking_lot::Mutex<()> {
    &FORK_LOCK
}

fn set_cloexec(fd: RawFd) -> std::io::Result<()> {
    // SAFETY: fd is a valid open descriptor owned by the caller
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: as above
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

fn add_status_flags(fd: RawFd, extra: libc::c_int) -> std::io::Result<()> {
    // SAFETY: fd is a valid open descriptor owned by the caller
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: as above
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | extra) } < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// `open(2)` under the fork lock, close-on-exec applied before release.
///
/// The OS error is propagated unchanged on failure.
pub fn guarded_open<P: AsRef<Path>>(path: P, flags: OFlag, mode: Mode) -> Result<OwnedFd> {
    let path = CString::new(path.as_ref().as_os_str().as_bytes())
        .map_err(|_| std::io::Error::from(std::io::ErrorKind::InvalidInput))?;

    let _guard = FORK_LOCK.lock();
    // SAFETY: path is a valid NUL-terminated string
    let fd = unsafe {
        libc::open(
            path.as_ptr(),
            flags.bits(),
            libc::c_uint::from(mode.bits()),
        )
    };
    if fd < 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    // SAFETY: fd was just created and is exclusively owned here
    let fd = unsafe { OwnedFd::from_raw_fd(fd) };
    set_cloexec(fd.as_raw_fd())?;
    Ok(fd)
}

/// `socket(2)` under the fork lock, close-on-exec applied before release.
pub fn guarded_socket(
    domain: AddressFamily,
    ty: SockType,
    protocol: Option<SockProtocol>,
) -> Result<OwnedFd> {
    let _guard = FORK_LOCK.lock();
    let fd = socket::socket(domain, ty, SockFlag::empty(), protocol)?;
    set_cloexec(fd.as_raw_fd())?;
    Ok(fd)
}

/// A pipe; both ends exist together and close together.
#[derive(Debug)]
pub struct Pipe {
    pub rd: OwnedFd,
    pub wr: OwnedFd,
}

impl Pipe {
    /// Close both ends.
    pub fn close(self) {
        drop(self);
    }

    /// Split into `(read_end, write_end)`, e.g. to hand one end to
    /// another owner.
    #[must_use]
    pub fn split(self) -> (OwnedFd, OwnedFd) {
        (self.rd, self.wr)
    }
}

/// `pipe(2)` under the fork lock.
///
/// Both ends are marked close-on-exec and the requested status flags
/// (e.g. `O_NONBLOCK`) are applied to both ends before the lock is
/// released.
pub fn guarded_pipe(flags: OFlag) -> Result<Pipe> {
    let _guard = FORK_LOCK.lock();

    let mut fds = [0 as RawFd; 2];
    // SAFETY: fds is a valid out-array of two descriptors
    if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    // SAFETY: both descriptors were just created and are exclusively owned
    let rd = unsafe { OwnedFd::from_raw_fd(fds[0]) };
    // SAFETY: as above
    let wr = unsafe { OwnedFd::from_raw_fd(fds[1]) };

    if !flags.is_empty() {
        add_status_flags(rd.as_raw_fd(), flags.bits())?;
        add_status_flags(wr.as_raw_fd(), flags.bits())?;
    }

    Ok(Pipe { rd, wr })
}

fn stream_options(mode: &str) -> Option<OpenOptions> {
    let mut chars = mode.chars();
    let primary = chars.next()?;
    let rest: Vec<char> = chars.collect();
    if rest.iter().any(|c| !matches!(c, '+' | 'b')) {
        return None;
    }
    let update = rest.contains(&'+');

    let mut opts = OpenOptions::new();
    match primary {
        'r' => {
            opts.read(true);
            if update {
                opts.write(true);
            }
        }
        'w' => {
            opts.write(true).create(true).truncate(true);
            if update {
                opts.read(true);
            }
        }
        'a' => {
            opts.append(true).create(true);
            if update {
                opts.read(true);
            }
        }
        _ => return None,
    }
    Some(opts)
}

/// `fopen(3)`-equivalent under the fork lock; `mode` uses the classic
/// `"r"`, `"w"`, `"a"` grammar with optional `+` and `b`.
pub fn guarded_fopen<P: AsRef<Path>>(path: P, mode: &str) -> Result<File> {
    let opts = stream_options(mode).ok_or_else(|| MainstayError::StreamMode(mode.to_owned()))?;

    let _guard = FORK_LOCK.lock();
    let file = opts.open(path)?;
    set_cloexec(file.as_raw_fd())?;
    Ok(file)
}
