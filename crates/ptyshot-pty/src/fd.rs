//! Small file-descriptor helpers for the relays.

use std::fs::File;
use std::io;
use std::os::fd::{BorrowedFd, RawFd};
use std::time::Duration;

/// Wait up to `timeout` for `fd` to become readable.
///
/// Hang-up and error conditions also count as readable so the following
/// `read` can report them. An interrupted poll (e.g. by SIGWINCH) reports
/// "not ready" and lets the caller loop.
pub(crate) fn poll_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

    let result = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
    if result < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }

    Ok(result > 0 && pollfd.revents != 0)
}

/// Duplicate a descriptor into an owned `File`.
pub(crate) fn dup_file(fd: BorrowedFd<'_>) -> io::Result<File> {
    Ok(File::from(fd.try_clone_to_owned()?))
}
