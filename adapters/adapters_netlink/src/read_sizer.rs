//! Read Sizing Module
//!
//! Picks a buffer size for a read when the caller did not ask for one. The
//! OS is asked how many bytes are pending (`FIONREAD`); a positive answer is
//! used, clamped to the configured maximum. Zero, an error, or a platform
//! without the query all fall back to the configured default.

use socket2::Socket as Socket2;

use crate::config::SocketConfig;

/// Buffer size for the next read on `handle`; always at least one byte
pub fn next_read_size(handle: &Socket2, config: &SocketConfig) -> usize {
    let size = match bytes_available(handle) {
        Some(n) if n > 0 => n.min(config.max_read_size),
        _ => config.default_read_size,
    };
    size.max(1)
}

/// Bytes currently queued on the handle, if the OS will say
#[cfg(unix)]
pub fn bytes_available(handle: &Socket2) -> Option<usize> {
    use std::os::unix::io::AsRawFd;

    let mut available: libc::c_int = 0;
    // SAFETY: FIONREAD writes a single c_int through the pointer, which
    // points at a live local.
    let rc = unsafe {
        libc::ioctl(
            handle.as_raw_fd(),
            libc::FIONREAD as _,
            &mut available as *mut libc::c_int,
        )
    };
    if rc < 0 {
        return None;
    }
    usize::try_from(available).ok()
}

#[cfg(not(unix))]
pub fn bytes_available(_handle: &Socket2) -> Option<usize> {
    None
}
