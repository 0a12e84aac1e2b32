// src/system/readiness.rs

//! Zero-timeout readiness probes on file descriptors, and the non-blocking
//! switch used for the child's stdin.

use std::io;

/// Returns `true` if a read on `fd` would not block: data is pending, or the
/// other end hung up (a read would report end-of-file).
#[cfg(unix)]
#[allow(unsafe_code)]
pub fn is_readable(fd: &impl std::os::fd::AsFd) -> io::Result<bool> {
    use std::os::fd::AsRawFd;

    let mut pollfd = libc::pollfd {
        fd: fd.as_fd().as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    // SAFETY: `pollfd` is a valid, exclusively borrowed struct for the duration
    // of the call, `nfds` is 1 to match it, and the descriptor is kept open by
    // the `AsFd` borrow. A zero timeout means the call never blocks.
    let ready = unsafe { libc::poll(&mut pollfd, 1, 0) };
    if ready < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    Ok(ready > 0 && pollfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
}

/// Puts `fd` in non-blocking mode, so writes report `WouldBlock` instead of
/// waiting for the reader.
#[cfg(unix)]
#[allow(unsafe_code)]
pub fn set_nonblocking(fd: &impl std::os::fd::AsFd) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    let raw = fd.as_fd().as_raw_fd();
    // SAFETY: `raw` stays open for the duration of both calls through the
    // `AsFd` borrow, and F_GETFL/F_SETFL only touch the descriptor's status flags.
    let flags = unsafe { libc::fcntl(raw, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if flags & libc::O_NONBLOCK != 0 {
        return Ok(());
    }
    // SAFETY: as above.
    if unsafe { libc::fcntl(raw, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Whether the caller's stdin has data waiting right now.
///
/// Probe failures count as "nothing pending".
pub fn stdin_has_pending_input() -> bool {
    #[cfg(unix)]
    {
        match is_readable(&io::stdin()) {
            Ok(ready) => ready,
            Err(e) => {
                log::debug!("stdin readiness probe failed: {}", e);
                false
            }
        }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_pipe_readiness_follows_data() {
        let (reader, mut writer) = io::pipe().unwrap();
        assert!(!is_readable(&reader).unwrap());

        writer.write_all(b"ping\n").unwrap();
        assert!(is_readable(&reader).unwrap());
    }

    #[test]
    fn test_hangup_counts_as_readable() {
        let (reader, writer) = io::pipe().unwrap();
        drop(writer);
        assert!(is_readable(&reader).unwrap());
    }

    #[test]
    fn test_full_nonblocking_pipe_would_block() {
        let (_reader, mut writer) = io::pipe().unwrap();
        set_nonblocking(&writer).unwrap();
        set_nonblocking(&writer).unwrap();

        let chunk = [0u8; 4096];
        let mut written = 0usize;
        let err = loop {
            match writer.write(&chunk) {
                Ok(n) => written += n,
                Err(e) => break e,
            }
            assert!(written < 64 * 1024 * 1024, "pipe never filled up");
        };
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
        assert!(written > 0);
    }

    #[test]
    fn test_regular_files_are_always_readable() {
        let file = tempfile::tempfile().unwrap();
        assert!(is_readable(&file).unwrap());
    }
}
