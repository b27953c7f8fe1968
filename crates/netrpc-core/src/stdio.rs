//! Exclusive takeover of the process's stdin/stdout.
//!
//! [`take`] captures duplicates of the real stdin/stdout descriptors and
//! points fds 0 and 1 at the discard device, so every other code path in the
//! process (stray `println!`, child processes inheriting stdio) reads EOF and
//! writes into `/dev/null` while the returned [`StdioChannel`] owns the real
//! pair. [`StdioChannel::close`] puts the originals back.
//!
//! ```text
//! Free --take--> Taken --close--> Free
//! ```
//!
//! Only one channel may be outstanding at a time. A channel that is dropped
//! without being closed (including during unwinding) closes itself.
//!
//! Nothing else in the process may swap fds 0/1 while a channel is taken.

// This module owns the process stdio descriptor boundary.
#![allow(unsafe_code)]

use crate::error::{NetRpcError, Result};
use std::fs::File;
use std::io::{Read, Write};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::{debug, warn};

/// Process-wide takeover flag.
static TAKEN: Mutex<bool> = Mutex::new(false);

/// Discard device, opened once on first use and kept for the process lifetime.
static DISCARD: OnceLock<std::result::Result<File, String>> = OnceLock::new();

fn lock_taken() -> MutexGuard<'static, bool> {
    TAKEN.lock().unwrap_or_else(PoisonError::into_inner)
}

fn discard_device() -> Result<&'static File> {
    DISCARD
        .get_or_init(|| {
            std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .open(sys::DEV_NULL)
                .map_err(|e| format!("{}: {}", sys::DEV_NULL, e))
        })
        .as_ref()
        .map_err(|message| NetRpcError::DeviceUnavailable {
            message: message.clone(),
        })
}

/// The captured stdin/stdout pair, usable as one bidirectional byte stream.
#[derive(Debug)]
pub struct StdioChannel {
    input: Option<File>,
    output: Option<File>,
}

/// Take over the process stdio.
///
/// Fails with [`NetRpcError::AlreadyTaken`] while another channel is
/// outstanding, leaving that channel untouched.
pub fn take() -> Result<StdioChannel> {
    let discard = discard_device()?;

    let mut taken = lock_taken();
    if *taken {
        return Err(NetRpcError::AlreadyTaken);
    }

    // Anything still buffered belongs to the real stdout.
    if let Err(e) = std::io::stdout().flush() {
        debug!("Failed to flush stdout before takeover: {}", e);
    }

    let (input, output) = sys::capture()?;
    if let Err(e) = sys::redirect(discard) {
        // Put back whatever was already swapped.
        let _ = sys::restore(&input, &output);
        return Err(e);
    }

    *taken = true;
    debug!("stdio taken");

    Ok(StdioChannel {
        input: Some(input),
        output: Some(output),
    })
}

/// Check whether a channel is currently outstanding.
pub fn is_taken() -> bool {
    *lock_taken()
}

impl StdioChannel {
    /// Return the captured pair to the process.
    ///
    /// The first call restores fds 0 and 1; later calls fail with
    /// [`NetRpcError::AlreadyClosed`].
    pub fn close(&mut self) -> Result<()> {
        let mut taken = lock_taken();
        let (Some(input), Some(output)) = (self.input.as_ref(), self.output.as_ref()) else {
            return Err(NetRpcError::AlreadyClosed);
        };
        if !*taken {
            return Err(NetRpcError::AlreadyClosed);
        }

        // Flush incidental writes into the discard device, not the restored stdout.
        if let Err(e) = std::io::stdout().flush() {
            debug!("Failed to flush stdout before restoring: {}", e);
        }

        sys::restore(input, output)?;

        self.input = None;
        self.output = None;
        *taken = false;
        debug!("stdio returned");

        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.input.is_none()
    }

    /// Independent handles onto the captured pair for use with tokio.
    ///
    /// The handles keep working after [`close`](Self::close); drop them
    /// before closing if the peer should observe EOF.
    pub fn async_halves(&self) -> Result<(tokio::fs::File, tokio::fs::File)> {
        let (Some(input), Some(output)) = (self.input.as_ref(), self.output.as_ref()) else {
            return Err(NetRpcError::AlreadyClosed);
        };

        Ok((
            tokio::fs::File::from_std(input.try_clone()?),
            tokio::fs::File::from_std(output.try_clone()?),
        ))
    }
}

impl Read for StdioChannel {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.input.as_mut() {
            Some(input) => input.read(buf),
            None => Err(NetRpcError::AlreadyClosed.into()),
        }
    }
}

impl Write for StdioChannel {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.output.as_mut() {
            Some(output) => output.write(buf),
            None => Err(NetRpcError::AlreadyClosed.into()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.output.as_mut() {
            Some(output) => output.flush(),
            None => Err(NetRpcError::AlreadyClosed.into()),
        }
    }
}

impl Drop for StdioChannel {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(e) = self.close() {
            warn!("Failed to return stdio on drop: {}", e);
        }
    }
}

#[cfg(unix)]
mod sys {
    use crate::error::Result;
    use std::fs::File;
    use std::os::fd::{AsFd, AsRawFd, RawFd};

    pub const DEV_NULL: &str = "/dev/null";

    const STDIN: RawFd = libc::STDIN_FILENO;
    const STDOUT: RawFd = libc::STDOUT_FILENO;

    /// Duplicate the current stdin/stdout descriptors.
    pub fn capture() -> Result<(File, File)> {
        let input = std::io::stdin().as_fd().try_clone_to_owned()?;
        let output = std::io::stdout().as_fd().try_clone_to_owned()?;
        Ok((File::from(input), File::from(output)))
    }

    /// Point fds 0 and 1 at `target`.
    pub fn redirect(target: &File) -> Result<()> {
        dup2(target.as_raw_fd(), STDIN)?;
        dup2(target.as_raw_fd(), STDOUT)?;
        Ok(())
    }

    /// Point fds 0 and 1 back at the captured originals.
    pub fn restore(input: &File, output: &File) -> Result<()> {
        dup2(input.as_raw_fd(), STDIN)?;
        dup2(output.as_raw_fd(), STDOUT)?;
        Ok(())
    }

    fn dup2(from: RawFd, to: RawFd) -> std::io::Result<()> {
        loop {
            // SAFETY: `from` is a live descriptor borrowed from an open `File`
            // and `to` is one of the standard descriptors, which the process
            // owns for its whole lifetime. dup2 atomically replaces `to`
            // without invalidating any Rust-owned descriptor.
            let rc = unsafe { libc::dup2(from, to) };
            if rc != -1 {
                return Ok(());
            }
            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

#[cfg(not(unix))]
mod sys {
    use crate::error::{NetRpcError, Result};
    use std::fs::File;

    pub const DEV_NULL: &str = "NUL";

    pub fn capture() -> Result<(File, File)> {
        Err(NetRpcError::DeviceUnavailable {
            message: "stdio takeover is only supported on unix platforms".to_string(),
        })
    }

    pub fn redirect(_target: &File) -> Result<()> {
        capture().map(|_| ())
    }

    pub fn restore(_input: &File, _output: &File) -> Result<()> {
        capture().map(|_| ())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    // The takeover is process-wide; tests touching it run one at a time.
    static SERIAL: Mutex<()> = Mutex::new(());

    fn serial() -> MutexGuard<'static, ()> {
        SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(target_os = "linux")]
    fn fd_target(fd: i32) -> std::path::PathBuf {
        std::fs::read_link(format!("/proc/self/fd/{}", fd)).unwrap()
    }

    #[test]
    fn test_take_and_close() {
        let _guard = serial();

        let mut channel = take().unwrap();
        assert!(is_taken());
        assert!(!channel.is_closed());

        channel.close().unwrap();
        assert!(!is_taken());
        assert!(channel.is_closed());
    }

    #[test]
    fn test_second_take_fails_and_first_stays_usable() {
        let _guard = serial();

        let mut first = take().unwrap();
        assert!(matches!(take(), Err(NetRpcError::AlreadyTaken)));

        assert!(!first.is_closed());
        assert_eq!(first.write(&[]).unwrap(), 0);
        first.flush().unwrap();
        assert!(first.async_halves().is_ok());

        first.close().unwrap();
    }

    /// Puts the saved fds 0/1 back when a test that swapped them ends.
    struct SavedStdio(File, File);

    impl Drop for SavedStdio {
        fn drop(&mut self) {
            sys::restore(&self.0, &self.1).unwrap();
        }
    }

    #[test]
    fn test_first_channel_carries_bytes_after_failed_take() {
        use std::os::fd::OwnedFd;
        use std::os::unix::net::UnixStream;

        let _guard = serial();

        // Route the process stdio through a socket this test holds the other end of.
        let (saved_in, saved_out) = sys::capture().unwrap();
        let _saved = SavedStdio(saved_in, saved_out);
        let (mut host, plugin_end) = UnixStream::pair().unwrap();
        let plugin_end = File::from(OwnedFd::from(plugin_end));
        sys::restore(&plugin_end, &plugin_end).unwrap();
        drop(plugin_end);

        let mut first = take().unwrap();
        assert!(matches!(take(), Err(NetRpcError::AlreadyTaken)));

        first.write_all(b"netrpc-ping\n").unwrap();
        first.flush().unwrap();

        // Anything the test harness wrote before the takeover may precede it.
        host.set_read_timeout(Some(std::time::Duration::from_secs(5))).unwrap();
        let mut seen = Vec::new();
        let mut buf = [0u8; 256];
        while !String::from_utf8_lossy(&seen).contains("netrpc-ping\n") {
            let n = host.read(&mut buf).unwrap();
            assert!(n > 0, "socket closed before the write arrived");
            seen.extend_from_slice(&buf[..n]);
        }

        host.write_all(b"pong").unwrap();
        let mut reply = [0u8; 4];
        first.read_exact(&mut reply).unwrap();
        assert_eq!(&reply, b"pong");

        first.close().unwrap();
    }

    #[test]
    fn test_double_close_reports_already_closed() {
        let _guard = serial();

        let mut channel = take().unwrap();
        channel.close().unwrap();
        assert!(matches!(channel.close(), Err(NetRpcError::AlreadyClosed)));
        assert!(!is_taken());
    }

    #[test]
    fn test_io_after_close_fails() {
        let _guard = serial();

        let mut channel = take().unwrap();
        channel.close().unwrap();

        let mut buf = [0u8; 4];
        let err = channel.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
        assert!(channel.write(b"x").is_err());
        assert!(channel.async_halves().is_err());
    }

    #[test]
    fn test_drop_returns_stdio() {
        let _guard = serial();

        {
            let _channel = take().unwrap();
            assert!(is_taken());
        }
        assert!(!is_taken());

        let mut again = take().unwrap();
        again.close().unwrap();
    }

    #[test]
    fn test_take_after_close_succeeds() {
        let _guard = serial();

        for _ in 0..3 {
            let mut channel = take().unwrap();
            channel.close().unwrap();
        }
        assert!(!is_taken());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_global_stdout_points_at_discard_while_taken() {
        let _guard = serial();

        let original = fd_target(1);
        let mut channel = take().unwrap();
        assert_eq!(fd_target(1), std::path::PathBuf::from("/dev/null"));
        assert_eq!(fd_target(0), std::path::PathBuf::from("/dev/null"));

        channel.close().unwrap();
        assert_eq!(fd_target(1), original);
    }
}
