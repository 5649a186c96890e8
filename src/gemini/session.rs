//! Session operations abstraction
//!
//! The connection event loop is written against `SessionOps` so it can run
//! over a TLS session in production and over a scripted transport in tests.

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// Session operations trait
pub trait SessionOps {
    /// Wait until the session has data to read
    ///
    /// Returns false if the timeout passed first
    fn poll(&self, timeout: Option<Duration>) -> io::Result<bool>;

    /// Read data from the session; `Ok(0)` means end of stream
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write data to the session
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Close the session
    fn close(&mut self) -> io::Result<()>;

    /// Fingerprint of the first certificate the peer presented, if any
    fn peer_fingerprint(&self) -> Option<String> {
        None
    }

    /// Write the whole buffer
    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf)? {
                0 => return Err(io::ErrorKind::WriteZero.into()),
                n => buf = &buf[n..],
            }
        }
        Ok(())
    }
}

/// Wait for a raw socket descriptor to become readable with `poll(2)`
pub(crate) fn poll_fd(fd: RawFd, timeout: Option<Duration>) -> io::Result<bool> {
    use libc::{poll, pollfd, POLLIN};

    let mut pfd = pollfd {
        fd,
        events: POLLIN,
        revents: 0,
    };

    let timeout_ms = timeout
        .map(|d| d.as_millis().min(i32::MAX as u128) as i32)
        .unwrap_or(-1); // -1 = infinite

    let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };

    if result < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }

    Ok(result > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::os::fd::AsRawFd;
    use std::thread;

    #[test]
    fn test_poll_fd_ready() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"20 text/gemini\r\n").unwrap();
        });

        let stream = TcpStream::connect(addr).unwrap();
        assert!(poll_fd(stream.as_raw_fd(), Some(Duration::from_secs(1))).unwrap());

        handle.join().unwrap();
    }

    #[test]
    fn test_poll_fd_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let _handle = thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(500));
        });

        let stream = TcpStream::connect(addr).unwrap();
        let ready = poll_fd(stream.as_raw_fd(), Some(Duration::from_millis(50))).unwrap();
        assert!(!ready);
    }
}
