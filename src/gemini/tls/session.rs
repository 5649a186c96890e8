//! TLS session operations
//!
//! Implements `SessionOps` over an OpenSSL stream.

use super::cert;
use crate::gemini::session::{poll_fd, SessionOps};
use openssl::ssl::SslStream;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::fd::AsRawFd;
use std::time::Duration;

/// An established client TLS session
pub struct TlsSession {
    stream: SslStream<TcpStream>,
    failed: bool,
}

impl TlsSession {
    pub(crate) fn new(stream: SslStream<TcpStream>) -> Self {
        TlsSession {
            stream,
            failed: false,
        }
    }

    /// Negotiated protocol version (e.g. "TLSv1.3")
    pub fn version(&self) -> &'static str {
        self.stream.ssl().version_str()
    }
}

impl SessionOps for TlsSession {
    fn poll(&self, timeout: Option<Duration>) -> io::Result<bool> {
        // Decrypted bytes may already be buffered inside OpenSSL
        if self.stream.ssl().pending() > 0 {
            return Ok(true);
        }

        poll_fd(self.stream.get_ref().as_raw_fd(), timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf).map_err(|e| {
            self.failed = true;
            e
        })
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf).map_err(|e| {
            self.failed = true;
            e
        })
    }

    fn close(&mut self) -> io::Result<()> {
        // Perform SSL shutdown if not failed
        if !self.failed {
            let _ = self.stream.shutdown();
        }

        match self.stream.get_mut().shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }

    fn peer_fingerprint(&self) -> Option<String> {
        cert::peer_fingerprint(self.stream.ssl())
    }
}
