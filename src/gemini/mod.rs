//! Gemini client implementation
//!
//! This module provides the Gemini fetch pipeline: connection, response
//! classification, body decoding and gemtext conversion.
//!
//! # Architecture
//!
//! A fetch moves through a fixed chain of components:
//!
//! - `Connection` opens a TLS socket, records the peer fingerprint in the
//!   `FingerprintStore` and accumulates bytes until the peer closes
//! - `status::classify` turns the first line into a `StatusOutcome`
//! - `body::decode` produces text or passes opaque bytes through
//! - `gemtext::convert` builds a `Document` for `text/gemini` bodies
//! - `sink::deliver` hands the result to the host's `ResponseSink`
//!
//! Each fetch runs on its own worker thread. Workers share nothing except
//! the fingerprint store.
//!
//! # Examples
//!
//! ```no_run
//! use gemfetch::gemini::{Error, Fetch, FetchConfig, Request, ResponseSink};
//!
//! struct Printer;
//!
//! impl ResponseSink for Printer {
//!     fn receive_metadata(&mut self, mime: &str, encoding: &str) {
//!         println!("{} ({})", mime, encoding);
//!     }
//!     fn receive_bytes(&mut self, data: &[u8]) {
//!         println!("{}", String::from_utf8_lossy(data));
//!     }
//!     fn finish(&mut self) {}
//!     fn fail(&mut self, error: Error) {
//!         eprintln!("fetch failed: {}", error);
//!     }
//! }
//!
//! let request = Request::parse("gemini://geminiprotocol.net/").unwrap();
//! let handle = Fetch::load(request, Printer, FetchConfig::default()).unwrap();
//! handle.join();
//! ```

pub mod body;
pub mod connection;
pub mod fetch;
pub mod gemtext;
pub mod render;
pub mod request;
pub mod session;
pub mod sink;
pub mod status;
pub mod store;
pub mod tls;

pub use body::Body;
pub use connection::{Connection, ConnectionState, StreamEvent};
pub use fetch::{Fetch, FetchConfig, FetchConfigBuilder, FetchHandle};
pub use gemtext::{Block, Document};
pub use request::Request;
pub use sink::ResponseSink;
pub use status::StatusOutcome;
pub use store::FingerprintStore;

/// Result type for Gemini operations
pub type Result<T> = std::result::Result<T, Error>;

/// Gemini fetch errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] tls::TlsError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Could not decode body as {encoding}")]
    Decoding { encoding: String },

    #[error("Client certificate required: {0}")]
    CertificateRequired(String),

    #[error("Fetch cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the error came from the socket or TLS layer rather than
    /// from the response itself
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Tls(_))
    }
}

/// Default Gemini port
pub const DEFAULT_PORT: u16 = 1965;

/// CRLF line ending
pub const CRLF: &str = "\r\n";

/// MIME type of the native markup format
pub const GEMTEXT_MIME: &str = "text/gemini";

/// Maximum length of a request URL in bytes, excluding CRLF
pub const MAX_REQUEST_LEN: usize = 1024;
