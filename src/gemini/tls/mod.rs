//! TLS support for Gemini connections
//!
//! Every Gemini request travels over TLS. Certificate authorities play no
//! part: the client accepts whatever certificate the server presents and
//! records its fingerprint so later visits can be compared (trust on first
//! use).
//!
//! # Examples
//!
//! ```no_run
//! use gemfetch::gemini::tls::{TlsConfig, TlsVersion};
//! use gemfetch::gemini::session::SessionOps;
//! use std::net::TcpStream;
//!
//! let tls_config = TlsConfig::client()
//!     .version_range(TlsVersion::Tls12, TlsVersion::Tls13)
//!     .build()
//!     .unwrap();
//!
//! let tcp_stream = TcpStream::connect("geminiprotocol.net:1965").unwrap();
//! let mut session = tls_config.connect(tcp_stream, "geminiprotocol.net").unwrap();
//! println!("{:?}", session.peer_fingerprint());
//! session.write_all(b"gemini://geminiprotocol.net/\r\n").unwrap();
//! ```

pub mod cert;
pub mod config;
pub mod session;

pub use config::{ClientConfigBuilder, TlsConfig, TlsError, TlsVersion};
pub use session::TlsSession;
