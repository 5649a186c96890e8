//! TLS configuration
//!
//! Client-side configuration only. Peer verification is always off: Gemini
//! servers commonly use self-signed certificates and trust is established by
//! fingerprint (TOFU) rather than by a certificate authority.

use super::session::TlsSession;
use openssl::ssl::{Ssl, SslContext, SslContextBuilder, SslMethod, SslVerifyMode};
use std::net::{IpAddr, TcpStream};

/// TLS version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl TlsVersion {
    /// Get OpenSSL protocol version constant
    pub fn to_openssl_version(&self) -> openssl::ssl::SslVersion {
        use openssl::ssl::SslVersion;
        match self {
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }

    /// Get version as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
        }
    }
}

/// TLS errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),
}

/// TLS client configuration (immutable after building, cheap to clone)
#[derive(Clone)]
pub struct TlsConfig {
    pub(crate) ctx: SslContext,
    pub(crate) min_version: TlsVersion,
    pub(crate) max_version: TlsVersion,
}

impl TlsConfig {
    /// Create a new client configuration builder
    pub fn client() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Perform the client handshake over an established TCP stream
    ///
    /// `servername` is sent as SNI unless it is an IP address literal.
    pub fn connect(&self, stream: TcpStream, servername: &str) -> Result<TlsSession, TlsError> {
        let mut ssl = Ssl::new(&self.ctx)?;

        if servername.parse::<IpAddr>().is_err() {
            ssl.set_hostname(servername)?;
        }

        let ssl_stream = ssl
            .connect(stream)
            .map_err(|e| TlsError::HandshakeFailed(format!("{}: {}", servername, e)))?;

        Ok(TlsSession::new(ssl_stream))
    }

    /// Negotiable version range
    pub fn versions(&self) -> (TlsVersion, TlsVersion) {
        (self.min_version, self.max_version)
    }
}

/// Client configuration builder
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    min_version: TlsVersion,
    max_version: TlsVersion,
}

impl ClientConfigBuilder {
    fn new() -> Self {
        ClientConfigBuilder {
            min_version: TlsVersion::Tls12,
            max_version: TlsVersion::Tls13,
        }
    }

    /// Set TLS version range
    pub fn version_range(mut self, min: TlsVersion, max: TlsVersion) -> Self {
        self.min_version = min;
        self.max_version = max;
        self
    }

    /// Build the TLS configuration
    pub fn build(self) -> Result<TlsConfig, TlsError> {
        if self.min_version > self.max_version {
            return Err(TlsError::InvalidConfig(format!(
                "minimum version {} above maximum {}",
                self.min_version.as_str(),
                self.max_version.as_str()
            )));
        }

        let mut ctx_builder = SslContextBuilder::new(SslMethod::tls_client())?;

        // Trust is decided by fingerprint, not by the CA chain.
        ctx_builder.set_verify(SslVerifyMode::NONE);

        ctx_builder.set_min_proto_version(Some(self.min_version.to_openssl_version()))?;
        ctx_builder.set_max_proto_version(Some(self.max_version.to_openssl_version()))?;

        Ok(TlsConfig {
            ctx: ctx_builder.build(),
            min_version: self.min_version,
            max_version: self.max_version,
        })
    }
}
