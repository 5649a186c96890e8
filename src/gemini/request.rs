//! Gemini requests
//!
//! A request is a single absolute URL. It is parsed and validated once,
//! before a fetch starts, and never changes afterwards.

use super::{Error, Result, CRLF, DEFAULT_PORT, MAX_REQUEST_LEN};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

/// Characters left as-is in an input answer, matching `encodeURIComponent`
const INPUT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A validated `gemini://` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    url: Url,
    host: String,
    port: u16,
}

impl Request {
    /// Parse and validate an absolute Gemini URL
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input).map_err(|e| Error::InvalidUrl(format!("{}: {}", input, e)))?;
        Self::from_url(url)
    }

    /// Build a request from an already parsed URL
    pub fn from_url(url: Url) -> Result<Self> {
        if url.scheme() != "gemini" {
            return Err(Error::InvalidUrl(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::InvalidUrl(format!("missing host: {}", url)))?
            .to_string();

        if url.as_str().len() > MAX_REQUEST_LEN {
            return Err(Error::InvalidUrl(format!(
                "request exceeds {} bytes",
                MAX_REQUEST_LEN
            )));
        }

        let port = url.port().unwrap_or(DEFAULT_PORT);

        Ok(Request { url, host, port })
    }

    /// The absolute URL being fetched
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Host name or address literal
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Target port (1965 unless the URL names one)
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Domain used as the fingerprint store key
    ///
    /// IPv6 literals are reported without brackets.
    pub fn domain(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }

    /// Follow-up request answering an input prompt
    ///
    /// The whole query becomes the percent-encoded answer, replacing any
    /// query the prompting URL had.
    pub fn with_input(&self, answer: &str) -> Result<Self> {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.set_query(Some(&utf8_percent_encode(answer, INPUT_ENCODE_SET).to_string()));
        Self::from_url(url)
    }

    /// Request payload as sent on the wire
    pub fn to_wire(&self) -> Vec<u8> {
        format!("{}{}", self.url, CRLF).into_bytes()
    }
}
