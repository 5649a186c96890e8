//! Response header classification
//!
//! A Gemini response starts with a single status line:
//!
//! ```text
//! <digit><digit> <meta>\r\n
//! ```
//!
//! The first digit picks the outcome; the meta text carries a MIME type,
//! a prompt, a redirect target or an error message depending on it.
//! Classification never fails: anything unparseable becomes `Failure`.

use encoding_rs::{Encoding, UTF_8};

/// Meta used when a success header carries none
const DEFAULT_META: &str = "text/gemini; charset=utf-8";

/// Classified response header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    /// Server asks for user input (1x)
    Input { prompt: String, sensitive: bool },
    /// Body follows (2x)
    Success {
        mime: String,
        encoding: &'static Encoding,
    },
    /// Resource moved (3x); not followed automatically
    Redirect { target: String, permanent: bool },
    /// Terminal error (4x, 5x, malformed or unknown header)
    Failure { message: String },
    /// Client certificate demanded (6x)
    CertificateRequired { message: String },
}

impl StatusOutcome {
    fn failure(message: impl Into<String>) -> Self {
        StatusOutcome::Failure {
            message: message.into(),
        }
    }
}

/// Find the next CRLF in a buffer
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Split a raw response into header text and body bytes
///
/// Returns `None` when there is no CRLF or the header is not UTF-8.
pub fn split_header(raw: &[u8]) -> Option<(&str, &[u8])> {
    let crlf_pos = find_crlf(raw)?;
    let header = std::str::from_utf8(&raw[..crlf_pos]).ok()?;
    Some((header, &raw[crlf_pos + 2..]))
}

/// Classify a full raw response, returning the outcome and the body remainder
pub fn classify_response(raw: &[u8]) -> (StatusOutcome, &[u8]) {
    match split_header(raw) {
        Some((header, body)) => (classify(header), body),
        None => (StatusOutcome::failure("invalid response"), &[]),
    }
}

/// Classify a status line (without its CRLF)
pub fn classify(header: &str) -> StatusOutcome {
    let (code, meta) = match header.split_once(' ') {
        Some((code, meta)) => (code, meta),
        None => (header, ""),
    };

    match code.chars().next() {
        Some('1') => StatusOutcome::Input {
            prompt: meta.to_string(),
            sensitive: code == "11",
        },
        Some('2') => parse_success(meta),
        Some('3') => {
            let target = meta.trim();
            if target.is_empty() {
                StatusOutcome::failure("invalid response")
            } else {
                StatusOutcome::Redirect {
                    target: target.to_string(),
                    permanent: code == "31",
                }
            }
        }
        Some('4') | Some('5') => StatusOutcome::failure(format!("error: {}", header)),
        Some('6') => StatusOutcome::CertificateRequired {
            message: header.to_string(),
        },
        _ => StatusOutcome::failure("unknown response code"),
    }
}

/// Parse `<mime>[; param=value]*` from a success header
fn parse_success(meta: &str) -> StatusOutcome {
    let meta = if meta.trim().is_empty() {
        DEFAULT_META
    } else {
        meta
    };

    let mime = meta
        .split(|c: char| c == ';' || c.is_whitespace())
        .find(|token| !token.is_empty())
        .unwrap_or_default()
        .to_string();

    let encoding = match charset_param(meta) {
        None => UTF_8,
        Some(label) => match Encoding::for_label(label.as_bytes()) {
            Some(encoding) => encoding,
            None => {
                return StatusOutcome::failure(format!("unsupported charset: {}", label));
            }
        },
    };

    StatusOutcome::Success { mime, encoding }
}

/// First `charset=` parameter value, unquoted
fn charset_param(meta: &str) -> Option<&str> {
    meta.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"'))
        } else {
            None
        }
    })
}
