//! Body decoding
//!
//! Text bodies are decoded from their declared charset; everything else is
//! passed through untouched.

use super::{Error, Result, GEMTEXT_MIME};
use bytes::Bytes;
use encoding_rs::Encoding;

/// Decoded response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// `text/gemini`, ready for conversion
    Gemtext(String),
    /// Any other `text/*` type
    Text { mime: String, text: String },
    /// Non-text payload, bytes unchanged
    Binary { mime: String, data: Bytes },
}

impl Body {
    /// MIME type the body was declared with
    pub fn mime(&self) -> &str {
        match self {
            Body::Gemtext(_) => GEMTEXT_MIME,
            Body::Text { mime, .. } | Body::Binary { mime, .. } => mime,
        }
    }
}

/// Decode body bytes according to the classified MIME type and encoding
pub fn decode(mime: &str, encoding: &'static Encoding, data: Bytes) -> Result<Body> {
    if !mime.starts_with("text/") {
        return Ok(Body::Binary {
            mime: mime.to_string(),
            data,
        });
    }

    let text = decode_text(encoding, &data)?;

    if mime == GEMTEXT_MIME {
        Ok(Body::Gemtext(text))
    } else {
        Ok(Body::Text {
            mime: mime.to_string(),
            text,
        })
    }
}

fn decode_text(encoding: &'static Encoding, data: &[u8]) -> Result<String> {
    // Drop a BOM only when it agrees with the declared encoding
    let data = match Encoding::for_bom(data) {
        Some((bom_encoding, len)) if bom_encoding == encoding => &data[len..],
        _ => data,
    };

    encoding
        .decode_without_bom_handling_and_without_replacement(data)
        .map(|text| text.into_owned())
        .ok_or_else(|| Error::Decoding {
            encoding: encoding.name().to_string(),
        })
}
