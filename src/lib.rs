//! gemfetch - Gemini protocol client
//!
//! This crate fetches `gemini://` resources over TLS, classifies the
//! response header, decodes the body and converts `text/gemini` markup
//! into a structured document that is handed to a host through a
//! response sink.

pub mod gemini;
