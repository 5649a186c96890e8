//! Response sink interface
//!
//! The host implements `ResponseSink`. `deliver` is the only place that
//! talks to it on the success path and guarantees that metadata and bytes
//! come before exactly one `finish` or `fail`.

use super::body::{self, Body};
use super::gemtext;
use super::render;
use super::request::Request;
use super::status::{self, StatusOutcome};
use super::Error;
use bytes::Bytes;

/// Receiver of fetch results, implemented by the host
pub trait ResponseSink: Send {
    /// MIME type and encoding name of the bytes that follow
    fn receive_metadata(&mut self, mime: &str, encoding: &str);

    /// Payload; may be called more than once
    fn receive_bytes(&mut self, data: &[u8]);

    /// The fetch completed successfully
    fn finish(&mut self);

    /// The fetch failed
    fn fail(&mut self, error: Error);
}

impl<S: ResponseSink + ?Sized> ResponseSink for Box<S> {
    fn receive_metadata(&mut self, mime: &str, encoding: &str) {
        (**self).receive_metadata(mime, encoding)
    }

    fn receive_bytes(&mut self, data: &[u8]) {
        (**self).receive_bytes(data)
    }

    fn finish(&mut self) {
        (**self).finish()
    }

    fn fail(&mut self, error: Error) {
        (**self).fail(error)
    }
}

/// Classify, decode and convert a complete raw response, then emit it
pub fn deliver_raw<S: ResponseSink + ?Sized>(request: &Request, raw: Bytes, sink: &mut S) {
    let (outcome, body) = status::classify_response(&raw);
    let body = raw.slice_ref(body);
    deliver(request, outcome, body, sink);
}

/// Emit a classified response to the sink
pub fn deliver<S: ResponseSink + ?Sized>(
    request: &Request,
    outcome: StatusOutcome,
    body: Bytes,
    sink: &mut S,
) {
    let url = request.url();

    match outcome {
        StatusOutcome::Success { mime, encoding } => match body::decode(&mime, encoding, body) {
            Ok(Body::Gemtext(text)) => {
                let doc = gemtext::convert(&text, url);
                send_html(sink, &render::to_html(&doc, url));
            }
            Ok(Body::Text { mime, text }) => {
                sink.receive_metadata(&mime, "utf-8");
                sink.receive_bytes(text.as_bytes());
                sink.finish();
            }
            Ok(Body::Binary { mime, data }) => {
                sink.receive_metadata(&mime, "");
                sink.receive_bytes(&data);
                sink.finish();
            }
            Err(e) => sink.fail(e),
        },
        StatusOutcome::Input { prompt, sensitive } => {
            send_html(sink, &render::input_page(url, &prompt, sensitive));
        }
        StatusOutcome::Redirect { target, .. } => {
            log::info!("{} redirects to {}", url, target);
            send_html(sink, &render::redirect_page(url, &target));
        }
        StatusOutcome::Failure { message } => sink.fail(Error::Protocol(message)),
        StatusOutcome::CertificateRequired { message } => {
            sink.fail(Error::CertificateRequired(message))
        }
    }
}

fn send_html<S: ResponseSink + ?Sized>(sink: &mut S, html: &str) {
    sink.receive_metadata("text/html", "utf-8");
    sink.receive_bytes(html.as_bytes());
    sink.finish();
}
