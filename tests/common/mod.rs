//! Shared helpers for integration tests: a loopback Gemini server with a
//! freshly generated self-signed certificate, and a sink that forwards
//! every call over a channel.

#![allow(dead_code)]

use gemfetch::gemini::{Error, ResponseSink};
use openssl::asn1::Asn1Time;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{SslAcceptor, SslMethod, SslStream};
use openssl::x509::{X509NameBuilder, X509};
use socket2::SockRef;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Self-signed certificate and key for `cn`
pub fn self_signed(cn: &str) -> (X509, PKey<Private>) {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, cn).unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    (builder.build(), key)
}

/// How the server ends the connection after writing its response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Close {
    /// TLS close_notify, then TCP close
    Clean,
    /// TCP close without close_notify
    Abrupt,
    /// TCP reset shortly after writing
    Reset,
    /// Never respond; hold the connection open for the given time
    Hang(Duration),
}

/// A one-shot Gemini server on 127.0.0.1
pub struct TestServer {
    pub port: u16,
    pub cert: X509,
    /// Receives the request line the server read
    pub requests: mpsc::Receiver<String>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("gemini://127.0.0.1:{}{}", self.port, path)
    }
}

/// Spawn a server that answers one request with `response`
pub fn spawn_server(response: &'static [u8], close: Close) -> TestServer {
    let (cert, key) = self_signed("localhost");

    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    acceptor.set_private_key(&key).unwrap();
    acceptor.set_certificate(&cert).unwrap();
    acceptor.check_private_key().unwrap();
    let acceptor = acceptor.build();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let (tcp_stream, _) = listener.accept().unwrap();
        let mut stream = match acceptor.accept(tcp_stream) {
            Ok(stream) => stream,
            Err(_) => return,
        };

        let request = read_request(&mut stream);
        let _ = tx.send(request);

        match close {
            Close::Clean => {
                stream.write_all(response).unwrap();
                let _ = stream.shutdown();
            }
            Close::Abrupt => {
                stream.write_all(response).unwrap();
                stream.flush().unwrap();
                let _ = stream.get_mut().shutdown(std::net::Shutdown::Both);
            }
            Close::Reset => {
                stream.write_all(response).unwrap();
                stream.flush().unwrap();
                thread::sleep(Duration::from_millis(50));
                let _ = SockRef::from(stream.get_ref()).set_linger(Some(Duration::ZERO));
                drop(stream);
            }
            Close::Hang(duration) => thread::sleep(duration),
        }
    });

    TestServer {
        port,
        cert,
        requests: rx,
    }
}

fn read_request(stream: &mut SslStream<TcpStream>) -> String {
    let mut request = Vec::new();
    let mut buf = [0u8; 256];

    while !request.ends_with(b"\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }

    String::from_utf8_lossy(&request).into_owned()
}

/// Everything a sink can be told
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Metadata(String, String),
    Bytes(Vec<u8>),
    Finish,
    Fail(String),
}

/// Sink forwarding calls to a channel
pub struct ChannelSink(pub mpsc::Sender<SinkEvent>);

impl ResponseSink for ChannelSink {
    fn receive_metadata(&mut self, mime: &str, encoding: &str) {
        let _ = self.0.send(SinkEvent::Metadata(mime.to_string(), encoding.to_string()));
    }

    fn receive_bytes(&mut self, data: &[u8]) {
        let _ = self.0.send(SinkEvent::Bytes(data.to_vec()));
    }

    fn finish(&mut self) {
        let _ = self.0.send(SinkEvent::Finish);
    }

    fn fail(&mut self, error: Error) {
        let _ = self.0.send(SinkEvent::Fail(error.to_string()));
    }
}

pub fn channel_sink() -> (ChannelSink, mpsc::Receiver<SinkEvent>) {
    let (tx, rx) = mpsc::channel();
    (ChannelSink(tx), rx)
}

/// Collect events up to and including the terminal one
pub fn collect(rx: &mpsc::Receiver<SinkEvent>) -> Vec<SinkEvent> {
    let mut events = Vec::new();
    loop {
        let event = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("sink never received a terminal call");
        let terminal = matches!(event, SinkEvent::Finish | SinkEvent::Fail(_));
        events.push(event);
        if terminal {
            return events;
        }
    }
}

/// Concatenated payload of a collected event list
pub fn payload(events: &[SinkEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            SinkEvent::Bytes(b) => Some(b.as_slice()),
            _ => None,
        })
        .flatten()
        .copied()
        .collect()
}
