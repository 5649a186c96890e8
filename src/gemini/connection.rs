//! Connection manager
//!
//! A connection is an explicit state machine fed by stream events:
//!
//! ```text
//! Connecting --TlsEstablished--> Receiving(buf) --BytesAvailable--> Receiving(buf')
//!                                     |
//!                                     +--EndOfStream--> Closed(Ok(bytes))
//! any state --Failed--> Closed(Err)
//! ```
//!
//! The event loop runs on the worker thread that owns the connection, so
//! events are applied one at a time. There is no length header in Gemini:
//! the response ends when the server closes the stream.

use super::request::Request;
use super::session::SessionOps;
use super::store::FingerprintStore;
use super::tls::TlsConfig;
use super::{Error, Result};
use bytes::{Bytes, BytesMut};
use openssl::ssl::ErrorCode;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

/// Events delivered by the transport
#[derive(Debug)]
pub enum StreamEvent {
    /// Handshake done; fingerprint of the peer's first certificate
    TlsEstablished { fingerprint: Option<String> },
    BytesAvailable(Bytes),
    EndOfStream,
    Failed(Error),
}

/// Connection state
#[derive(Debug)]
pub enum ConnectionState {
    Connecting,
    Receiving(BytesMut),
    Closed(Result<Bytes>),
}

impl ConnectionState {
    /// Apply one event
    ///
    /// Events that make no sense in the current state leave it unchanged.
    /// A failure drops whatever was received so far.
    pub fn on_event(self, event: StreamEvent) -> ConnectionState {
        match (self, event) {
            (ConnectionState::Closed(result), _) => ConnectionState::Closed(result),
            (_, StreamEvent::Failed(e)) => ConnectionState::Closed(Err(e)),
            (ConnectionState::Connecting, StreamEvent::TlsEstablished { .. }) => {
                ConnectionState::Receiving(BytesMut::new())
            }
            (ConnectionState::Receiving(mut buf), StreamEvent::BytesAvailable(data)) => {
                buf.extend_from_slice(&data);
                ConnectionState::Receiving(buf)
            }
            (ConnectionState::Receiving(buf), StreamEvent::EndOfStream) => {
                ConnectionState::Closed(Ok(buf.freeze()))
            }
            (ConnectionState::Connecting, StreamEvent::EndOfStream) => {
                ConnectionState::Closed(Err(Error::Transport(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended before handshake",
                ))))
            }
            (state, _) => state,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed(_))
    }
}

/// Where a connection registers its socket so it can be closed from outside
pub trait SocketRegistry {
    /// Hand over a clone of the socket; returns false if the fetch was
    /// already stopped and the connection should give up
    fn register(&self, socket: TcpStream) -> bool;

    /// Whether a stop was requested
    fn is_stopped(&self) -> bool;
}

/// Registry for connections nobody can stop
#[derive(Debug, Default)]
pub struct Unstoppable;

impl SocketRegistry for Unstoppable {
    fn register(&self, _socket: TcpStream) -> bool {
        true
    }

    fn is_stopped(&self) -> bool {
        false
    }
}

/// A single Gemini connection
pub struct Connection {
    request: Request,
    store: Arc<FingerprintStore>,
    state: ConnectionState,
    read_chunk_size: usize,
    poll_interval: Duration,
    fingerprint_recorded: bool,
}

impl Connection {
    /// Create a connection for a request
    pub fn new(request: Request, store: Arc<FingerprintStore>) -> Self {
        Connection {
            request,
            store,
            state: ConnectionState::Connecting,
            read_chunk_size: 16 * 1024,
            poll_interval: Duration::from_millis(100),
            fingerprint_recorded: false,
        }
    }

    /// Size of each socket read
    pub fn set_read_chunk_size(&mut self, size: usize) {
        self.read_chunk_size = size.max(1);
    }

    /// How often the loop wakes to check for a stop request
    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Apply an event, performing its side effects
    pub fn handle(&mut self, event: StreamEvent) {
        if let StreamEvent::TlsEstablished {
            fingerprint: Some(ref fp),
        } = event
        {
            if matches!(self.state, ConnectionState::Connecting) && !self.fingerprint_recorded {
                log::debug!(
                    "{}: certificate fingerprint {}",
                    self.request.domain(),
                    fp.replace('\n', ":")
                );
                self.store.put(self.request.domain(), fp.clone());
                self.fingerprint_recorded = true;
            }
        }

        let state = std::mem::replace(&mut self.state, ConnectionState::Connecting);
        self.state = state.on_event(event);
    }

    /// Connect, handshake and receive the full response
    pub fn run(&mut self, tls: &TlsConfig, registry: &dyn SocketRegistry) -> Result<Bytes> {
        let host = self.request.host().to_string();
        let port = self.request.port();

        let stream = match connect_tcp(self.request.domain(), port) {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("{}:{}: connect failed: {}", host, port, e);
                self.handle(StreamEvent::Failed(e.into()));
                return self.take_result();
            }
        };
        log::debug!("{}:{}: connected", host, port);

        let registered = match stream.try_clone() {
            Ok(clone) => registry.register(clone),
            Err(e) => {
                log::warn!("{}:{}: cannot register socket for stop: {}", host, port, e);
                self.handle(StreamEvent::Failed(e.into()));
                return self.take_result();
            }
        };
        if !registered {
            self.handle(StreamEvent::Failed(Error::Cancelled));
            return self.take_result();
        }

        let mut session = match tls.connect(stream, self.request.domain()) {
            Ok(session) => session,
            Err(e) => {
                let error = if registry.is_stopped() {
                    Error::Cancelled
                } else {
                    log::warn!("{}:{}: TLS handshake failed: {}", host, port, e);
                    e.into()
                };
                self.handle(StreamEvent::Failed(error));
                return self.take_result();
            }
        };
        log::debug!("{}:{}: {} established", host, port, session.version());

        let result = self.drive(&mut session, registry);
        let _ = session.close();
        result
    }

    /// Run the event loop over an established session
    pub fn drive<S: SessionOps>(
        &mut self,
        session: &mut S,
        registry: &dyn SocketRegistry,
    ) -> Result<Bytes> {
        self.handle(StreamEvent::TlsEstablished {
            fingerprint: session.peer_fingerprint(),
        });

        if let Err(e) = session.write_all(&self.request.to_wire()) {
            self.fail(e, registry);
            return self.take_result();
        }

        let mut buf = vec![0u8; self.read_chunk_size];

        while !self.state.is_closed() {
            if registry.is_stopped() {
                self.handle(StreamEvent::Failed(Error::Cancelled));
                break;
            }

            match session.poll(Some(self.poll_interval)) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    self.fail(e, registry);
                    break;
                }
            }

            match session.read(&mut buf) {
                Ok(0) if registry.is_stopped() => {
                    self.handle(StreamEvent::Failed(Error::Cancelled))
                }
                Ok(0) => {
                    log::debug!("{}: end of stream", self.request.domain());
                    self.handle(StreamEvent::EndOfStream);
                }
                Ok(n) => {
                    let data = Bytes::copy_from_slice(&buf[..n]);
                    self.handle(StreamEvent::BytesAvailable(data));
                }
                Err(e) if is_retryable(&e) => {}
                Err(e) if is_soft_eof(&e) && !registry.is_stopped() => {
                    log::debug!("{}: peer closed without close_notify", self.request.domain());
                    self.handle(StreamEvent::EndOfStream);
                }
                Err(e) => self.fail(e, registry),
            }
        }

        self.take_result()
    }

    fn fail(&mut self, e: io::Error, registry: &dyn SocketRegistry) {
        let error = if registry.is_stopped() {
            Error::Cancelled
        } else {
            log::warn!("{}: read failed: {}", self.request.domain(), e);
            Error::Transport(e)
        };
        self.handle(StreamEvent::Failed(error));
    }

    fn take_result(&mut self) -> Result<Bytes> {
        match std::mem::replace(&mut self.state, ConnectionState::Connecting) {
            ConnectionState::Closed(result) => {
                self.state = ConnectionState::Closed(Err(Error::Cancelled));
                result
            }
            other => {
                self.state = other;
                Err(Error::Protocol("connection still open".to_string()))
            }
        }
    }
}

/// `SSL_R_UNEXPECTED_EOF_WHILE_READING` (OpenSSL 3)
const SSL_REASON_UNEXPECTED_EOF: libc::c_int = 294;

fn is_retryable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// TCP close without close_notify, which still means "the server is done"
///
/// A reset is not one of these: it can cut a response short.
fn is_soft_eof(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        return true;
    }

    let ssl_error = match e
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<openssl::ssl::Error>())
    {
        Some(ssl_error) => ssl_error,
        None => return false,
    };

    ssl_error.code() == ErrorCode::SSL
        && ssl_error.ssl_error().is_some_and(|stack| {
            stack
                .errors()
                .iter()
                .any(|err| err.reason_code() == SSL_REASON_UNEXPECTED_EOF)
        })
}

/// Resolve and connect, trying each address in turn
fn connect_tcp(host: &str, port: u16) -> io::Result<TcpStream> {
    let mut last_err = None;

    for addr in (host, port).to_socket_addrs()? {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_nodelay(true)?;
        match socket.connect(&SockAddr::from(addr)) {
            Ok(()) => return Ok(socket.into()),
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, format!("no addresses for {}", host))
    }))
}
