//! Fetch lifecycle
//!
//! `Fetch::load` schedules a fetch on a dedicated worker thread and returns
//! at once. The worker owns the connection, the receive buffer and the sink;
//! results only ever reach the host through the sink.
//!
//! A fetch can be stopped from any thread. Stopping closes the socket the
//! first time and does nothing afterwards; the worker then reports
//! `Error::Cancelled` unless it had already finished.

use super::connection::{Connection, SocketRegistry};
use super::request::Request;
use super::sink::{self, ResponseSink};
use super::store::FingerprintStore;
use super::tls::{TlsConfig, TlsVersion};
use super::{Error, Result};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Fetch configuration
#[derive(Debug, Clone)]
pub struct FetchConfig {
    tls_min: TlsVersion,
    tls_max: TlsVersion,
    read_chunk_size: usize,
    poll_interval: Duration,
    store: Arc<FingerprintStore>,
}

impl FetchConfig {
    /// Create a new configuration builder
    pub fn builder() -> FetchConfigBuilder {
        FetchConfigBuilder::new()
    }

    /// Fingerprint store this fetch writes to
    pub fn store(&self) -> &Arc<FingerprintStore> {
        &self.store
    }

    fn tls_config(&self) -> Result<TlsConfig> {
        Ok(TlsConfig::client()
            .version_range(self.tls_min, self.tls_max)
            .build()?)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfigBuilder::new().build()
    }
}

/// Fetch configuration builder
#[derive(Debug, Clone)]
pub struct FetchConfigBuilder {
    config: FetchConfig,
}

impl FetchConfigBuilder {
    fn new() -> Self {
        FetchConfigBuilder {
            config: FetchConfig {
                tls_min: TlsVersion::Tls12,
                tls_max: TlsVersion::Tls13,
                read_chunk_size: 16 * 1024,
                poll_interval: Duration::from_millis(100),
                store: FingerprintStore::global(),
            },
        }
    }

    /// Set the negotiable TLS version range
    pub fn tls_versions(mut self, min: TlsVersion, max: TlsVersion) -> Self {
        self.config.tls_min = min;
        self.config.tls_max = max;
        self
    }

    /// Set the size of each socket read
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.config.read_chunk_size = size;
        self
    }

    /// Set how often the worker checks for a stop request
    ///
    /// This is not a timeout: a silent server keeps the worker waiting.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Record fingerprints in this store instead of the global one
    pub fn store(mut self, store: Arc<FingerprintStore>) -> Self {
        self.config.store = store;
        self
    }

    pub fn build(self) -> FetchConfig {
        self.config
    }
}

/// Entry point for starting fetches
pub struct Fetch;

impl Fetch {
    /// Start fetching `request` on a new worker, delivering to `sink`
    ///
    /// Returns as soon as the worker is scheduled. Fails only if the TLS
    /// context cannot be built or the thread cannot be spawned; in that case
    /// the sink is never called.
    pub fn load<S>(request: Request, sink: S, config: FetchConfig) -> Result<FetchHandle>
    where
        S: ResponseSink + 'static,
    {
        let tls = config.tls_config()?;
        let control = Arc::new(FetchControl::default());
        let worker_control = Arc::clone(&control);

        let worker = thread::Builder::new()
            .name(format!("gemini-fetch-{}", request.domain()))
            .spawn(move || run_worker(request, sink, tls, config, worker_control))?;

        Ok(FetchHandle {
            control,
            worker: Mutex::new(Some(worker)),
        })
    }
}

fn run_worker<S: ResponseSink>(
    request: Request,
    mut sink: S,
    tls: TlsConfig,
    config: FetchConfig,
    control: Arc<FetchControl>,
) {
    log::debug!("fetching {}", request.url());

    let mut connection = Connection::new(request.clone(), Arc::clone(&config.store));
    connection.set_read_chunk_size(config.read_chunk_size);
    connection.set_poll_interval(config.poll_interval);

    let result = connection.run(&tls, &*control);
    control.release_socket();

    match result {
        Ok(raw) => {
            log::info!("{}: received {} bytes", request.url(), raw.len());
            sink::deliver_raw(&request, raw, &mut sink);
        }
        Err(e) => {
            if !matches!(e, Error::Cancelled) {
                log::warn!("{}: {}", request.url(), e);
            }
            sink.fail(e);
        }
    }

    control.done.store(true, Ordering::SeqCst);
}

#[derive(Debug, Default)]
struct ControlState {
    stopped: bool,
    socket: Option<TcpStream>,
}

/// State shared between a fetch handle and its worker
#[derive(Debug, Default)]
struct FetchControl {
    state: Mutex<ControlState>,
    done: AtomicBool,
}

impl FetchControl {
    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns true for the call that actually stopped the fetch
    fn stop(&self) -> bool {
        let socket = {
            let mut state = self.lock();
            if state.stopped {
                return false;
            }
            state.stopped = true;
            state.socket.take()
        };

        if let Some(socket) = socket {
            log::debug!("stopping fetch, closing socket");
            let _ = socket.shutdown(Shutdown::Both);
        }
        true
    }

    fn release_socket(&self) {
        self.lock().socket = None;
    }
}

impl SocketRegistry for FetchControl {
    fn register(&self, socket: TcpStream) -> bool {
        let mut state = self.lock();
        if state.stopped {
            return false;
        }
        state.socket = Some(socket);
        true
    }

    fn is_stopped(&self) -> bool {
        self.lock().stopped
    }
}

/// Handle to an in-flight fetch
pub struct FetchHandle {
    control: Arc<FetchControl>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl FetchHandle {
    /// Stop the fetch
    ///
    /// Safe to call from any thread and any number of times. Returns true
    /// only for the call that closed the fetch.
    pub fn stop(&self) -> bool {
        self.control.stop()
    }

    /// Whether the fetch was stopped or has delivered its result
    pub fn is_done(&self) -> bool {
        self.control.done.load(Ordering::SeqCst) || self.control.is_stopped()
    }

    /// Wait for the worker to deliver its terminal signal
    pub fn join(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(worker) = worker {
            if worker.join().is_err() {
                log::warn!("fetch worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_stop_is_idempotent() {
        let control = FetchControl::default();
        assert!(control.stop());
        assert!(!control.stop());
        assert!(control.is_stopped());
    }

    #[test]
    fn test_stop_closes_registered_socket_once() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (mut server_side, _) = listener.accept().unwrap();

        let control = FetchControl::default();
        assert!(control.register(client.try_clone().unwrap()));

        assert!(control.stop());
        assert!(control.lock().socket.is_none());
        assert!(!control.stop());

        // The peer sees the shutdown as end of stream
        let mut buf = [0u8; 1];
        use std::io::Read;
        assert_eq!(server_side.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_register_after_stop_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();

        let control = FetchControl::default();
        control.stop();
        assert!(!control.register(client));
    }

    #[test]
    fn test_config_builder() {
        let store = Arc::new(FingerprintStore::new());
        let config = FetchConfig::builder()
            .tls_versions(TlsVersion::Tls13, TlsVersion::Tls13)
            .read_chunk_size(512)
            .poll_interval(Duration::from_millis(10))
            .store(Arc::clone(&store))
            .build();

        assert!(Arc::ptr_eq(config.store(), &store));
        assert_eq!(config.read_chunk_size, 512);
        assert!(config.tls_config().is_ok());
    }

    #[test]
    fn test_invalid_tls_range_fails_load() {
        struct NeverCalled;
        impl ResponseSink for NeverCalled {
            fn receive_metadata(&mut self, _: &str, _: &str) {
                panic!("sink called");
            }
            fn receive_bytes(&mut self, _: &[u8]) {
                panic!("sink called");
            }
            fn finish(&mut self) {
                panic!("sink called");
            }
            fn fail(&mut self, _: Error) {
                panic!("sink called");
            }
        }

        let config = FetchConfig::builder()
            .tls_versions(TlsVersion::Tls13, TlsVersion::Tls12)
            .build();
        let request = Request::parse("gemini://a.example/").unwrap();
        assert!(matches!(
            Fetch::load(request, NeverCalled, config),
            Err(Error::Tls(_))
        ));
    }
}
