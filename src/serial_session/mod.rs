//! Serial session lifecycle: open, receive, detect loss, close, release.
//!
//! Each open handle gets a reader thread that forwards arrivals over a channel to the
//! bridge's single consumer. Closing a handle stops and joins that thread, so no
//! arrival for the handle is produced after `close` returns.

mod reader;
mod transport;

use clap::ValueEnum;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::config::{DEFAULT_BAUD_RATE, DEFAULT_OPEN_TIMEOUT_MS, DEFAULT_READ_TIMEOUT_MS};
use crate::decoder::FramingMode;
use crate::log_debug;

use reader::{spawn_reader_thread, ReaderContext};
pub use transport::{SerialLink, SerialTransport, SystemTransport};

/// Identifies one open/close cycle of the session.
pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StopBits {
    #[default]
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

impl DataBits {
    pub fn from_count(bits: u8) -> Option<Self> {
        match bits {
            5 => Some(DataBits::Five),
            6 => Some(DataBits::Six),
            7 => Some(DataBits::Seven),
            8 => Some(DataBits::Eight),
            _ => None,
        }
    }
}

/// Line settings plus the timing bounds of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Poll interval of a single blocking read.
    pub read_timeout: Duration,
    /// Upper bound on one open attempt.
    pub open_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            open_timeout: Duration::from_millis(DEFAULT_OPEN_TIMEOUT_MS),
        }
    }
}

/// Data pushed from a reader thread to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrivalPayload {
    /// Raw bytes: one line in line framing, one read in burst framing.
    Chunk(Vec<u8>),
    /// The read loop hit an I/O fault; the handle is no longer usable.
    Lost(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arrival {
    pub session: SessionId,
    pub payload: ArrivalPayload,
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("session already open on {port}")]
    AlreadyOpen { port: String },
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: io::Error,
    },
    #[error("opening {port} did not finish within {timeout:?}")]
    TimedOut { port: String, timeout: Duration },
    #[error("failed to start reader for {port}: {source}")]
    Reader {
        port: String,
        #[source]
        source: io::Error,
    },
}

/// Live representation of an open serial connection.
pub struct ConnectionHandle {
    id: SessionId,
    port: String,
    open: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    reader: Option<thread::JoinHandle<()>>,
}

impl ConnectionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// Liveness probe: false once the reader saw a fault or the handle was closed.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Stop the reader, wait for it to release the port. Safe to call repeatedly.
    fn close(&mut self) {
        self.open.store(false, Ordering::SeqCst);
        self.stop.store(true, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                log_debug(&format!("serial reader for {} panicked", self.port));
            }
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Owns at most one live `ConnectionHandle`.
pub struct SessionManager {
    transport: Arc<dyn SerialTransport>,
    config: SerialConfig,
    framing: FramingMode,
    arrivals: Sender<Arrival>,
    handle: Option<ConnectionHandle>,
    next_id: SessionId,
}

impl SessionManager {
    pub fn new(
        transport: Arc<dyn SerialTransport>,
        config: SerialConfig,
        framing: FramingMode,
        arrivals: Sender<Arrival>,
    ) -> Self {
        Self {
            transport,
            config,
            framing,
            arrivals,
            handle: None,
            next_id: 1,
        }
    }

    /// Open `port` and start forwarding its data. Fails if a handle is already held.
    pub fn open(&mut self, port: &str) -> Result<&ConnectionHandle, ConnectError> {
        if let Some(existing) = &self.handle {
            return Err(ConnectError::AlreadyOpen {
                port: existing.port.clone(),
            });
        }

        let link = self.open_link(port)?;
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let open = Arc::new(AtomicBool::new(true));
        let stop = Arc::new(AtomicBool::new(false));
        let ctx = ReaderContext {
            session: id,
            port: port.to_string(),
            stop: Arc::clone(&stop),
            open: Arc::clone(&open),
            arrivals: self.arrivals.clone(),
        };
        // A failed spawn drops the link (and with it the port) inside the builder.
        let reader =
            spawn_reader_thread(link, self.framing, ctx).map_err(|source| ConnectError::Reader {
                port: port.to_string(),
                source,
            })?;

        log_debug(&format!("opened serial session {id} on {port}"));
        Ok(&*self.handle.insert(ConnectionHandle {
            id,
            port: port.to_string(),
            open,
            stop,
            reader: Some(reader),
        }))
    }

    /// Run the transport open on a helper thread so a hung driver call cannot stall
    /// the watchdog past `open_timeout`. A late success is dropped by the helper.
    fn open_link(&self, port: &str) -> Result<SerialLink, ConnectError> {
        let (tx, rx) = bounded(1);
        let transport = Arc::clone(&self.transport);
        let config = self.config.clone();
        let port_name = port.to_string();
        thread::Builder::new()
            .name(format!("serial-open-{port}"))
            .spawn(move || {
                let result = transport.open(&port_name, &config);
                if tx.send(result).is_err() {
                    log_debug(&format!(
                        "late open of {port_name} discarded after timeout"
                    ));
                }
            })
            .map_err(|source| ConnectError::Open {
                port: port.to_string(),
                source,
            })?;

        match rx.recv_timeout(self.config.open_timeout) {
            Ok(Ok(link)) => Ok(link),
            Ok(Err(source)) => Err(ConnectError::Open {
                port: port.to_string(),
                source,
            }),
            Err(RecvTimeoutError::Timeout) => Err(ConnectError::TimedOut {
                port: port.to_string(),
                timeout: self.config.open_timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(ConnectError::Open {
                port: port.to_string(),
                source: io::Error::other("open worker exited without a result"),
            }),
        }
    }

    /// True while a handle is held and its reader has not reported a fault.
    pub fn is_open(&self) -> bool {
        self.handle.as_ref().is_some_and(ConnectionHandle::is_open)
    }

    /// Release the current handle, returning its port. No-op when nothing is held.
    pub fn close(&mut self) -> Option<String> {
        let mut handle = self.handle.take()?;
        handle.close();
        log_debug(&format!(
            "closed serial session {} on {}",
            handle.id, handle.port
        ));
        Some(handle.port.clone())
    }

    pub fn current(&self) -> Option<&ConnectionHandle> {
        self.handle.as_ref()
    }

    /// Whether `session` names the handle currently held.
    pub fn is_current(&self, session: SessionId) -> bool {
        self.handle.as_ref().is_some_and(|handle| handle.id == session)
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.close();
    }
}
