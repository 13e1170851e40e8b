//! Channel-backed fakes for the inventory, serial transport and launcher seams.

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use std::io::{self, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::bridge::{Bridge, BridgeEvent, BridgeOptions};
use crate::config::{DEFAULT_DEVICE_NAME, PORTS_CLASS_GUID};
use crate::decoder::FramingMode;
use crate::dispatch::{
    BuiltinProfile, DispatchProfile, ExternalInvocation, LaunchError, ProcessLauncher,
};
use crate::locator::{DeviceIdentity, DeviceInventory, InventoryEntry, InventoryError};
use crate::lock_or_recover;
use crate::serial_session::{SerialConfig, SerialLink, SerialTransport};

pub(crate) const WAIT: Duration = Duration::from_secs(5);

pub(crate) fn ch340_entry(port: &str) -> InventoryEntry {
    InventoryEntry::new(
        format!("USB\\VID_1A86&PID_7523\\5&2F1B3C&0&{port}"),
        format!("USB-SERIAL CH340 ({port})"),
        PORTS_CLASS_GUID,
    )
}

pub(crate) const TARGET: &str = "/opt/player/player";

pub(crate) fn ch340_identity() -> DeviceIdentity {
    DeviceIdentity::ClassAndName {
        class_guid: PORTS_CLASS_GUID.to_string(),
        name_fragment: DEFAULT_DEVICE_NAME.to_string(),
    }
}

/// Fast timings so reader threads notice a close quickly.
pub(crate) fn quick_serial_config() -> SerialConfig {
    SerialConfig {
        read_timeout: Duration::from_millis(20),
        open_timeout: Duration::from_millis(500),
        ..SerialConfig::default()
    }
}

/// A bridge wired to fakes, plus the receiving end of its event channel.
pub(crate) struct Harness {
    pub(crate) bridge: Arc<Bridge>,
    pub(crate) events: Receiver<BridgeEvent>,
    pub(crate) inventory: ScriptedInventory,
    pub(crate) transport: FakeTransport,
    pub(crate) launcher: RecordingLauncher,
}

impl Harness {
    pub(crate) fn new(framing: FramingMode, profile: BuiltinProfile) -> Self {
        Self::with_profile(framing, DispatchProfile::builtin(profile, TARGET))
    }

    pub(crate) fn with_profile(framing: FramingMode, profile: DispatchProfile) -> Self {
        let inventory = ScriptedInventory::new();
        let transport = FakeTransport::new();
        let launcher = RecordingLauncher::new();
        let (events_tx, events) = unbounded();
        let bridge = Arc::new(Bridge::new(BridgeOptions {
            identity: ch340_identity(),
            inventory: Box::new(inventory.clone()),
            transport: Arc::new(transport.clone()),
            serial: quick_serial_config(),
            framing,
            profile,
            launcher: Box::new(launcher.clone()),
            events: events_tx,
        }));
        Self {
            bridge,
            events,
            inventory,
            transport,
            launcher,
        }
    }

    /// Feed every arrival queued so far through the bridge, as the consumer thread would.
    pub(crate) fn pump_arrivals(&self) {
        let arrivals = self.bridge.arrivals();
        while let Ok(arrival) = arrivals.recv_timeout(Duration::from_millis(200)) {
            self.bridge.handle_arrival(arrival);
        }
    }
}

/// Handshake for a snapshot parked inside the inventory.
pub(crate) struct InventoryHold {
    pub(crate) entered: Receiver<()>,
    pub(crate) release: Sender<()>,
}

struct Gate {
    entered: Sender<()>,
    release: Receiver<()>,
}

#[derive(Default)]
struct InventoryScript {
    entries: Mutex<Vec<InventoryEntry>>,
    failure: Mutex<Option<String>>,
    gate: Mutex<Option<Gate>>,
    queries: AtomicUsize,
}

#[derive(Clone, Default)]
pub(crate) struct ScriptedInventory {
    inner: Arc<InventoryScript>,
}

impl ScriptedInventory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_entries(entries: Vec<InventoryEntry>) -> Self {
        let inventory = Self::new();
        inventory.set_entries(entries);
        inventory
    }

    pub(crate) fn set_entries(&self, entries: Vec<InventoryEntry>) {
        *lock_or_recover(&self.inner.entries, "ScriptedInventory::set_entries") = entries;
    }

    pub(crate) fn fail_with(&self, reason: &str) {
        *lock_or_recover(&self.inner.failure, "ScriptedInventory::fail_with") =
            Some(reason.to_string());
    }

    pub(crate) fn queries(&self) -> usize {
        self.inner.queries.load(Ordering::SeqCst)
    }

    /// Park the next snapshot until `release` is signalled.
    pub(crate) fn hold(&self) -> InventoryHold {
        let (entered_tx, entered_rx) = bounded(1);
        let (release_tx, release_rx) = bounded(1);
        *lock_or_recover(&self.inner.gate, "ScriptedInventory::hold") = Some(Gate {
            entered: entered_tx,
            release: release_rx,
        });
        InventoryHold {
            entered: entered_rx,
            release: release_tx,
        }
    }
}

impl DeviceInventory for ScriptedInventory {
    fn snapshot(&self) -> Result<Vec<InventoryEntry>, InventoryError> {
        self.inner.queries.fetch_add(1, Ordering::SeqCst);
        let gate = lock_or_recover(&self.inner.gate, "ScriptedInventory::snapshot").take();
        if let Some(gate) = gate {
            let _ = gate.entered.send(());
            let _ = gate.release.recv_timeout(WAIT);
        }
        if let Some(reason) =
            lock_or_recover(&self.inner.failure, "ScriptedInventory::snapshot").clone()
        {
            return Err(InventoryError::new(reason));
        }
        Ok(lock_or_recover(&self.inner.entries, "ScriptedInventory::snapshot").clone())
    }
}

enum LinkEvent {
    Data(Vec<u8>),
    Fail(io::ErrorKind),
}

/// Drives the far end of the most recently opened fake link.
#[derive(Clone)]
pub(crate) struct LinkControl {
    tx: Sender<LinkEvent>,
}

impl LinkControl {
    pub(crate) fn send(&self, bytes: &[u8]) {
        let _ = self.tx.send(LinkEvent::Data(bytes.to_vec()));
    }

    /// Make the next read fail as a device unplug would.
    pub(crate) fn fail(&self, kind: io::ErrorKind) {
        let _ = self.tx.send(LinkEvent::Fail(kind));
    }
}

struct FakeLink {
    rx: Receiver<LinkEvent>,
    pending: Vec<u8>,
    poll: Duration,
    live: Arc<AtomicUsize>,
}

impl FakeLink {
    fn drain_pending(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        n
    }
}

impl Read for FakeLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.pending.is_empty() {
            return Ok(self.drain_pending(buf));
        }
        match self.rx.recv_timeout(self.poll) {
            Ok(LinkEvent::Data(bytes)) => {
                self.pending = bytes;
                Ok(self.drain_pending(buf))
            }
            Ok(LinkEvent::Fail(kind)) => Err(io::Error::new(kind, "device detached")),
            Err(RecvTimeoutError::Timeout) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "operation timed out",
            )),
            Err(RecvTimeoutError::Disconnected) => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "link control dropped",
            )),
        }
    }
}

impl Drop for FakeLink {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct TransportScript {
    failure: Mutex<Option<io::ErrorKind>>,
    open_delay: Mutex<Duration>,
    opens: AtomicUsize,
    live_links: Arc<AtomicUsize>,
    latest: Mutex<Option<LinkControl>>,
    ports: Mutex<Vec<String>>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeTransport {
    inner: Arc<TransportScript>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_with(&self, kind: io::ErrorKind) {
        *lock_or_recover(&self.inner.failure, "FakeTransport::fail_with") = Some(kind);
    }

    pub(crate) fn succeed(&self) {
        *lock_or_recover(&self.inner.failure, "FakeTransport::succeed") = None;
    }

    pub(crate) fn delay_open(&self, delay: Duration) {
        *lock_or_recover(&self.inner.open_delay, "FakeTransport::delay_open") = delay;
    }

    pub(crate) fn opens(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    /// Links opened and not yet dropped (ports still held).
    pub(crate) fn live_links(&self) -> usize {
        self.inner.live_links.load(Ordering::SeqCst)
    }

    pub(crate) fn opened_ports(&self) -> Vec<String> {
        lock_or_recover(&self.inner.ports, "FakeTransport::opened_ports").clone()
    }

    pub(crate) fn latest(&self) -> Option<LinkControl> {
        lock_or_recover(&self.inner.latest, "FakeTransport::latest").clone()
    }
}

impl SerialTransport for FakeTransport {
    fn open(&self, port: &str, config: &SerialConfig) -> io::Result<SerialLink> {
        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        lock_or_recover(&self.inner.ports, "FakeTransport::open").push(port.to_string());
        let delay = *lock_or_recover(&self.inner.open_delay, "FakeTransport::open");
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        if let Some(kind) = *lock_or_recover(&self.inner.failure, "FakeTransport::open") {
            return Err(io::Error::new(kind, format!("cannot open {port}")));
        }
        let (tx, rx) = unbounded();
        *lock_or_recover(&self.inner.latest, "FakeTransport::open") = Some(LinkControl { tx });
        self.inner.live_links.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeLink {
            rx,
            pending: Vec::new(),
            poll: config.read_timeout,
            live: Arc::clone(&self.inner.live_links),
        }))
    }
}

#[derive(Clone, Default)]
pub(crate) struct RecordingLauncher {
    launched: Arc<Mutex<Vec<ExternalInvocation>>>,
    fail: bool,
}

impl RecordingLauncher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records every attempt, then reports it as a failed spawn.
    pub(crate) fn failing() -> Self {
        Self {
            launched: Arc::default(),
            fail: true,
        }
    }

    pub(crate) fn launched(&self) -> Vec<ExternalInvocation> {
        lock_or_recover(&self.launched, "RecordingLauncher::launched").clone()
    }
}

impl ProcessLauncher for RecordingLauncher {
    fn launch(&self, invocation: &ExternalInvocation) -> Result<(), LaunchError> {
        lock_or_recover(&self.launched, "RecordingLauncher::launch").push(invocation.clone());
        if self.fail {
            return Err(LaunchError {
                program: invocation.program.display().to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "program not found"),
            });
        }
        Ok(())
    }
}

/// Wait for the first event matching `predicate`, discarding the others.
pub(crate) fn wait_for_event(
    events: &Receiver<BridgeEvent>,
    predicate: impl Fn(&BridgeEvent) -> bool,
) -> Option<BridgeEvent> {
    let deadline = Instant::now() + WAIT;
    loop {
        let remaining = deadline.checked_duration_since(Instant::now())?;
        match events.recv_timeout(remaining) {
            Ok(event) if predicate(&event) => return Some(event),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}

/// Events already queued, without waiting.
pub(crate) fn drain_events(events: &Receiver<BridgeEvent>) -> Vec<BridgeEvent> {
    events.try_iter().collect()
}

/// Poll `condition` until it holds or the wait budget runs out.
pub(crate) fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
