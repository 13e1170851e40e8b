//! Owned session context tying the locator, session manager, decoder and dispatcher
//! together.
//!
//! The session manager and the decoder's pending tail live behind one mutex, so a
//! watchdog tick that closes the handle can never interleave with an arrival being
//! decoded for it. Dispatch happens after that lock is released.

mod events;
mod runtime;

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::decoder::{CommandToken, FrameDecoder, FramingMode};
use crate::dispatch::{CommandDispatcher, DispatchOutcome, DispatchProfile, ProcessLauncher};
use crate::locator::{DeviceIdentity, DeviceInventory, DeviceLocator, DiscoveryFailure};
use crate::serial_session::{
    Arrival, ArrivalPayload, ConnectError, SerialConfig, SerialTransport, SessionId,
    SessionManager,
};
use crate::{lock_or_recover, log_debug, log_debug_content};

pub use events::{BridgeEvent, BridgeFault};
pub use runtime::BridgeRuntime;

const ARRIVAL_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Everything a bridge needs; collaborators are injected so tests can fake them.
pub struct BridgeOptions {
    pub identity: DeviceIdentity,
    pub inventory: Box<dyn DeviceInventory>,
    pub transport: Arc<dyn SerialTransport>,
    pub serial: SerialConfig,
    pub framing: FramingMode,
    pub profile: DispatchProfile,
    pub launcher: Box<dyn ProcessLauncher>,
    pub events: Sender<BridgeEvent>,
}

struct SessionState {
    session: SessionManager,
    decoder: FrameDecoder,
}

/// Result of the watchdog's liveness check.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Probe {
    Vacant,
    Alive,
    Released { port: String },
}

pub struct Bridge {
    identity: DeviceIdentity,
    locator: DeviceLocator,
    state: Mutex<SessionState>,
    dispatcher: CommandDispatcher,
    events: Sender<BridgeEvent>,
    arrivals: Receiver<Arrival>,
}

impl Bridge {
    pub fn new(options: BridgeOptions) -> Self {
        let BridgeOptions {
            identity,
            inventory,
            transport,
            serial,
            framing,
            profile,
            launcher,
            events,
        } = options;
        let (arrivals_tx, arrivals) = bounded(ARRIVAL_QUEUE_CAPACITY);
        Self {
            identity,
            locator: DeviceLocator::new(inventory),
            state: Mutex::new(SessionState {
                session: SessionManager::new(transport, serial, framing, arrivals_tx),
                decoder: FrameDecoder::new(framing),
            }),
            dispatcher: CommandDispatcher::new(profile, launcher),
            events,
            arrivals,
        }
    }

    pub fn profile(&self) -> &DispatchProfile {
        self.dispatcher.profile()
    }

    /// Receiving end of the reader threads' arrival channel.
    pub fn arrivals(&self) -> Receiver<Arrival> {
        self.arrivals.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        let state = lock_or_recover(&self.state, "Bridge::connection_state");
        if state.session.current().is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Consume one arrival from a reader thread.
    ///
    /// Arrivals from a session that is no longer current are dropped.
    pub fn handle_arrival(&self, arrival: Arrival) {
        match arrival.payload {
            ArrivalPayload::Chunk(bytes) => {
                let tokens = {
                    let mut state = lock_or_recover(&self.state, "Bridge::handle_arrival");
                    if !state.session.is_current(arrival.session) {
                        log_debug(&format!("dropping data from closed session {}", arrival.session));
                        return;
                    }
                    log_debug_content(&format!(
                        "decoding {:?}",
                        String::from_utf8_lossy(&bytes)
                    ));
                    state.decoder.decode(&bytes)
                };
                for token in tokens {
                    self.relay(&token);
                }
            }
            ArrivalPayload::Lost(reason) => self.release_lost(arrival.session, reason),
        }
    }

    fn release_lost(&self, session: SessionId, reason: String) {
        let port = {
            let mut state = lock_or_recover(&self.state, "Bridge::release_lost");
            if !state.session.is_current(session) {
                return;
            }
            state.decoder.reset();
            state.session.close()
        };
        if let Some(port) = port {
            self.report(BridgeFault::TransportLoss {
                port: port.clone(),
                reason,
            });
            self.report(BridgeEvent::Disconnected { port });
        }
    }

    fn relay(&self, token: &CommandToken) {
        let event = match self.dispatcher.relay(token) {
            DispatchOutcome::Launched {
                token,
                label,
                invocation,
            } => BridgeEvent::Dispatched {
                token,
                label,
                invocation,
            },
            DispatchOutcome::Ignored { token, label } => BridgeEvent::Ignored { token, label },
            DispatchOutcome::Unrecognized { token } => {
                BridgeFault::UnrecognizedCommand { token }.into()
            }
            DispatchOutcome::LaunchFailed { error, .. } => BridgeFault::DispatchLaunch(error).into(),
        };
        self.report(event);
    }

    /// Liveness check: release a handle whose transport is no longer open.
    pub(crate) fn probe(&self) -> Probe {
        let port = {
            let mut state = lock_or_recover(&self.state, "Bridge::probe");
            if state.session.current().is_none() {
                return Probe::Vacant;
            }
            if state.session.is_open() {
                return Probe::Alive;
            }
            state.decoder.reset();
            state.session.close()
        };
        match port {
            Some(port) => {
                self.report(BridgeFault::TransportLoss {
                    port: port.clone(),
                    reason: "port no longer open".to_string(),
                });
                self.report(BridgeEvent::Disconnected { port: port.clone() });
                Probe::Released { port }
            }
            None => Probe::Vacant,
        }
    }

    pub(crate) fn locate(&self) -> Result<String, DiscoveryFailure> {
        self.locator.try_locate(&self.identity)
    }

    /// Open `port` as the current session, discarding any stale decoder tail.
    pub(crate) fn connect(&self, port: &str) -> Result<SessionId, ConnectError> {
        let id = {
            let mut state = lock_or_recover(&self.state, "Bridge::connect");
            let id = state.session.open(port)?.id();
            state.decoder.reset();
            id
        };
        self.report(BridgeEvent::Connected {
            port: port.to_string(),
            session: id,
        });
        Ok(id)
    }

    /// Close the current session, if any. Used on shutdown.
    pub fn disconnect(&self) -> Option<String> {
        let port = {
            let mut state = lock_or_recover(&self.state, "Bridge::disconnect");
            state.decoder.reset();
            state.session.close()
        }?;
        self.report(BridgeEvent::Disconnected { port: port.clone() });
        Some(port)
    }

    /// Log, trace and publish one event. A closed event channel is not an error.
    pub(crate) fn report(&self, event: impl Into<BridgeEvent>) {
        let event = event.into();
        log_debug(&event.to_string());
        match &event {
            BridgeEvent::Fault(fault) => {
                tracing::warn!(kind = fault.kind(), error = %fault, "bridge fault");
            }
            BridgeEvent::Connected { port, session } => {
                tracing::info!(port = %port, session = *session, "connected");
            }
            BridgeEvent::Disconnected { port } => {
                tracing::info!(port = %port, "disconnected");
            }
            BridgeEvent::Dispatched {
                token, invocation, ..
            } => {
                tracing::info!(token = %token, command = %invocation, "dispatched");
            }
            BridgeEvent::Ignored { token, label } => {
                tracing::info!(token = %token, label = %label, "ignored");
            }
        }
        let _ = self.events.send(event);
    }
}
