//! Periodic connection supervision.
//!
//! Each tick either confirms the held session is alive, releases a dead one, or tries
//! to find and open the device. A tick that starts while another is still running
//! does nothing, so at most one open attempt is ever in flight.


use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::bridge::{Bridge, BridgeFault, Probe};
use crate::log_debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick was still running.
    Skipped,
    StillConnected,
    /// The held session had died and was closed.
    Released { port: String },
    Connected { port: String },
    /// Discovery found nothing usable; retried next tick.
    NoDevice,
    ConnectFailed { port: String },
}

struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Watchdog {
    bridge: Arc<Bridge>,
    in_flight: AtomicBool,
}

impl Watchdog {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self {
            bridge,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Run one supervision step.
    pub fn tick(&self) -> TickOutcome {
        let Some(_in_flight) = InFlight::acquire(&self.in_flight) else {
            log_debug("watchdog tick skipped: previous tick still running");
            return TickOutcome::Skipped;
        };

        match self.bridge.probe() {
            Probe::Alive => return TickOutcome::StillConnected,
            Probe::Released { port } => return TickOutcome::Released { port },
            Probe::Vacant => {}
        }

        let port = match self.bridge.locate() {
            Ok(port) => port,
            Err(failure) => {
                self.bridge.report(BridgeFault::Discovery(failure));
                return TickOutcome::NoDevice;
            }
        };

        match self.bridge.connect(&port) {
            Ok(_) => TickOutcome::Connected { port },
            Err(err) => {
                self.bridge.report(BridgeFault::Connect(err));
                TickOutcome::ConnectFailed { port }
            }
        }
    }
}
