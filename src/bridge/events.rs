use std::fmt;
use thiserror::Error;

use crate::decoder::CommandToken;
use crate::dispatch::{ExternalInvocation, LaunchError};
use crate::locator::DiscoveryFailure;
use crate::serial_session::{ConnectError, SessionId};

/// Every recoverable fault the bridge can hit. None of them stops the process.
#[derive(Debug, Error)]
pub enum BridgeFault {
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryFailure),
    #[error("connect failed: {0}")]
    Connect(#[from] ConnectError),
    #[error("transport lost on {port}: {reason}")]
    TransportLoss { port: String, reason: String },
    #[error("unrecognized command {token}")]
    UnrecognizedCommand { token: CommandToken },
    #[error("dispatch failed: {0}")]
    DispatchLaunch(#[from] LaunchError),
}

impl BridgeFault {
    /// Stable label used in logs and traces.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeFault::Discovery(_) => "discovery_failure",
            BridgeFault::Connect(_) => "connect_failure",
            BridgeFault::TransportLoss { .. } => "transport_loss",
            BridgeFault::UnrecognizedCommand { .. } => "unrecognized_command",
            BridgeFault::DispatchLaunch(_) => "dispatch_launch_failure",
        }
    }
}

/// State changes and outcomes published by the bridge.
#[derive(Debug)]
pub enum BridgeEvent {
    Connected {
        port: String,
        session: SessionId,
    },
    Disconnected {
        port: String,
    },
    Dispatched {
        token: CommandToken,
        label: String,
        invocation: ExternalInvocation,
    },
    /// Token known to the profile but mapped to no action.
    Ignored {
        token: CommandToken,
        label: String,
    },
    Fault(BridgeFault),
}

impl BridgeEvent {
    pub fn fault_kind(&self) -> Option<&'static str> {
        match self {
            BridgeEvent::Fault(fault) => Some(fault.kind()),
            _ => None,
        }
    }
}

impl From<BridgeFault> for BridgeEvent {
    fn from(fault: BridgeFault) -> Self {
        BridgeEvent::Fault(fault)
    }
}

impl fmt::Display for BridgeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeEvent::Connected { port, .. } => write!(f, "Connected to {port}"),
            BridgeEvent::Disconnected { port } => write!(f, "Disconnected from {port}"),
            BridgeEvent::Dispatched { token, label, .. } => write!(f, "{token}: {label}"),
            BridgeEvent::Ignored { token, label } => write!(f, "{token}: {label} (no action)"),
            BridgeEvent::Fault(fault) => write!(f, "[{}] {fault}", fault.kind()),
        }
    }
}
