//! Resolves the watched device identity to a connectable serial port name.
//!
//! The inventory is queried on every call; nothing is cached between watchdog ticks.

mod inventory;
mod port_name;

use std::fmt;
use thiserror::Error;

use crate::log_debug;

pub use inventory::{DeviceInventory, InventoryEntry, InventoryError, SystemInventory};
pub use port_name::extract_port_name;

/// Descriptor used to recognize the target peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceIdentity {
    /// Exact hardware/instance identifier.
    HardwareId(String),
    /// Setup class plus a fragment of the display name.
    ClassAndName {
        class_guid: String,
        name_fragment: String,
    },
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceIdentity::HardwareId(id) => write!(f, "hardware id {id}"),
            DeviceIdentity::ClassAndName {
                class_guid,
                name_fragment,
            } => write!(f, "'{name_fragment}' in class {class_guid}"),
        }
    }
}

/// Why a lookup produced no port.
#[derive(Debug, Error)]
pub enum DiscoveryFailure {
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error("no device matching {identity}")]
    NoMatch { identity: DeviceIdentity },
    #[error("device '{caption}' has no port reference in its name")]
    NoPortReference { caption: String },
}

pub struct DeviceLocator {
    inventory: Box<dyn DeviceInventory>,
}

impl DeviceLocator {
    pub fn new(inventory: Box<dyn DeviceInventory>) -> Self {
        Self { inventory }
    }

    /// Look up the port for `identity`, logging (not raising) any failure.
    pub fn locate(&self, identity: &DeviceIdentity) -> Option<String> {
        match self.try_locate(identity) {
            Ok(port) => Some(port),
            Err(err) => {
                log_debug(&format!("device lookup failed: {err}"));
                None
            }
        }
    }

    /// Look up the port for `identity`, reporting why nothing was found.
    pub fn try_locate(&self, identity: &DeviceIdentity) -> Result<String, DiscoveryFailure> {
        let entries = self.inventory.snapshot()?;
        let found = match identity {
            DeviceIdentity::HardwareId(id) => entries.iter().find(|entry| entry.device_id == *id),
            DeviceIdentity::ClassAndName {
                class_guid,
                name_fragment,
            } => entries.iter().find(|entry| {
                entry.class_guid.eq_ignore_ascii_case(class_guid)
                    && entry.caption.contains(name_fragment.as_str())
            }),
        };
        let entry = found.ok_or_else(|| DiscoveryFailure::NoMatch {
            identity: identity.clone(),
        })?;
        extract_port_name(&entry.caption).ok_or_else(|| DiscoveryFailure::NoPortReference {
            caption: entry.caption.clone(),
        })
    }

    /// Raw inventory snapshot, used by `--list-devices`.
    pub fn inventory_snapshot(&self) -> Result<Vec<InventoryEntry>, InventoryError> {
        self.inventory.snapshot()
    }
}
