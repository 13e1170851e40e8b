use serde::Serialize;
use serialport::{SerialPortInfo, SerialPortType};
use thiserror::Error;

use crate::config::PORTS_CLASS_GUID;

/// One hardware entry reported by the host device inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryEntry {
    /// Stable instance identifier, e.g. `USB\VID_1A86&PID_7523\5&2F1B3C&0&2`.
    pub device_id: String,
    /// Human-readable caption, e.g. `USB-SERIAL CH340 (COM3)`.
    pub caption: String,
    /// Setup class the device is registered under.
    pub class_guid: String,
}

impl InventoryEntry {
    pub fn new(
        device_id: impl Into<String>,
        caption: impl Into<String>,
        class_guid: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            caption: caption.into(),
            class_guid: class_guid.into(),
        }
    }
}

#[derive(Debug, Error)]
#[error("device inventory unavailable: {reason}")]
pub struct InventoryError {
    pub reason: String,
}

impl InventoryError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Source of the current set of healthy devices. Queried fresh on every lookup.
pub trait DeviceInventory: Send + Sync {
    fn snapshot(&self) -> Result<Vec<InventoryEntry>, InventoryError>;
}

/// Inventory backed by the operating system's serial port enumeration.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInventory;

impl DeviceInventory for SystemInventory {
    fn snapshot(&self) -> Result<Vec<InventoryEntry>, InventoryError> {
        let ports =
            serialport::available_ports().map_err(|err| InventoryError::new(err.to_string()))?;
        Ok(ports.iter().map(entry_from_port).collect())
    }
}

/// Describe an enumerated port the way the Windows device manager would.
pub(super) fn entry_from_port(info: &SerialPortInfo) -> InventoryEntry {
    let port = info.port_name.as_str();
    let (device_id, product) = match &info.port_type {
        SerialPortType::UsbPort(usb) => {
            let instance = usb.serial_number.as_deref().unwrap_or(port);
            (
                format!("USB\\VID_{:04X}&PID_{:04X}\\{instance}", usb.vid, usb.pid),
                usb.product
                    .clone()
                    .unwrap_or_else(|| "USB Serial Device".to_string()),
            )
        }
        SerialPortType::BluetoothPort => (
            format!("BTHENUM\\{port}"),
            "Standard Serial over Bluetooth link".to_string(),
        ),
        SerialPortType::PciPort => (
            format!("PCI\\{port}"),
            "PCI Serial Port".to_string(),
        ),
        SerialPortType::Unknown => (
            format!("ACPI\\{port}"),
            "Communications Port".to_string(),
        ),
    };
    // Windows product strings already carry the port reference, e.g. "USB-SERIAL CH340 (COM3)".
    let caption = if product.contains(port) {
        product
    } else {
        format!("{product} ({port})")
    };
    InventoryEntry::new(device_id, caption, PORTS_CLASS_GUID)
}
