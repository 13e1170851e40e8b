use anyhow::{Context, Result};
use serialrelay::config::PORTS_CLASS_GUID;
use serialrelay::locator::{extract_port_name, DeviceLocator, InventoryEntry, SystemInventory};
use serialrelay::BridgeEvent;
use std::time::{SystemTime, UNIX_EPOCH};

/// Parse `SERIALRELAY_TEST_DEVICES` (comma-separated captions) into inventory entries.
pub(crate) fn parse_test_devices(raw: &str) -> Vec<InventoryEntry> {
    raw.split(',')
        .map(str::trim)
        .filter(|caption| !caption.is_empty())
        .enumerate()
        .map(|(index, caption)| {
            InventoryEntry::new(format!("TEST\\DEVICE\\{index}"), caption, PORTS_CLASS_GUID)
        })
        .collect()
}

pub(crate) fn list_devices(json: bool) -> Result<()> {
    // Support SERIALRELAY_TEST_DEVICES for testing
    let entries = match std::env::var("SERIALRELAY_TEST_DEVICES") {
        Ok(raw) => parse_test_devices(&raw),
        Err(_) => DeviceLocator::new(Box::new(SystemInventory))
            .inventory_snapshot()
            .unwrap_or_else(|err| {
                eprintln!("Failed to list serial devices: {err}");
                Vec::new()
            }),
    };

    if json {
        let rendered =
            serde_json::to_string_pretty(&entries).context("failed to render device list")?;
        println!("{rendered}");
        return Ok(());
    }

    if entries.is_empty() {
        println!("No serial devices detected.");
    } else {
        println!("Available serial devices:");
        for entry in entries {
            let port = extract_port_name(&entry.caption).unwrap_or_else(|| "-".to_string());
            println!("  - {} [{}] {}", entry.caption, port, entry.device_id);
        }
    }
    Ok(())
}

pub(crate) fn format_event(event: &BridgeEvent, unix_secs: u64) -> String {
    let marker = if event.fault_kind().is_some() { "!" } else { "*" };
    format!("[{unix_secs}] {marker} {event}")
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
