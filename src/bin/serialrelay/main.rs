//! SerialRelay entrypoint: watches for the serial controller and relays its button
//! presses to the media player.
//!
//! # Architecture
//!
//! - Watchdog thread: periodic device lookup, open, and liveness check
//! - Reader thread: one per open port, forwards raw data
//! - Consumer thread: decodes data and launches the mapped commands
//! - Main thread: prints bridge events until the process is stopped

mod cli_utils;

use anyhow::{Context, Result};
use crossbeam_channel::bounded;
use serialrelay::config::AppConfig;
use serialrelay::dispatch::SystemLauncher;
use serialrelay::locator::SystemInventory;
use serialrelay::serial_session::SystemTransport;
use serialrelay::{
    init_logging, init_tracing, install_panic_hook, log_debug, log_file_path,
    Bridge, BridgeOptions, BridgeRuntime,
};
use std::sync::Arc;

use crate::cli_utils::{format_event, list_devices, now_secs};

/// Max pending bridge events before the runtime waits on the printer.
const EVENT_CHANNEL_CAPACITY: usize = 256;

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    if config.list_devices {
        return list_devices(config.json);
    }

    init_logging(&config);
    init_tracing(&config);
    install_panic_hook();
    log_debug("=== SerialRelay Started ===");
    log_debug(&format!("Log file: {:?}", log_file_path()));
    if let Some(path) = config.trace_log_path() {
        log_debug(&format!("Trace file: {path:?}"));
    }

    let profile = config.dispatch_profile()?;
    let identity = config.device_identity();
    if !config.quiet {
        println!(
            "Watching for {identity}; profile '{}' ({} commands) -> {}",
            profile.name(),
            profile.len(),
            profile.target().display()
        );
    }

    let (events_tx, events_rx) = bounded(EVENT_CHANNEL_CAPACITY);
    let bridge = Arc::new(Bridge::new(BridgeOptions {
        identity,
        inventory: Box::new(SystemInventory),
        transport: Arc::new(SystemTransport),
        serial: config.serial_config(),
        framing: config.framing,
        profile,
        launcher: Box::new(SystemLauncher),
        events: events_tx,
    }));
    let runtime = BridgeRuntime::start(bridge, config.watchdog_interval())
        .context("failed to start bridge threads")?;

    for event in events_rx.iter() {
        if !config.quiet {
            println!("{}", format_event(&event, now_secs()));
        }
    }

    runtime.shutdown();
    log_debug("=== SerialRelay Stopped ===");
    Ok(())
}
