mod app;
pub mod bridge;
pub mod config;
pub mod decoder;
pub mod dispatch;
pub mod locator;
mod lock;
pub mod serial_session;
mod telemetry;
#[cfg(test)]
mod testing;
pub mod watchdog;

pub use app::{
    crash_log_path, init_logging, install_panic_hook, log_debug, log_debug_content,
    log_file_path, log_panic,
};
pub use bridge::{Bridge, BridgeEvent, BridgeFault, BridgeOptions, BridgeRuntime, ConnectionState};
pub(crate) use lock::lock_or_recover;
pub use telemetry::init_tracing;
