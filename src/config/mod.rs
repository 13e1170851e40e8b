//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::Parser;
use std::path::PathBuf;

use crate::decoder::FramingMode;
use crate::dispatch::BuiltinProfile;
use crate::serial_session::{Parity, StopBits};

pub use defaults::{
    DEFAULT_BAUD_RATE, DEFAULT_DEVICE_NAME, DEFAULT_OPEN_TIMEOUT_MS, DEFAULT_READ_TIMEOUT_MS,
    DEFAULT_TARGET, DEFAULT_WATCHDOG_INTERVAL_SECS, MAX_WATCHDOG_INTERVAL_SECS,
    MIN_WATCHDOG_INTERVAL_SECS, PORTS_CLASS_GUID,
};

/// CLI options for the serial relay. Validated values are safe to hand to the runtime.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "serialrelay",
    about = "SerialRelay: forwards button presses from a serial controller to a media player",
    author,
    version
)]
pub struct AppConfig {
    /// Exact device instance identifier to watch for
    #[arg(long = "hardware-id", env = "SERIALRELAY_HARDWARE_ID")]
    pub hardware_id: Option<String>,

    /// Device class GUID used together with --device-name
    #[arg(
        long = "device-class",
        default_value = PORTS_CLASS_GUID,
        conflicts_with = "hardware_id"
    )]
    pub device_class: String,

    /// Substring of the device display name
    #[arg(
        long = "device-name",
        default_value = DEFAULT_DEVICE_NAME,
        conflicts_with = "hardware_id"
    )]
    pub device_name: String,

    /// Seconds between connection watchdog checks
    #[arg(long = "interval-secs", default_value_t = DEFAULT_WATCHDOG_INTERVAL_SECS)]
    pub interval_secs: u64,

    /// Serial baud rate
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,

    /// Serial data bits (5-8)
    #[arg(long = "data-bits", default_value_t = 8)]
    pub data_bits: u8,

    /// Serial parity
    #[arg(long, value_enum, default_value_t = Parity::None)]
    pub parity: Parity,

    /// Serial stop bits
    #[arg(long = "stop-bits", value_enum, default_value_t = StopBits::One)]
    pub stop_bits: StopBits,

    /// How long a single serial read waits before polling again (milliseconds)
    #[arg(long = "read-timeout-ms", default_value_t = DEFAULT_READ_TIMEOUT_MS)]
    pub read_timeout_ms: u64,

    /// Give up on a port open that takes longer than this (milliseconds)
    #[arg(long = "open-timeout-ms", default_value_t = DEFAULT_OPEN_TIMEOUT_MS)]
    pub open_timeout_ms: u64,

    /// How incoming serial data is split into commands
    #[arg(long, value_enum, default_value_t = FramingMode::Line)]
    pub framing: FramingMode,

    /// Built-in command vocabulary
    #[arg(long, value_enum, default_value_t = BuiltinProfile::Transport)]
    pub profile: BuiltinProfile,

    /// YAML file describing a custom command vocabulary (overrides --profile)
    #[arg(long = "profile-file", value_name = "PATH")]
    pub profile_file: Option<PathBuf>,

    /// Executable that receives the mapped commands
    #[arg(long, env = "SERIALRELAY_TARGET", default_value = DEFAULT_TARGET)]
    pub target: PathBuf,

    /// Print detected serial devices and exit
    #[arg(long = "list-devices", default_value_t = false)]
    pub list_devices: bool,

    /// Emit --list-devices output as JSON
    #[arg(long, default_value_t = false, requires = "list_devices")]
    pub json: bool,

    /// Do not print connection and command events to stdout
    #[arg(long, short = 'q', default_value_t = false)]
    pub quiet: bool,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "SERIALRELAY_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "SERIALRELAY_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging raw device text (debug log only)
    #[arg(
        long = "log-content",
        env = "SERIALRELAY_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,
}

impl AppConfig {
    pub fn logging_enabled(&self) -> bool {
        self.logs && !self.no_logs
    }
}
