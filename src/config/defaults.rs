/// Setup class GUID Windows assigns to serial "Ports (COM & LPT)" devices.
pub const PORTS_CLASS_GUID: &str = "{4d36e978-e325-11ce-bfc1-08002be10318}";

/// Display-name fragment of the CH340 USB serial bridge the controller ships with.
pub const DEFAULT_DEVICE_NAME: &str = "USB-SERIAL CH340";

pub const DEFAULT_WATCHDOG_INTERVAL_SECS: u64 = 30;
pub const MIN_WATCHDOG_INTERVAL_SECS: u64 = 1;
pub const MAX_WATCHDOG_INTERVAL_SECS: u64 = 3600;

pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const MIN_BAUD_RATE: u32 = 50;
pub const MAX_BAUD_RATE: u32 = 4_000_000;

pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;
pub const MIN_READ_TIMEOUT_MS: u64 = 10;
pub const MAX_READ_TIMEOUT_MS: u64 = 5_000;

pub const DEFAULT_OPEN_TIMEOUT_MS: u64 = 5_000;
pub const MIN_OPEN_TIMEOUT_MS: u64 = 100;
pub const MAX_OPEN_TIMEOUT_MS: u64 = 60_000;

/// Upper bound on device identity text; WMI instance ids stay well below this.
pub const MAX_IDENTITY_CHARS: usize = 512;

#[cfg(windows)]
pub const DEFAULT_TARGET: &str = r"C:\Program Files (x86)\foobar2000\foobar2000.exe";
#[cfg(not(windows))]
pub const DEFAULT_TARGET: &str = "foobar2000";
