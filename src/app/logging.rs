use crate::config::AppConfig;
use std::{
    env, fs,
    io::{self, Write},
    panic,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard, OnceLock,
    },
    time::{SystemTime, UNIX_EPOCH},
};

const LOG_MAX_BYTES: u64 = 5 * 1024 * 1024;
const CRASH_LOG_MAX_BYTES: u64 = 256 * 1024;
static LOG_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_CONTENT_ENABLED: AtomicBool = AtomicBool::new(false);
static DEBUG_LOG: OnceLock<Mutex<Option<CappedLog>>> = OnceLock::new();
static PANIC_HOOK_INSTALLED: OnceLock<()> = OnceLock::new();

/// Path to the temp log file we rotate between runs.
pub fn log_file_path() -> PathBuf {
    env::var("SERIALRELAY_LOG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("serialrelay.log"))
}

/// Path to the crash log file (metadata only).
pub fn crash_log_path() -> PathBuf {
    env::temp_dir().join("serialrelay_crash.log")
}

/// Append-only file that starts over once it would grow past `cap` bytes.
pub(super) struct CappedLog {
    path: PathBuf,
    file: fs::File,
    cap: u64,
    len: u64,
}

impl CappedLog {
    pub(super) fn open(path: PathBuf, cap: u64) -> io::Result<Self> {
        let len = fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
        let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file,
            cap,
            len,
        })
    }

    pub(super) fn append(&mut self, line: &str) {
        let incoming = line.len() as u64;
        if self.len.saturating_add(incoming) > self.cap {
            match fs::File::create(&self.path) {
                Ok(file) => {
                    self.file = file;
                    self.len = 0;
                }
                Err(_) => return,
            }
        }
        if self.file.write_all(line.as_bytes()).is_ok() {
            self.len = self.len.saturating_add(incoming);
        }
    }
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// Not `lock_or_recover`: its poison report would re-enter this lock.
fn debug_log() -> MutexGuard<'static, Option<CappedLog>> {
    DEBUG_LOG
        .get_or_init(|| Mutex::new(None))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn apply_logging_flags(enabled: bool, content_enabled: bool) {
    LOG_ENABLED.store(enabled, Ordering::Relaxed);
    LOG_CONTENT_ENABLED.store(enabled && content_enabled, Ordering::Relaxed);
    *debug_log() = enabled
        .then(|| CappedLog::open(log_file_path(), LOG_MAX_BYTES).ok())
        .flatten();
}

/// Configure logging based on CLI flags or environment.
pub fn init_logging(config: &AppConfig) {
    apply_logging_flags(config.logging_enabled(), config.log_content);
}

/// Append a timestamped line to the debug log when logging is enabled.
pub fn log_debug(msg: &str) {
    if !LOG_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    if let Some(log) = debug_log().as_mut() {
        log.append(&format!("[{}] {msg}\n", unix_secs()));
    }
}

/// Write logs that carry raw device text.
pub fn log_debug_content(msg: &str) {
    if !LOG_CONTENT_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    log_debug(msg);
}

/// Write a minimal crash log entry, omitting the payload unless content logging is on.
pub fn log_panic(info: &panic::PanicHookInfo<'_>) {
    // Crash entries follow the same opt-in as the debug log.
    if !LOG_ENABLED.load(Ordering::Relaxed) {
        return;
    }

    let location = info
        .location()
        .map(|loc| format!("{}:{}", loc.file(), loc.line()))
        .unwrap_or_else(|| "unknown".to_string());
    let payload = if !LOG_CONTENT_ENABLED.load(Ordering::Relaxed) {
        "payload omitted (log-content disabled)"
    } else if let Some(text) = info.payload().downcast_ref::<&str>() {
        *text
    } else if let Some(text) = info.payload().downcast_ref::<String>() {
        text.as_str()
    } else {
        "non-string payload"
    };
    let thread = std::thread::current();
    let line = format!(
        "[{}] serialrelay v{} panicked in '{}' at {location}: {payload}\n",
        unix_secs(),
        env!("CARGO_PKG_VERSION"),
        thread.name().unwrap_or("unnamed"),
    );
    if let Ok(mut log) = CappedLog::open(crash_log_path(), CRASH_LOG_MAX_BYTES) {
        log.append(&line);
    }
}

/// Chain the crash logger in front of the existing panic hook.
pub fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            log_panic(info);
            log_debug_content(&format!("panic: {info}"));
            previous(info);
        }));
    });
}

#[cfg(test)]
pub(crate) fn set_logging_for_tests(enabled: bool, content_enabled: bool) {
    apply_logging_flags(enabled, content_enabled);
}
