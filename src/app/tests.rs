use super::logging::CappedLog;
use super::{
    crash_log_path, init_logging, log_debug, log_debug_content, log_file_path,
    set_logging_for_tests,
};
use crate::config::AppConfig;
use clap::Parser;
use std::env;
use std::sync::{Mutex, OnceLock};

static LOG_TEST_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn with_log_lock(action: impl FnOnce()) {
    let _guard = LOG_TEST_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    action();
    set_logging_for_tests(false, false);
}

fn clear_log_env() {
    env::remove_var("SERIALRELAY_LOGS");
    env::remove_var("SERIALRELAY_NO_LOGS");
    env::remove_var("SERIALRELAY_LOG_CONTENT");
}

#[test]
fn logging_disabled_by_default() {
    with_log_lock(|| {
        clear_log_env();
        let log_path = log_file_path();
        let _ = std::fs::remove_file(&log_path);
        let config = AppConfig::parse_from(["serialrelay-tests"]);
        init_logging(&config);
        log_debug("should-not-write");
        assert!(std::fs::metadata(&log_path).is_err());
    });
}

#[test]
fn logging_enabled_writes_log() {
    with_log_lock(|| {
        clear_log_env();
        let log_path = log_file_path();
        let _ = std::fs::remove_file(&log_path);
        let mut config = AppConfig::parse_from(["serialrelay-tests"]);
        config.logs = true;
        init_logging(&config);
        log_debug("log-enabled");
        let contents = std::fs::read_to_string(&log_path).expect("log file should be created");
        assert!(contents.contains("log-enabled"));
    });
}

#[test]
fn no_logs_overrides_logs() {
    with_log_lock(|| {
        clear_log_env();
        let log_path = log_file_path();
        let _ = std::fs::remove_file(&log_path);
        let config = AppConfig::parse_from(["serialrelay-tests", "--logs", "--no-logs"]);
        init_logging(&config);
        log_debug("suppressed");
        assert!(std::fs::metadata(&log_path).is_err());
    });
}

#[test]
fn log_content_requires_flag() {
    with_log_lock(|| {
        clear_log_env();
        let log_path = log_file_path();
        let _ = std::fs::remove_file(&log_path);
        let mut config = AppConfig::parse_from(["serialrelay-tests"]);
        config.logs = true;
        config.log_content = false;
        init_logging(&config);
        log_debug_content("PLAYPAUSE-secret");
        let contents = std::fs::read_to_string(&log_path).unwrap_or_default();
        assert!(
            !contents.contains("PLAYPAUSE-secret"),
            "device text should not be logged without --log-content"
        );
    });
}

#[test]
fn log_content_written_when_enabled() {
    with_log_lock(|| {
        let log_path = log_file_path();
        let _ = std::fs::remove_file(&log_path);
        set_logging_for_tests(true, true);
        log_debug_content("raw-line-NEXT");
        let contents = std::fs::read_to_string(&log_path).expect("log file should be created");
        assert!(contents.contains("raw-line-NEXT"));
    });
}

#[test]
fn crash_log_lives_in_temp_dir() {
    let path = crash_log_path();
    assert!(path.starts_with(env::temp_dir()));
    assert_eq!(
        path.file_name().and_then(|name| name.to_str()),
        Some("serialrelay_crash.log")
    );
}

#[test]
fn capped_log_starts_over_past_its_cap() {
    let path = env::temp_dir().join(format!("serialrelay_capped_{}.log", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let mut log = CappedLog::open(path.clone(), 16).expect("open capped log");
    log.append("0123456789\n");
    log.append("abcdefghij\n");
    let contents = std::fs::read_to_string(&path).expect("read capped log");
    assert_eq!(contents, "abcdefghij\n");

    drop(log);
    let mut reopened = CappedLog::open(path.clone(), 16).expect("reopen capped log");
    reopened.append("xyz\n");
    let contents = std::fs::read_to_string(&path).expect("read capped log");
    assert_eq!(contents, "abcdefghij\nxyz\n");
    let _ = std::fs::remove_file(&path);
}
