use super::defaults::{
    MAX_BAUD_RATE, MAX_IDENTITY_CHARS, MAX_OPEN_TIMEOUT_MS, MAX_READ_TIMEOUT_MS,
    MAX_WATCHDOG_INTERVAL_SECS, MIN_BAUD_RATE, MIN_OPEN_TIMEOUT_MS, MIN_READ_TIMEOUT_MS,
    MIN_WATCHDOG_INTERVAL_SECS,
};
use super::AppConfig;
use crate::dispatch::DispatchProfile;
use crate::locator::DeviceIdentity;
use crate::serial_session::{DataBits, SerialConfig};
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize identity text.
    pub fn validate(&mut self) -> Result<()> {
        if !(MIN_WATCHDOG_INTERVAL_SECS..=MAX_WATCHDOG_INTERVAL_SECS).contains(&self.interval_secs)
        {
            bail!(
                "--interval-secs must be between {MIN_WATCHDOG_INTERVAL_SECS} and {MAX_WATCHDOG_INTERVAL_SECS}, got {}",
                self.interval_secs
            );
        }
        if !(MIN_BAUD_RATE..=MAX_BAUD_RATE).contains(&self.baud) {
            bail!(
                "--baud must be between {MIN_BAUD_RATE} and {MAX_BAUD_RATE}, got {}",
                self.baud
            );
        }
        if DataBits::from_count(self.data_bits).is_none() {
            bail!("--data-bits must be between 5 and 8, got {}", self.data_bits);
        }
        if !(MIN_READ_TIMEOUT_MS..=MAX_READ_TIMEOUT_MS).contains(&self.read_timeout_ms) {
            bail!(
                "--read-timeout-ms must be between {MIN_READ_TIMEOUT_MS} and {MAX_READ_TIMEOUT_MS}, got {}",
                self.read_timeout_ms
            );
        }
        if !(MIN_OPEN_TIMEOUT_MS..=MAX_OPEN_TIMEOUT_MS).contains(&self.open_timeout_ms) {
            bail!(
                "--open-timeout-ms must be between {MIN_OPEN_TIMEOUT_MS} and {MAX_OPEN_TIMEOUT_MS}, got {}",
                self.open_timeout_ms
            );
        }

        if let Some(hardware_id) = &self.hardware_id {
            self.hardware_id = Some(sanitize_identity_text(hardware_id, "--hardware-id")?);
        }
        self.device_class = sanitize_identity_text(&self.device_class, "--device-class")?;
        self.device_name = sanitize_identity_text(&self.device_name, "--device-name")?;

        let target = self.target.to_string_lossy();
        if target.trim().is_empty() {
            bail!("--target cannot be empty");
        }
        if target.chars().any(char::is_control) {
            bail!("--target must not contain control characters");
        }

        if let Some(path) = &self.profile_file {
            if !path.is_file() {
                bail!("--profile-file '{}' does not exist", path.display());
            }
        }

        Ok(())
    }

    /// The single identity this instance watches for.
    pub fn device_identity(&self) -> DeviceIdentity {
        match &self.hardware_id {
            Some(id) => DeviceIdentity::HardwareId(id.clone()),
            None => DeviceIdentity::ClassAndName {
                class_guid: self.device_class.clone(),
                name_fragment: self.device_name.clone(),
            },
        }
    }

    /// Snapshot the serial line settings for the session manager.
    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig {
            baud_rate: self.baud,
            data_bits: DataBits::from_count(self.data_bits).unwrap_or_default(),
            parity: self.parity,
            stop_bits: self.stop_bits,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            open_timeout: Duration::from_millis(self.open_timeout_ms),
        }
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Resolve the active vocabulary: the profile file when given, else the built-in one.
    pub fn dispatch_profile(&self) -> Result<DispatchProfile> {
        match &self.profile_file {
            Some(path) => DispatchProfile::load(path, self.target.clone())
                .with_context(|| format!("failed to load profile '{}'", path.display())),
            None => Ok(DispatchProfile::builtin(self.profile, self.target.clone())),
        }
    }

    /// Trace log location used when logging is enabled.
    pub fn trace_log_path(&self) -> Option<PathBuf> {
        self.logging_enabled()
            .then(crate::telemetry::tracing_log_path)
    }
}

/// Trim identity text and reject values that could never match a device caption.
pub(super) fn sanitize_identity_text(value: &str, flag: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{flag} cannot be empty");
    }
    if trimmed.chars().count() > MAX_IDENTITY_CHARS {
        bail!("{flag} must be at most {MAX_IDENTITY_CHARS} characters");
    }
    if trimmed.chars().any(char::is_control) {
        bail!("{flag} must not contain control characters");
    }
    Ok(trimmed.to_string())
}
