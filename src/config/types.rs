//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::process::{Supervisor, DEFAULT_POLL_INTERVAL, DEFAULT_TERMINATE_TIMEOUT};
use crate::registry::ReportOptions;
use crate::retry::RetryConfig;

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Timing of the output relay loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayConfig {
    /// Longest wait for a line before the process is polled again.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Grace period between SIGTERM and SIGKILL on cancellation.
    #[serde(default = "default_terminate_timeout_ms")]
    pub terminate_timeout_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    millis(DEFAULT_POLL_INTERVAL)
}

fn default_terminate_timeout_ms() -> u64 {
    millis(DEFAULT_TERMINATE_TIMEOUT)
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            terminate_timeout_ms: default_terminate_timeout_ms(),
        }
    }
}

impl RelayConfig {
    /// Build a supervisor with these timings.
    #[must_use]
    pub fn supervisor(&self) -> Supervisor {
        Supervisor::new()
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_terminate_timeout(Duration::from_millis(self.terminate_timeout_ms))
    }
}

/// Where to find the office interpreter and conversion script.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OfficeConfig {
    /// Interpreter bundled with the office suite.
    #[serde(default = "default_python")]
    pub python: PathBuf,
    /// Conversion script run by the interpreter.
    #[serde(default = "default_script")]
    pub script: PathBuf,
    /// Listener address (`host:port`) to wait for before converting.
    #[serde(default)]
    pub acceptor: Option<String>,
}

fn default_python() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\Program Files\LibreOffice\program\python.exe")
    } else if cfg!(target_os = "macos") {
        PathBuf::from("/Applications/LibreOffice.app/Contents/Resources/python")
    } else {
        PathBuf::from("/usr/lib/libreoffice/program/python")
    }
}

fn default_script() -> PathBuf {
    PathBuf::from("convert.py")
}

impl Default for OfficeConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            script: default_script(),
            acceptor: None,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub office: OfficeConfig,
    #[serde(default)]
    pub registry: ReportOptions,
}
