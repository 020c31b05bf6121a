//! Configuration loading and management
//!
//! Two layers:
//! - `Config`: daemon settings read from the environment at launch
//! - `RuntimeConfig`: display timings served by the backend, fixed for the
//!   life of the process

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";
const DEFAULT_ALARM_POLL_SECS: u64 = 15;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

/// Errors in the daemon's environment configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("HOME is not set and DREAM_RECORDER_SOCKET was not given")]
    MissingHome,

    #[error("invalid value for {key}: {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Base URL of the backend service
    pub backend_url: String,

    /// How often the alarm watcher polls the stored alarm
    pub alarm_poll_interval: Duration,

    /// Per-request timeout for backend calls
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let socket_path = match lookup("DREAM_RECORDER_SOCKET") {
            Some(path) => PathBuf::from(path),
            None => {
                let home = lookup("HOME").ok_or(ConfigError::MissingHome)?;
                PathBuf::from(home)
                    .join(".local")
                    .join("share")
                    .join("dream-recorder")
                    .join("daemon.sock")
            }
        };

        let backend_url =
            lookup("DREAM_RECORDER_BACKEND_URL").unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let poll_secs = parse_number(
            &lookup,
            "DREAM_RECORDER_ALARM_POLL_SECS",
            DEFAULT_ALARM_POLL_SECS,
        )?;
        let timeout_ms = parse_number(
            &lookup,
            "DREAM_RECORDER_REQUEST_TIMEOUT_MS",
            DEFAULT_REQUEST_TIMEOUT_MS,
        )?;

        Ok(Self {
            socket_path,
            backend_url,
            alarm_poll_interval: Duration::from_secs(poll_secs.max(1)),
            request_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

fn parse_number(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
    }
}

/// Display timings served by the backend's `/api/config`
///
/// Durations are milliseconds except `playback_duration`, which is seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub playback_duration: u64,
    pub logo_fade_in_duration: u64,
    pub logo_fade_out_duration: u64,
    pub clock_fade_in_duration: u64,
    pub clock_fade_out_duration: u64,
    pub transition_delay: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            playback_duration: 30,
            logo_fade_in_duration: 3000,
            logo_fade_out_duration: 3000,
            clock_fade_in_duration: 1000,
            clock_fade_out_duration: 1000,
            transition_delay: 1000,
        }
    }
}

impl RuntimeConfig {
    pub fn playback(&self) -> Duration {
        Duration::from_secs(self.playback_duration)
    }

    pub fn logo_fade_in(&self) -> Duration {
        Duration::from_millis(self.logo_fade_in_duration)
    }

    pub fn logo_fade_out(&self) -> Duration {
        Duration::from_millis(self.logo_fade_out_duration)
    }

    pub fn clock_fade_in(&self) -> Duration {
        Duration::from_millis(self.clock_fade_in_duration)
    }

    pub fn clock_fade_out(&self) -> Duration {
        Duration::from_millis(self.clock_fade_out_duration)
    }

    pub fn transition_delay(&self) -> Duration {
        Duration::from_millis(self.transition_delay)
    }
}
