//! Backend service collaborator
//!
//! The backend persists configuration and alarm settings and runs the
//! recording / video generation pipeline. The state machine talks to it
//! through the `Backend` trait so tests can substitute a mock.

mod http;
#[cfg(test)]
pub mod mock;

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::alarm::AlarmSettings;
use crate::config::RuntimeConfig;

pub use http::HttpBackend;

/// Fire-and-forget requests into the recording / playback pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DreamCommand {
    StartRecording,
    StopRecording,
    CancelRecording,
    PlayLatest,
    PlayPrevious,
}

impl DreamCommand {
    /// Endpoint path for this command
    pub fn path(&self) -> &'static str {
        match self {
            DreamCommand::StartRecording => "/api/recording/start",
            DreamCommand::StopRecording => "/api/recording/stop",
            DreamCommand::CancelRecording => "/api/recording/cancel",
            DreamCommand::PlayLatest => "/api/dreams/latest",
            DreamCommand::PlayPrevious => "/api/dreams/previous",
        }
    }
}

/// Pipeline notices pushed by the backend service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendNotice {
    /// The generated dream video is ready to play
    VideoReady,
    /// The pipeline failed
    Failed {
        /// Human-readable reason shown with the error indicator
        detail: String,
    },
}

/// Errors talking to the backend service
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned status {status} for {path}")]
    Status { status: u16, path: &'static str },
}

/// Operations the daemon needs from the backend service
pub trait Backend: Clone + Send + Sync + 'static {
    /// Fetch display timings
    fn fetch_config(&self) -> impl Future<Output = Result<RuntimeConfig, BackendError>> + Send;

    /// Fetch the persisted alarm settings
    fn fetch_alarm(&self) -> impl Future<Output = Result<AlarmSettings, BackendError>> + Send;

    /// Persist the alarm time, returning what was stored
    fn save_alarm(
        &self,
        hour: u8,
        minute: u8,
    ) -> impl Future<Output = Result<AlarmSettings, BackendError>> + Send;

    /// Flip the persisted enabled flag, returning the new value
    fn toggle_alarm(&self) -> impl Future<Output = Result<bool, BackendError>> + Send;

    /// Send a recording or playback command
    fn send_command(
        &self,
        command: DreamCommand,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Send `command` without waiting for the result; failures are logged
pub fn dispatch<B: Backend>(backend: &B, command: DreamCommand) {
    let backend = backend.clone();
    tokio::spawn(async move {
        match backend.send_command(command).await {
            Ok(()) => debug!(?command, "backend command delivered"),
            Err(e) => warn!(?command, error = %e, "backend command failed"),
        }
    });
}
