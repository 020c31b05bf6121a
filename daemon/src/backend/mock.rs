//! In-memory backend for tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::alarm::AlarmSettings;
use crate::config::RuntimeConfig;

use super::{Backend, BackendError, DreamCommand};

#[derive(Debug)]
struct MockState {
    /// `None` makes alarm reads fail
    alarm: Option<AlarmSettings>,
    fail_writes: bool,
    /// Added to every alarm read and toggle
    latency: Duration,
}

/// Backend double that records saves and commands
#[derive(Debug, Clone)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
    saves_tx: mpsc::UnboundedSender<(u8, u8)>,
    commands_tx: mpsc::UnboundedSender<DreamCommand>,
}

/// Receiving ends of what the mock recorded
pub struct MockLog {
    /// `(hour, minute)` of every save attempt
    pub saves: mpsc::UnboundedReceiver<(u8, u8)>,
    pub commands: mpsc::UnboundedReceiver<DreamCommand>,
}

impl MockBackend {
    pub fn new(alarm: Option<AlarmSettings>) -> (Self, MockLog) {
        let (saves_tx, saves) = mpsc::unbounded_channel();
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let backend = Self {
            state: Arc::new(Mutex::new(MockState {
                alarm,
                fail_writes: false,
                latency: Duration::ZERO,
            })),
            saves_tx,
            commands_tx,
        };
        (backend, MockLog { saves, commands })
    }

    pub fn fail_writes(&self) {
        self.state.lock().unwrap().fail_writes = true;
    }

    pub fn slow_reads(&self, latency: Duration) {
        self.state.lock().unwrap().latency = latency;
    }

    async fn delay(&self) {
        let latency = self.state.lock().unwrap().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    pub fn stored_alarm(&self) -> Option<AlarmSettings> {
        self.state.lock().unwrap().alarm
    }

    fn unavailable(path: &'static str) -> BackendError {
        BackendError::Status { status: 503, path }
    }
}

impl Backend for MockBackend {
    async fn fetch_config(&self) -> Result<RuntimeConfig, BackendError> {
        Ok(RuntimeConfig::default())
    }

    async fn fetch_alarm(&self) -> Result<AlarmSettings, BackendError> {
        self.delay().await;
        self.state
            .lock()
            .unwrap()
            .alarm
            .ok_or_else(|| Self::unavailable("/api/alarm"))
    }

    async fn save_alarm(&self, hour: u8, minute: u8) -> Result<AlarmSettings, BackendError> {
        let saved = {
            let mut state = self.state.lock().unwrap();
            if state.fail_writes {
                None
            } else {
                let enabled = state.alarm.map_or(true, |alarm| alarm.enabled);
                let saved = AlarmSettings::new(hour, minute, enabled);
                state.alarm = Some(saved);
                Some(saved)
            }
        };
        // Attempts are recorded whether or not they succeed
        let _ = self.saves_tx.send((hour, minute));
        saved.ok_or_else(|| Self::unavailable("/api/alarm"))
    }

    async fn toggle_alarm(&self) -> Result<bool, BackendError> {
        self.delay().await;
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(Self::unavailable("/api/alarm/toggle"));
        }
        let alarm = state.alarm.get_or_insert_with(AlarmSettings::default);
        alarm.enabled = !alarm.enabled;
        Ok(alarm.enabled)
    }

    async fn send_command(&self, command: DreamCommand) -> Result<(), BackendError> {
        let _ = self.commands_tx.send(command);
        Ok(())
    }
}
