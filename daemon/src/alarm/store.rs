//! In-memory alarm settings backed by the backend service
//!
//! Persistence never blocks or fails the interactive flow: loads and
//! toggles run in the background and report back through the machine's
//! input channel, saves are spawned and only logged.

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::backend::Backend;
use crate::state::Input;

use super::AlarmSettings;

/// Owner of the alarm values between loads and saves
pub struct AlarmStore<B> {
    backend: B,
    settings: AlarmSettings,
}

impl<B: Backend> AlarmStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            settings: AlarmSettings::default(),
        }
    }

    /// Current in-memory settings
    pub fn settings(&self) -> &AlarmSettings {
        &self.settings
    }

    /// Fetch the persisted settings in the background.
    ///
    /// The outcome is posted as `Input::AlarmLoaded`, `None` if the backend
    /// could not be read.
    pub fn request_load(&self, input_tx: mpsc::Sender<Input>) {
        let backend = self.backend.clone();
        tokio::spawn(async move {
            let loaded = match backend.fetch_alarm().await {
                Ok(loaded) => Some(loaded),
                Err(e) => {
                    warn!(error = %e, "failed to load alarm settings");
                    None
                }
            };
            let _ = input_tx.send(Input::AlarmLoaded(loaded)).await;
        });
    }

    /// Adopt a load result.
    ///
    /// A failed load falls back to 00:00 and `enabled` keeps its last known
    /// value.
    pub fn apply_load(&mut self, loaded: Option<AlarmSettings>) -> AlarmSettings {
        match loaded {
            Some(loaded) => {
                self.settings = loaded.normalized();
                info!(alarm = %self.settings, enabled = self.settings.enabled, "loaded alarm settings");
            }
            None => {
                debug!("using 00:00 for the alarm time");
                self.settings = AlarmSettings::new(0, 0, self.settings.enabled);
            }
        }
        self.settings
    }

    /// Persist the current time in the background
    pub fn save(&self) {
        let backend = self.backend.clone();
        let settings = self.settings;
        tokio::spawn(async move {
            match backend.save_alarm(settings.hour, settings.minute).await {
                Ok(saved) => debug!(alarm = %saved, "saved alarm settings"),
                Err(e) => error!(alarm = %settings, error = %e, "failed to save alarm settings"),
            }
        });
    }

    pub fn increment_hour(&mut self) -> AlarmSettings {
        self.settings.increment_hour();
        self.save();
        self.settings
    }

    pub fn decrement_hour(&mut self) -> AlarmSettings {
        self.settings.decrement_hour();
        self.save();
        self.settings
    }

    pub fn increment_minute(&mut self) -> AlarmSettings {
        self.settings.increment_minute();
        self.save();
        self.settings
    }

    pub fn decrement_minute(&mut self) -> AlarmSettings {
        self.settings.decrement_minute();
        self.save();
        self.settings
    }

    /// Flip the persisted enabled flag in the background.
    ///
    /// The new value is posted as `Input::AlarmToggled`, `None` if the
    /// backend could not be reached.
    pub fn request_toggle(&self, input_tx: mpsc::Sender<Input>) {
        let backend = self.backend.clone();
        tokio::spawn(async move {
            let enabled = match backend.toggle_alarm().await {
                Ok(enabled) => Some(enabled),
                Err(e) => {
                    error!(error = %e, "failed to toggle alarm");
                    None
                }
            };
            let _ = input_tx.send(Input::AlarmToggled(enabled)).await;
        });
    }

    /// Record the flag reported by a completed toggle
    pub fn apply_toggle(&mut self, enabled: bool) {
        self.settings.enabled = enabled;
        info!(enabled, "alarm toggled");
    }

    /// Adopt a snapshot polled from the backend
    pub fn sync(&mut self, settings: AlarmSettings) {
        let settings = settings.normalized();
        if settings != self.settings {
            debug!(alarm = %settings, enabled = settings.enabled, "alarm settings synced");
        }
        self.settings = settings;
    }
}
