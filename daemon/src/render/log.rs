//! Presenter that renders every effect as a structured log event

use std::time::Duration;

use tracing::{debug, info};

use crate::alarm::AlarmSettings;
use crate::config::RuntimeConfig;
use crate::state::State;

use super::{AudioCommand, Icon, Presenter};

/// Headless presenter used by the daemon
#[derive(Debug)]
pub struct LogPresenter {
    timing: RuntimeConfig,
    clock_running: bool,
    icon: Option<Icon>,
    indicator: Option<(u8, u8)>,
}

impl LogPresenter {
    pub fn new(timing: RuntimeConfig) -> Self {
        Self {
            timing,
            clock_running: false,
            icon: None,
            indicator: None,
        }
    }

    fn shows_clock(state: State) -> bool {
        matches!(state, State::Clock | State::AlarmTriggered) || state.is_alarm_editing()
    }
}

impl Presenter for LogPresenter {
    fn state_exited(&mut self, state: State) {
        match state {
            State::Playback => info!(
                fade_ms = self.timing.logo_fade_out().as_millis() as u64,
                "video: fade out and rewind"
            ),
            s if Self::shows_clock(s) => debug!(
                fade_ms = self.timing.clock_fade_out().as_millis() as u64,
                "clock: fade out"
            ),
            _ => {}
        }
    }

    fn state_entered(&mut self, state: State) {
        info!(%state, "display: state entered");
        match state {
            State::Playback => info!(
                delay_ms = self.timing.transition_delay().as_millis() as u64,
                "video: fade in and play"
            ),
            s if Self::shows_clock(s) => debug!(
                fade_ms = self.timing.clock_fade_in().as_millis() as u64,
                alarm_mode = s.is_alarm_editing(),
                "clock: fade in"
            ),
            _ => {}
        }
    }

    fn set_icon(&mut self, icon: Option<Icon>) {
        if icon != self.icon {
            info!(?icon, "icon changed");
            self.icon = icon;
        }
    }

    fn set_alarm_audio(&mut self, command: AudioCommand) {
        info!(?command, "alarm audio");
    }

    fn show_logo(&mut self, opacity: f32, fade: Duration) {
        debug!(opacity, fade_ms = fade.as_millis() as u64, "logo: fade");
    }

    fn hide_logo(&mut self) {
        debug!("logo: hidden");
    }

    fn hide_clock(&mut self) {
        debug!("clock: hidden");
    }

    fn ensure_clock_running(&mut self) {
        if !self.clock_running {
            self.clock_running = true;
            info!("clock: started");
        }
    }

    fn refresh_clock(&mut self) {
        self.clock_running = true;
        let now = chrono::Local::now();
        info!(time = %now.format("%H:%M"), "clock: showing current time");
    }

    fn show_alarm_time(&mut self, settings: &AlarmSettings) {
        info!(alarm = %settings, "clock: showing alarm time");
    }

    fn set_alarm_indicator(&mut self, time: Option<(u8, u8)>) {
        if time == self.indicator {
            return;
        }
        match time {
            Some((hour, minute)) => info!("alarm indicator: {:02}:{:02}", hour, minute),
            None => debug!("alarm indicator: hidden"),
        }
        self.indicator = time;
    }
}
