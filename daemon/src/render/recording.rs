//! Presenter double that records every effect for assertions

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::alarm::AlarmSettings;
use crate::state::State;

use super::{AudioCommand, Icon, Presenter};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Exited(State),
    Entered(State),
    Icon(Option<Icon>),
    Audio(AudioCommand),
    Logo(f32),
    HideLogo,
    HideClock,
    EnsureClock,
    RefreshClock,
    AlarmTime(u8, u8),
    Indicator(Option<(u8, u8)>),
}

/// Shared effect log; clone it before handing the presenter to the machine
#[derive(Debug, Clone, Default)]
pub struct Effects(Arc<Mutex<Vec<Effect>>>);

impl Effects {
    pub fn take(&self) -> Vec<Effect> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }

    pub fn contains(&self, effect: &Effect) -> bool {
        self.0.lock().unwrap().contains(effect)
    }

    fn push(&self, effect: Effect) {
        self.0.lock().unwrap().push(effect);
    }
}

#[derive(Debug, Default)]
pub struct RecordingPresenter {
    effects: Effects,
}

impl RecordingPresenter {
    pub fn new() -> (Self, Effects) {
        let effects = Effects::default();
        (
            Self {
                effects: effects.clone(),
            },
            effects,
        )
    }
}

impl Presenter for RecordingPresenter {
    fn state_exited(&mut self, state: State) {
        self.effects.push(Effect::Exited(state));
    }

    fn state_entered(&mut self, state: State) {
        self.effects.push(Effect::Entered(state));
    }

    fn set_icon(&mut self, icon: Option<Icon>) {
        self.effects.push(Effect::Icon(icon));
    }

    fn set_alarm_audio(&mut self, command: AudioCommand) {
        self.effects.push(Effect::Audio(command));
    }

    fn show_logo(&mut self, opacity: f32, _fade: Duration) {
        self.effects.push(Effect::Logo(opacity));
    }

    fn hide_logo(&mut self) {
        self.effects.push(Effect::HideLogo);
    }

    fn hide_clock(&mut self) {
        self.effects.push(Effect::HideClock);
    }

    fn ensure_clock_running(&mut self) {
        self.effects.push(Effect::EnsureClock);
    }

    fn refresh_clock(&mut self) {
        self.effects.push(Effect::RefreshClock);
    }

    fn show_alarm_time(&mut self, settings: &AlarmSettings) {
        self.effects.push(Effect::AlarmTime(settings.hour, settings.minute));
    }

    fn set_alarm_indicator(&mut self, time: Option<(u8, u8)>) {
        self.effects.push(Effect::Indicator(time));
    }
}
