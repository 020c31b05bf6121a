//! Render/audio adapter boundary
//!
//! The state machine never touches the display or speaker directly. It
//! drives a `Presenter`, a pure side-effect sink whose methods return
//! nothing the machine depends on.

mod log;
#[cfg(test)]
pub mod recording;

use std::time::Duration;

use crate::alarm::AlarmSettings;
use crate::state::State;

pub use self::log::LogPresenter;

/// Status icon shown over the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    Recording,
    Generating,
    Error,
}

/// Alarm audio control
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioCommand {
    /// Start playback at `from` volume and fade to `to`
    Start {
        from: f32,
        to: f32,
        fade: Duration,
        looped: bool,
    },
    /// Fade the playing audio
    Fade { from: f32, to: f32, fade: Duration },
    /// Stop playback immediately
    Stop,
}

/// Capabilities the state machine needs from the display and speaker
pub trait Presenter: Send + 'static {
    /// `state` is being left
    fn state_exited(&mut self, state: State);

    /// `state` is being entered
    fn state_entered(&mut self, state: State);

    /// Show one status icon, or hide them all with `None`
    fn set_icon(&mut self, icon: Option<Icon>);

    fn set_alarm_audio(&mut self, command: AudioCommand);

    /// Fade the startup logo to `opacity` over `fade`
    fn show_logo(&mut self, opacity: f32, fade: Duration);

    fn hide_logo(&mut self);

    fn hide_clock(&mut self);

    /// Start the ticking clock if it is not already running
    fn ensure_clock_running(&mut self);

    /// Redraw the clock with the true current time
    fn refresh_clock(&mut self);

    /// Show the alarm time in place of the clock digits
    fn show_alarm_time(&mut self, settings: &AlarmSettings);

    /// Show the alarm indicator with `(hour, minute)`, or hide it
    fn set_alarm_indicator(&mut self, time: Option<(u8, u8)>);
}
