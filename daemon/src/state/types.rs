//! State, gesture and input vocabulary shared by the state machine and
//! every component that feeds it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::alarm::AlarmSettings;
use crate::backend::BackendNotice;
use crate::timer::TimerKind;

/// What the appliance is currently displaying or doing
///
/// The hour-editing mode has a single canonical variant,
/// `AlarmSettingHour`. The legacy name `alarm_clock` is accepted on input
/// and maps to the same variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum State {
    /// Logo animation, non-interruptible
    Startup,
    /// Showing the current time
    Clock,
    /// Editing the alarm hour
    AlarmSettingHour,
    /// Editing the alarm minute
    AlarmSettingMinute,
    /// Alarm is sounding
    AlarmTriggered,
    /// Capturing a dream recording
    Recording,
    /// Backend is generating the dream video
    Processing,
    /// Playing back a dream video
    Playback,
    /// Showing an error indicator
    Error,
}

impl Default for State {
    fn default() -> Self {
        Self::Startup
    }
}

impl State {
    /// All states, in declaration order
    pub const ALL: [State; 9] = [
        State::Startup,
        State::Clock,
        State::AlarmSettingHour,
        State::AlarmSettingMinute,
        State::AlarmTriggered,
        State::Recording,
        State::Processing,
        State::Playback,
        State::Error,
    ];

    /// Wire name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Startup => "startup",
            State::Clock => "clock",
            State::AlarmSettingHour => "alarm_setting_hour",
            State::AlarmSettingMinute => "alarm_setting_minute",
            State::AlarmTriggered => "alarm_triggered",
            State::Recording => "recording",
            State::Processing => "processing",
            State::Playback => "playback",
            State::Error => "error",
        }
    }

    /// True for the hour and minute editing states
    pub fn is_alarm_editing(&self) -> bool {
        matches!(self, State::AlarmSettingHour | State::AlarmSettingMinute)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "alarm_clock" {
            return Ok(State::AlarmSettingHour);
        }
        State::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ParseError::UnknownState(s.to_string()))
    }
}

impl TryFrom<String> for State {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, ParseError> {
        value.parse()
    }
}

/// A classified input event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Gesture {
    SingleTap,
    DoubleTap,
    TripleTap,
    Hold,
    /// System-originated: the stored alarm time was reached
    AlarmTriggered,
}

impl Gesture {
    pub const ALL: [Gesture; 5] = [
        Gesture::SingleTap,
        Gesture::DoubleTap,
        Gesture::TripleTap,
        Gesture::Hold,
        Gesture::AlarmTriggered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gesture::SingleTap => "single_tap",
            Gesture::DoubleTap => "double_tap",
            Gesture::TripleTap => "triple_tap",
            Gesture::Hold => "hold",
            Gesture::AlarmTriggered => "alarm_triggered",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gesture {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gesture::ALL
            .into_iter()
            .find(|gesture| gesture.as_str() == s)
            .ok_or_else(|| ParseError::UnknownGesture(s.to_string()))
    }
}

impl TryFrom<String> for Gesture {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, ParseError> {
        value.parse()
    }
}

/// Errors raised when decoding state or gesture names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown state: {0}")]
    UnknownState(String),

    #[error("unknown gesture: {0}")]
    UnknownGesture(String),
}

/// Everything the state machine consumes, delivered one at a time
#[derive(Debug)]
pub enum Input {
    /// User gesture or system alarm event
    Gesture(Gesture),
    /// A scheduled timer elapsed
    TimerFired { kind: TimerKind, token: u64 },
    /// Pipeline notice from the backend service
    Notice(BackendNotice),
    /// Fresh alarm snapshot from the alarm watcher
    AlarmSynced(AlarmSettings),
    /// Outcome of a background alarm load; `None` if the backend failed
    AlarmLoaded(Option<AlarmSettings>),
    /// Outcome of a background alarm toggle; `None` if the backend failed
    AlarmToggled(Option<bool>),
    /// The watcher reached the alarm time. The reply reports whether the
    /// machine is now in `alarm_triggered`.
    AlarmDue(oneshot::Sender<bool>),
}
