//! Alarm settings value type

use std::fmt;

use serde::{Deserialize, Serialize};

const HOURS_PER_DAY: u8 = 24;
const MINUTES_PER_HOUR: u8 = 60;

/// Alarm time of day plus its enabled flag
///
/// `hour` stays in `0..24` and `minute` in `0..60`; every mutation wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmSettings {
    #[serde(default)]
    pub hour: u8,

    #[serde(default)]
    pub minute: u8,

    /// Missing in storage means enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            hour: 0,
            minute: 0,
            enabled: true,
        }
    }
}

impl AlarmSettings {
    pub fn new(hour: u8, minute: u8, enabled: bool) -> Self {
        let settings = Self {
            hour,
            minute,
            enabled,
        };
        settings.normalized()
    }

    /// Reduce out-of-range values from storage into range
    pub fn normalized(mut self) -> Self {
        self.hour %= HOURS_PER_DAY;
        self.minute %= MINUTES_PER_HOUR;
        self
    }

    pub fn increment_hour(&mut self) {
        self.hour = (self.hour + 1) % HOURS_PER_DAY;
    }

    pub fn decrement_hour(&mut self) {
        self.hour = (self.hour + HOURS_PER_DAY - 1) % HOURS_PER_DAY;
    }

    pub fn increment_minute(&mut self) {
        self.minute = (self.minute + 1) % MINUTES_PER_HOUR;
    }

    pub fn decrement_minute(&mut self) {
        self.minute = (self.minute + MINUTES_PER_HOUR - 1) % MINUTES_PER_HOUR;
    }

    /// 00:00 is the "no alarm set" convention
    pub fn is_unset(&self) -> bool {
        self.hour == 0 && self.minute == 0
    }

    /// Time to show on the alarm indicator, if it should be shown at all
    pub fn indicator(&self) -> Option<(u8, u8)> {
        should_show_indicator(self.enabled, self.hour, self.minute)
            .then_some((self.hour, self.minute))
    }
}

impl fmt::Display for AlarmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// The alarm indicator is visible only for an enabled alarm that is not 00:00
pub fn should_show_indicator(enabled: bool, hour: u8, minute: u8) -> bool {
    enabled && !(hour == 0 && minute == 0)
}
