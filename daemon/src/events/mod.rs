//! Events module for state machine notifications
//!
//! Broadcast to IPC subscribers after every accepted transition and
//! after an alarm toggle.

use serde::{Deserialize, Serialize};

use crate::state::State;

/// Events emitted by the state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateEvent {
    /// A transition was accepted
    StateChanged {
        current: State,
        previous: State,
        /// Detail carried by the error state
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// The alarm enabled flag was flipped
    AlarmToggled { enabled: bool },
}

impl std::fmt::Display for StateEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateEvent::StateChanged {
                current,
                previous,
                error: Some(detail),
            } => write!(f, "STATE_CHANGED ({} -> {}: {})", previous, current, detail),
            StateEvent::StateChanged {
                current, previous, ..
            } => write!(f, "STATE_CHANGED ({} -> {})", previous, current),
            StateEvent::AlarmToggled { enabled } => {
                write!(f, "ALARM_TOGGLED ({})", if *enabled { "on" } else { "off" })
            }
        }
    }
}
