//! State machine module for the appliance display
//!
//! Provides an explicit state machine over the display states:
//! - Startup: logo animation, ignores all input
//! - Clock: current time, entry point for every feature
//! - AlarmSettingHour / AlarmSettingMinute: alarm editing
//! - AlarmTriggered: alarm sounding until dismissed
//! - Recording / Processing / Playback: the dream pipeline
//! - Error: pipeline failure shown until acknowledged

mod machine;
mod types;

pub use machine::StateMachine;
pub use types::{Gesture, Input, State};
