//! Cooperative timer scheduling for the state machine
//!
//! Timers never call back into the machine directly. When one elapses it
//! posts an `Input::TimerFired` onto the machine's input channel, so timer
//! callbacks are processed in order with gestures.

mod scheduler;

pub use scheduler::{Scheduler, TimerKind};
