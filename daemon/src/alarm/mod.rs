//! Alarm time-of-day settings
//!
//! - `AlarmSettings`: the persisted value and its wraparound arithmetic
//! - `AlarmStore`: in-memory copy owned by the state machine, backed by
//!   the backend service
//! - `AlarmWatcher`: polls the backend and raises the alarm gesture when
//!   the wall clock reaches the stored time

mod settings;
mod store;
mod watcher;

pub use settings::AlarmSettings;
pub use store::AlarmStore;
pub use watcher::AlarmWatcher;
