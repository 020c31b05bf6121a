//! Per-purpose timer bookkeeping
//!
//! At most one live timer exists per `TimerKind`. Every fired timer carries
//! the token it was scheduled with, and only the current token for its kind
//! is honoured, so a fire message that was already queued when the timer
//! was replaced or cancelled is dropped.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::state::Input;

/// Logical purpose of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Return to the clock after a dream video has played
    PlaybackReturn,
    /// Hard stop of the alarm audio after its fade-out
    AlarmAudioStop,
    /// End of logo fade-in plus hold during startup
    LogoFadeIn,
    /// End of logo fade-out during startup
    LogoFadeOut,
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerKind::PlaybackReturn => write!(f, "playback-return"),
            TimerKind::AlarmAudioStop => write!(f, "alarm-audio-stop"),
            TimerKind::LogoFadeIn => write!(f, "logo-fade-in"),
            TimerKind::LogoFadeOut => write!(f, "logo-fade-out"),
        }
    }
}

struct LiveTimer {
    token: u64,
    handle: JoinHandle<()>,
}

/// Timer registry owned by the state machine
pub struct Scheduler {
    input_tx: mpsc::Sender<Input>,
    live: HashMap<TimerKind, LiveTimer>,
    next_token: u64,
}

impl Scheduler {
    /// Create a scheduler that posts fired timers to `input_tx`
    pub fn new(input_tx: mpsc::Sender<Input>) -> Self {
        Self {
            input_tx,
            live: HashMap::new(),
            next_token: 0,
        }
    }

    /// Replace the timer of `kind` with a new one firing after `delay`,
    /// or just cancel it when `delay` is `None`.
    ///
    /// This is the only place timers are created or destroyed.
    pub fn reschedule_or_cancel(&mut self, kind: TimerKind, delay: Option<Duration>) {
        if let Some(stale) = self.live.remove(&kind) {
            stale.handle.abort();
            debug!(%kind, token = stale.token, "timer cancelled");
        }

        let Some(delay) = delay else {
            return;
        };

        self.next_token += 1;
        let token = self.next_token;
        let input_tx = self.input_tx.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if input_tx.send(Input::TimerFired { kind, token }).await.is_err() {
                warn!(%kind, "timer elapsed after state machine stopped");
            }
        });

        debug!(%kind, token, delay_ms = delay.as_millis() as u64, "timer scheduled");
        self.live.insert(kind, LiveTimer { token, handle });
    }

    /// Schedule `kind` to fire after `delay`, replacing any live timer of that kind
    pub fn schedule(&mut self, kind: TimerKind, delay: Duration) {
        self.reschedule_or_cancel(kind, Some(delay));
    }

    /// Cancel the live timer of `kind`, if any
    pub fn cancel(&mut self, kind: TimerKind) {
        self.reschedule_or_cancel(kind, None);
    }

    /// Accept a fired timer.
    ///
    /// Returns true and retires the timer when `token` is the live one for
    /// `kind`; returns false for stale fires.
    pub fn claim(&mut self, kind: TimerKind, token: u64) -> bool {
        match self.live.get(&kind) {
            Some(live) if live.token == token => {
                self.live.remove(&kind);
                true
            }
            _ => {
                debug!(%kind, token, "ignoring stale timer");
                false
            }
        }
    }

    /// Whether a timer of `kind` is pending
    #[cfg(test)]
    pub fn is_live(&self, kind: TimerKind) -> bool {
        self.live.contains_key(&kind)
    }

    /// Abort every pending timer
    pub fn cancel_all(&mut self) {
        for (kind, live) in self.live.drain() {
            live.handle.abort();
            debug!(%kind, token = live.token, "timer cancelled");
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
