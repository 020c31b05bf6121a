//! Wall-clock alarm watcher
//!
//! Polls the stored alarm, forwards each snapshot to the state machine and
//! raises `Input::AlarmDue` when local time reaches the alarm.

use std::time::Duration;

use chrono::{Local, NaiveDateTime, Timelike};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::backend::Backend;
use crate::state::Input;

use super::AlarmSettings;

/// Whether the alarm should go off at `now`.
///
/// Fires only for an enabled, set (non-00:00) alarm whose hour and minute
/// match, and at most once per calendar minute.
pub fn should_fire(
    settings: &AlarmSettings,
    now: NaiveDateTime,
    last_fired: Option<NaiveDateTime>,
) -> bool {
    if !settings.enabled || settings.is_unset() {
        return false;
    }
    if now.hour() != u32::from(settings.hour) || now.minute() != u32::from(settings.minute) {
        return false;
    }
    last_fired != Some(start_of_minute(now))
}

fn start_of_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

/// Background task raising the alarm event
pub struct AlarmWatcher<B> {
    backend: B,
    input_tx: mpsc::Sender<Input>,
    interval: Duration,
    last_fired: Option<NaiveDateTime>,
}

impl<B: Backend> AlarmWatcher<B> {
    pub fn new(backend: B, input_tx: mpsc::Sender<Input>, interval: Duration) -> Self {
        Self {
            backend,
            input_tx,
            interval,
            last_fired: None,
        }
    }

    /// Poll until the state machine goes away
    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "alarm watcher started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let settings = match self.backend.fetch_alarm().await {
                Ok(settings) => settings.normalized(),
                Err(e) => {
                    debug!(error = %e, "alarm poll failed");
                    continue;
                }
            };

            if self.input_tx.send(Input::AlarmSynced(settings)).await.is_err() {
                break;
            }

            let now = Local::now().naive_local();
            if !should_fire(&settings, now, self.last_fired) {
                continue;
            }

            info!(alarm = %settings, "alarm time reached");
            match self.raise(now).await {
                Some(true) => {}
                Some(false) => debug!("alarm not accepted yet, retrying on next poll"),
                None => break,
            }
        }

        info!("alarm watcher stopped");
    }

    /// Hand the alarm to the state machine and wait for its verdict.
    ///
    /// The minute only counts as fired once the machine accepted the alarm.
    /// Returns `None` when the machine is gone.
    async fn raise(&mut self, now: NaiveDateTime) -> Option<bool> {
        let (accepted_tx, accepted_rx) = oneshot::channel();
        self.input_tx.send(Input::AlarmDue(accepted_tx)).await.ok()?;
        let accepted = accepted_rx.await.ok()?;
        if accepted {
            self.last_fired = Some(start_of_minute(now));
        }
        Some(accepted)
    }
}
