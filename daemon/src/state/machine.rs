//! Core state machine implementation
//!
//! Owns the current and previous state, the gesture dispatch table and
//! every timer handle. Inputs are handled strictly one at a time: each
//! gesture, timer fire or notice runs to completion, including observer
//! notification, before the next input is received.

use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::alarm::{AlarmSettings, AlarmStore};
use crate::backend::{self, Backend, BackendNotice, DreamCommand};
use crate::config::RuntimeConfig;
use crate::events::StateEvent;
use crate::render::{AudioCommand, Icon, Presenter};
use crate::timer::{Scheduler, TimerKind};

use super::types::{Gesture, Input, State};

/// Alarm audio fade-in when the alarm goes off
const ALARM_FADE_IN: Duration = Duration::from_millis(1000);
/// Alarm audio fade-out when the alarm is dismissed
const ALARM_FADE_OUT: Duration = Duration::from_millis(1500);
/// Hard stop of the alarm audio after dismissal
const ALARM_STOP_DELAY: Duration = Duration::from_millis(3000);

type Observer = Box<dyn FnMut(State, State) + Send>;

/// The state machine driving the appliance
pub struct StateMachine<P, B> {
    state: State,
    previous: State,
    /// Detail carried by the error state
    error: Option<String>,
    state_entered_at: Instant,
    timing: RuntimeConfig,
    presenter: P,
    backend: B,
    alarm: AlarmStore<B>,
    scheduler: Scheduler,
    input_tx: mpsc::Sender<Input>,
    /// A `clock + hold` alarm load is in flight
    load_pending: bool,
    observers: Vec<Observer>,
    event_tx: broadcast::Sender<StateEvent>,
}

impl<P: Presenter, B: Backend> StateMachine<P, B> {
    /// Create a new state machine in the startup state
    ///
    /// `input_tx` must feed the receiver later passed to `run`; timers post
    /// their fires through it.
    pub fn new(
        timing: RuntimeConfig,
        presenter: P,
        backend: B,
        input_tx: mpsc::Sender<Input>,
        event_tx: broadcast::Sender<StateEvent>,
    ) -> Self {
        Self {
            state: State::Startup,
            previous: State::Startup,
            error: None,
            state_entered_at: Instant::now(),
            timing,
            presenter,
            alarm: AlarmStore::new(backend.clone()),
            backend,
            scheduler: Scheduler::new(input_tx.clone()),
            input_tx,
            load_pending: false,
            observers: Vec::new(),
            event_tx,
        }
    }

    /// Get the current state
    pub fn state(&self) -> State {
        self.state
    }

    /// Get the state before the last transition
    pub fn previous_state(&self) -> State {
        self.previous
    }

    /// Detail of the current error state, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// In-memory alarm settings
    pub fn alarm(&self) -> &AlarmSettings {
        self.alarm.settings()
    }

    /// Register an observer called with `(current, previous)` after every
    /// accepted transition, in registration order
    pub fn on_state_change<F>(&mut self, observer: F)
    where
        F: FnMut(State, State) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Run the startup sequence, then process inputs until the channel closes
    pub async fn run(&mut self, mut input_rx: mpsc::Receiver<Input>) {
        info!("state machine started in startup state");
        self.begin_startup();

        while let Some(input) = input_rx.recv().await {
            self.handle_input(input);
        }

        self.scheduler.cancel_all();
        info!("state machine stopped");
    }

    /// Process a single input to completion
    ///
    /// Never waits on the backend; slow requests report back as later inputs.
    pub fn handle_input(&mut self, input: Input) {
        match input {
            Input::Gesture(gesture) => self.handle_gesture(gesture),
            Input::TimerFired { kind, token } => {
                if self.scheduler.claim(kind, token) {
                    self.on_timer(kind);
                }
            }
            Input::Notice(notice) => self.handle_notice(notice),
            Input::AlarmSynced(settings) => self.handle_alarm_sync(settings),
            Input::AlarmLoaded(loaded) => self.handle_alarm_loaded(loaded),
            Input::AlarmToggled(Some(enabled)) => self.handle_alarm_toggled(enabled),
            Input::AlarmToggled(None) => {}
            Input::AlarmDue(accepted) => {
                self.handle_gesture(Gesture::AlarmTriggered);
                let _ = accepted.send(self.state == State::AlarmTriggered);
            }
        }
    }

    /// Logo fade-in, hold, fade-out, then the clock. Nothing else may move
    /// the machine out of startup.
    fn begin_startup(&mut self) {
        self.presenter.hide_clock();
        self.presenter.show_logo(0.0, Duration::ZERO);
        self.presenter.show_logo(1.0, self.timing.logo_fade_in());
        self.scheduler.schedule(
            TimerKind::LogoFadeIn,
            self.timing.logo_fade_in() + self.timing.transition_delay(),
        );
    }

    fn on_timer(&mut self, kind: TimerKind) {
        debug!(%kind, state = %self.state, "timer fired");
        match kind {
            TimerKind::LogoFadeIn => {
                self.presenter.show_logo(0.0, self.timing.logo_fade_out());
                self.scheduler
                    .schedule(TimerKind::LogoFadeOut, self.timing.logo_fade_out());
            }
            TimerKind::LogoFadeOut => {
                self.presenter.hide_logo();
                self.transition(State::Clock, None);
            }
            TimerKind::PlaybackReturn => {
                info!("playback finished, returning to clock");
                self.transition(State::Clock, None);
            }
            TimerKind::AlarmAudioStop => {
                self.presenter.set_alarm_audio(AudioCommand::Stop);
            }
        }
    }

    /// Dispatch a gesture on `(state, gesture)`.
    ///
    /// Performs at most one transition or alarm mutation; pairs without an
    /// entry are logged and ignored.
    pub fn handle_gesture(&mut self, gesture: Gesture) {
        debug!(state = %self.state, %gesture, "gesture received");

        match (self.state, gesture) {
            // Overrides every state (startup guard still applies)
            (_, Gesture::AlarmTriggered) => self.transition(State::AlarmTriggered, None),

            (State::Clock, Gesture::SingleTap) => {
                self.transition(State::Playback, None);
                backend::dispatch(&self.backend, DreamCommand::PlayLatest);
            }
            (State::Clock, Gesture::DoubleTap) => {
                self.transition(State::Recording, None);
                backend::dispatch(&self.backend, DreamCommand::StartRecording);
            }
            (State::Clock, Gesture::TripleTap) => {
                self.alarm.request_toggle(self.input_tx.clone());
            }
            // Editing starts once the load reports back
            (State::Clock, Gesture::Hold) => {
                if !self.load_pending {
                    self.load_pending = true;
                    self.alarm.request_load(self.input_tx.clone());
                }
            }

            (State::AlarmSettingHour, Gesture::SingleTap) => {
                let settings = self.alarm.increment_hour();
                self.presenter.show_alarm_time(&settings);
            }
            (State::AlarmSettingHour, Gesture::DoubleTap) => {
                let settings = self.alarm.decrement_hour();
                self.presenter.show_alarm_time(&settings);
            }
            (State::AlarmSettingHour, Gesture::Hold) => {
                self.transition(State::AlarmSettingMinute, None);
            }

            (State::AlarmSettingMinute, Gesture::SingleTap) => {
                let settings = self.alarm.increment_minute();
                self.presenter.show_alarm_time(&settings);
            }
            (State::AlarmSettingMinute, Gesture::DoubleTap) => {
                let settings = self.alarm.decrement_minute();
                self.presenter.show_alarm_time(&settings);
            }
            (State::AlarmSettingMinute, Gesture::Hold) => {
                self.presenter.refresh_clock();
                self.transition(State::Clock, None);
            }

            // Any single tap stops a recording
            (State::Recording, Gesture::SingleTap) => {
                self.transition(State::Processing, None);
                backend::dispatch(&self.backend, DreamCommand::StopRecording);
            }
            (State::Recording, Gesture::DoubleTap) => {
                self.transition(State::Clock, None);
                backend::dispatch(&self.backend, DreamCommand::CancelRecording);
            }

            // Re-entering playback restarts the return timer
            (State::Playback, Gesture::SingleTap) => {
                self.transition(State::Playback, None);
                backend::dispatch(&self.backend, DreamCommand::PlayPrevious);
            }
            (State::Playback, Gesture::DoubleTap) => self.transition(State::Clock, None),

            (State::Error, Gesture::SingleTap) => self.transition(State::Clock, None),

            (State::AlarmTriggered, Gesture::SingleTap) => {
                info!("alarm dismissed");
                self.transition(State::Clock, None);
            }

            (state, gesture) => {
                debug!(%state, %gesture, "gesture has no effect in this state");
            }
        }
    }

    fn handle_alarm_loaded(&mut self, loaded: Option<AlarmSettings>) {
        // Any transition since the hold abandons the request
        if !self.load_pending || self.state != State::Clock {
            debug!(state = %self.state, "stale alarm load dropped");
            return;
        }
        self.load_pending = false;
        self.alarm.apply_load(loaded);
        self.transition(State::AlarmSettingHour, None);
    }

    fn handle_alarm_toggled(&mut self, enabled: bool) {
        self.alarm.apply_toggle(enabled);
        if self.state == State::Clock {
            self.presenter
                .set_alarm_indicator(self.alarm.settings().indicator());
        }
        let _ = self.event_tx.send(StateEvent::AlarmToggled { enabled });
    }

    fn handle_notice(&mut self, notice: BackendNotice) {
        match notice {
            BackendNotice::VideoReady if self.state == State::Processing => {
                self.transition(State::Playback, None);
            }
            BackendNotice::VideoReady => {
                debug!(state = %self.state, "video ready outside processing, ignored");
            }
            BackendNotice::Failed { detail } => {
                warn!(%detail, "backend reported a failure");
                self.transition(State::Error, Some(detail));
            }
        }
    }

    fn handle_alarm_sync(&mut self, settings: AlarmSettings) {
        // Local edits win while the alarm is being set
        if self.state.is_alarm_editing() {
            return;
        }
        self.alarm.sync(settings);
        if self.state == State::Clock {
            self.presenter
                .set_alarm_indicator(self.alarm.settings().indicator());
        }
    }

    /// Perform a state transition
    ///
    /// While in startup only the clock is an accepted target; any other
    /// request is dropped without side effects.
    fn transition(&mut self, target: State, detail: Option<String>) {
        if self.state == State::Startup && target != State::Clock {
            debug!(%target, "transition dropped during startup");
            return;
        }

        let from = self.state;
        let duration_ms =
            u64::try_from(self.state_entered_at.elapsed().as_millis()).unwrap_or(u64::MAX);

        self.load_pending = false;

        self.scheduler.cancel(TimerKind::PlaybackReturn);

        if from == State::AlarmTriggered && target != State::AlarmTriggered {
            self.presenter.set_alarm_audio(AudioCommand::Fade {
                from: 1.0,
                to: 0.0,
                fade: ALARM_FADE_OUT,
            });
            self.scheduler
                .schedule(TimerKind::AlarmAudioStop, ALARM_STOP_DELAY);
        }

        self.presenter.state_exited(from);
        self.enter(target);

        self.previous = from;
        self.state = target;
        self.error = detail;
        self.state_entered_at = Instant::now();

        info!(
            from = %from,
            to = %target,
            duration_ms = duration_ms,
            "state transition"
        );

        let icon = match target {
            State::Recording => Some(Icon::Recording),
            State::Processing => Some(Icon::Generating),
            State::Error => Some(Icon::Error),
            _ => None,
        };
        self.presenter.set_icon(icon);

        if target == State::Playback {
            self.scheduler
                .schedule(TimerKind::PlaybackReturn, self.timing.playback());
        }

        if target == State::AlarmTriggered {
            self.presenter.ensure_clock_running();
            // A stop left over from an earlier dismissal must not cut this alarm
            self.scheduler.cancel(TimerKind::AlarmAudioStop);
            self.presenter.set_alarm_audio(AudioCommand::Start {
                from: 0.0,
                to: 1.0,
                fade: ALARM_FADE_IN,
                looped: true,
            });
        }

        for observer in self.observers.iter_mut() {
            observer(self.state, self.previous);
        }

        let event = StateEvent::StateChanged {
            current: self.state,
            previous: self.previous,
            error: self.error.clone(),
        };
        debug!(%event, "emitting state event");
        let _ = self.event_tx.send(event);
    }

    /// State-entry effects on the display
    fn enter(&mut self, target: State) {
        self.presenter.state_entered(target);
        match target {
            State::Clock => self.presenter.refresh_clock(),
            State::AlarmSettingHour | State::AlarmSettingMinute => {
                self.presenter.show_alarm_time(self.alarm.settings());
            }
            _ => {}
        }

        // The indicator only belongs on the plain clock
        let indicator = if target == State::Clock {
            self.alarm.settings().indicator()
        } else {
            None
        };
        self.presenter.set_alarm_indicator(indicator);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::sync::oneshot;

    use super::*;
    use crate::backend::mock::{MockBackend, MockLog};
    use crate::render::recording::{Effect, Effects, RecordingPresenter};

    struct Harness {
        sm: StateMachine<RecordingPresenter, MockBackend>,
        input_tx: mpsc::Sender<Input>,
        input_rx: mpsc::Receiver<Input>,
        event_rx: broadcast::Receiver<StateEvent>,
        effects: Effects,
        log: MockLog,
        transitions: Arc<Mutex<Vec<(State, State)>>>,
    }

    impl Harness {
        fn transitions(&self) -> Vec<(State, State)> {
            self.transitions.lock().unwrap().clone()
        }

        /// Feed the next queued input (a timer fire or backend result) back
        /// into the machine
        async fn pump(&mut self) {
            let input = self.input_rx.recv().await.expect("input channel closed");
            self.sm.handle_input(input);
        }
    }

    fn create_harness(alarm: Option<AlarmSettings>) -> Harness {
        let (presenter, effects) = RecordingPresenter::new();
        let (backend, log) = MockBackend::new(alarm);
        let (input_tx, input_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = broadcast::channel(16);

        let mut sm = StateMachine::new(
            RuntimeConfig::default(),
            presenter,
            backend,
            input_tx.clone(),
            event_tx,
        );
        let transitions = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&transitions);
        sm.on_state_change(move |current, previous| {
            seen.lock().unwrap().push((current, previous));
        });

        Harness {
            sm,
            input_tx,
            input_rx,
            event_rx,
            effects,
            log,
            transitions,
        }
    }

    /// Harness already past startup, sitting on the clock
    fn at_clock(alarm: Option<AlarmSettings>) -> Harness {
        let mut h = create_harness(alarm);
        h.sm.transition(State::Clock, None);
        h.transitions.lock().unwrap().clear();
        h.effects.take();
        while h.event_rx.try_recv().is_ok() {}
        h
    }

    #[tokio::test]
    async fn test_initial_state() {
        let h = create_harness(None);
        assert_eq!(h.sm.state(), State::Startup);
        assert_eq!(h.sm.error(), None);
    }

    #[tokio::test]
    async fn test_startup_ignores_gestures() {
        let mut h = create_harness(None);
        h.sm.begin_startup();

        for gesture in Gesture::ALL {
            h.sm.handle_gesture(gesture);
            assert_eq!(h.sm.state(), State::Startup);
        }
        h.sm.handle_notice(BackendNotice::Failed {
            detail: "boom".to_string(),
        });

        assert_eq!(h.sm.state(), State::Startup);
        assert!(h.transitions().is_empty());
        assert!(h.event_rx.try_recv().is_err());
        assert!(!h.sm.scheduler.is_live(TimerKind::PlaybackReturn));
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_sequence_reaches_clock() {
        let mut h = create_harness(None);
        h.sm.begin_startup();

        assert_eq!(
            h.effects.take(),
            vec![Effect::HideClock, Effect::Logo(0.0), Effect::Logo(1.0)]
        );

        // Fade-in and hold elapsed
        h.pump().await;
        assert_eq!(h.sm.state(), State::Startup);
        assert_eq!(h.effects.take(), vec![Effect::Logo(0.0)]);

        // Fade-out elapsed
        h.pump().await;
        assert_eq!(h.sm.state(), State::Clock);
        assert_eq!(h.sm.previous_state(), State::Startup);
        assert!(h.effects.contains(&Effect::HideLogo));
        assert_eq!(h.transitions(), vec![(State::Clock, State::Startup)]);
    }

    #[tokio::test]
    async fn test_alarm_editing_scenario() {
        let mut h = at_clock(Some(AlarmSettings::new(7, 30, true)));

        h.sm.handle_gesture(Gesture::Hold);
        assert_eq!(h.sm.state(), State::Clock);
        h.pump().await;
        assert_eq!(h.sm.state(), State::AlarmSettingHour);
        assert_eq!(h.sm.alarm().hour, 7);

        h.sm.handle_gesture(Gesture::SingleTap);
        assert_eq!(h.sm.alarm().hour, 8);
        assert_eq!(h.log.saves.recv().await, Some((8, 30)));

        h.sm.handle_gesture(Gesture::Hold);
        assert_eq!(h.sm.state(), State::AlarmSettingMinute);

        h.sm.handle_gesture(Gesture::DoubleTap);
        assert_eq!(h.sm.alarm().minute, 29);
        assert_eq!(h.log.saves.recv().await, Some((8, 29)));

        h.sm.handle_gesture(Gesture::Hold);
        assert_eq!(h.sm.state(), State::Clock);
        assert!(h.effects.contains(&Effect::RefreshClock));
        // Back on the clock with an enabled 08:29 alarm
        assert!(h.effects.contains(&Effect::Indicator(Some((8, 29)))));

        assert_eq!(
            h.transitions(),
            vec![
                (State::AlarmSettingHour, State::Clock),
                (State::AlarmSettingMinute, State::AlarmSettingHour),
                (State::Clock, State::AlarmSettingMinute),
            ]
        );
    }

    #[tokio::test]
    async fn test_hour_editing_wraps() {
        let mut h = at_clock(Some(AlarmSettings::new(0, 0, true)));
        h.sm.handle_gesture(Gesture::Hold);
        h.pump().await;

        h.sm.handle_gesture(Gesture::DoubleTap);
        assert_eq!(h.sm.alarm().hour, 23);
        assert!(h.effects.contains(&Effect::AlarmTime(23, 0)));
        // Editing never transitions
        assert_eq!(h.transitions().len(), 1);
    }

    #[tokio::test]
    async fn test_alarm_load_failure_still_enters_editing() {
        let mut h = at_clock(None);
        h.sm.handle_gesture(Gesture::Hold);
        h.pump().await;

        assert_eq!(h.sm.state(), State::AlarmSettingHour);
        assert_eq!((h.sm.alarm().hour, h.sm.alarm().minute), (0, 0));
        assert!(h.sm.alarm().enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_alarm_load_does_not_hold_up_alarm() {
        let mut h = at_clock(Some(AlarmSettings::new(7, 30, true)));
        h.sm.backend.slow_reads(Duration::from_secs(5));

        h.sm.handle_gesture(Gesture::Hold);
        h.input_tx
            .send(Input::Gesture(Gesture::AlarmTriggered))
            .await
            .unwrap();

        let started = tokio::time::Instant::now();
        h.pump().await;
        assert_eq!(h.sm.state(), State::AlarmTriggered);
        assert!(started.elapsed() < Duration::from_millis(100));

        // The load lands after the alarm took over and is dropped
        h.pump().await;
        assert_eq!(h.sm.state(), State::AlarmTriggered);
        assert_eq!(h.transitions(), vec![(State::AlarmTriggered, State::Clock)]);
    }

    #[tokio::test]
    async fn test_alarm_load_dropped_after_leaving_clock() {
        let mut h = at_clock(Some(AlarmSettings::new(7, 30, true)));
        h.sm.handle_gesture(Gesture::Hold);
        h.sm.handle_gesture(Gesture::DoubleTap);
        assert_eq!(h.sm.state(), State::Recording);

        h.pump().await;
        assert_eq!(h.sm.state(), State::Recording);
        assert_eq!(h.transitions(), vec![(State::Recording, State::Clock)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_result_applies_outside_clock() {
        let mut h = at_clock(Some(AlarmSettings::new(6, 30, true)));
        h.sm.backend.slow_reads(Duration::from_secs(2));

        h.sm.handle_gesture(Gesture::TripleTap);
        h.sm.handle_gesture(Gesture::AlarmTriggered);
        h.effects.take();

        h.pump().await;
        assert_eq!(h.sm.state(), State::AlarmTriggered);
        assert!(!h.sm.alarm().enabled);
        // No indicator while the alarm screen is up
        assert!(h.effects.take().is_empty());
    }

    #[tokio::test]
    async fn test_alarm_due_reports_acceptance() {
        let mut h = create_harness(None);
        h.sm.begin_startup();

        let (accepted_tx, accepted_rx) = oneshot::channel();
        h.sm.handle_input(Input::AlarmDue(accepted_tx));
        assert_eq!(accepted_rx.await, Ok(false));
        assert_eq!(h.sm.state(), State::Startup);

        h.sm.transition(State::Clock, None);
        let (accepted_tx, accepted_rx) = oneshot::channel();
        h.sm.handle_input(Input::AlarmDue(accepted_tx));
        assert_eq!(accepted_rx.await, Ok(true));
        assert_eq!(h.sm.state(), State::AlarmTriggered);
    }

    #[tokio::test]
    async fn test_single_tap_stops_recording() {
        let mut h = at_clock(None);

        h.sm.handle_gesture(Gesture::DoubleTap);
        assert_eq!(h.sm.state(), State::Recording);
        assert!(h.effects.contains(&Effect::Icon(Some(Icon::Recording))));
        assert_eq!(h.log.commands.recv().await, Some(DreamCommand::StartRecording));

        h.sm.handle_gesture(Gesture::SingleTap);
        assert_eq!(h.sm.state(), State::Processing);
        assert!(h.effects.contains(&Effect::Icon(Some(Icon::Generating))));
        assert_eq!(h.log.commands.recv().await, Some(DreamCommand::StopRecording));
    }

    #[tokio::test]
    async fn test_double_tap_cancels_recording() {
        let mut h = at_clock(None);
        h.sm.handle_gesture(Gesture::DoubleTap);
        h.sm.handle_gesture(Gesture::DoubleTap);

        assert_eq!(h.sm.state(), State::Clock);
        assert_eq!(h.log.commands.recv().await, Some(DreamCommand::StartRecording));
        assert_eq!(h.log.commands.recv().await, Some(DreamCommand::CancelRecording));
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_reentry_keeps_one_timer() {
        let mut h = at_clock(None);

        h.sm.handle_gesture(Gesture::SingleTap);
        assert_eq!(h.sm.state(), State::Playback);
        assert!(h.sm.scheduler.is_live(TimerKind::PlaybackReturn));

        tokio::time::advance(Duration::from_secs(20)).await;
        h.sm.handle_gesture(Gesture::SingleTap);
        assert_eq!(h.sm.state(), State::Playback);
        assert_eq!(h.transitions().len(), 2);

        // Only the second timer fires, a full playback duration after re-entry
        h.pump().await;
        assert_eq!(h.sm.state(), State::Clock);
        assert_eq!(h.transitions().len(), 3);

        tokio::time::advance(Duration::from_secs(120)).await;
        tokio::task::yield_now().await;
        assert!(h.input_rx.try_recv().is_err());
        assert_eq!(h.log.commands.recv().await, Some(DreamCommand::PlayLatest));
        assert_eq!(h.log.commands.recv().await, Some(DreamCommand::PlayPrevious));
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaving_playback_cancels_return_timer() {
        let mut h = at_clock(None);
        h.sm.handle_gesture(Gesture::SingleTap);
        h.sm.handle_gesture(Gesture::DoubleTap);

        assert_eq!(h.sm.state(), State::Clock);
        assert!(!h.sm.scheduler.is_live(TimerKind::PlaybackReturn));

        tokio::time::advance(Duration::from_secs(120)).await;
        tokio::task::yield_now().await;
        assert!(h.input_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_alarm_overrides_playback_and_dismisses() {
        let mut h = at_clock(None);
        h.sm.handle_gesture(Gesture::SingleTap);
        h.effects.take();

        h.sm.handle_gesture(Gesture::AlarmTriggered);
        assert_eq!(h.sm.state(), State::AlarmTriggered);
        assert!(!h.sm.scheduler.is_live(TimerKind::PlaybackReturn));
        let effects = h.effects.take();
        assert!(effects.contains(&Effect::EnsureClock));
        assert!(effects.contains(&Effect::Audio(AudioCommand::Start {
            from: 0.0,
            to: 1.0,
            fade: ALARM_FADE_IN,
            looped: true,
        })));

        h.sm.handle_gesture(Gesture::SingleTap);
        assert_eq!(h.sm.state(), State::Clock);
        assert!(h.effects.contains(&Effect::Audio(AudioCommand::Fade {
            from: 1.0,
            to: 0.0,
            fade: ALARM_FADE_OUT,
        })));
        assert!(h.sm.scheduler.is_live(TimerKind::AlarmAudioStop));

        h.pump().await;
        assert!(h.effects.contains(&Effect::Audio(AudioCommand::Stop)));
        assert_eq!(h.sm.state(), State::Clock);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrigger_cancels_pending_audio_stop() {
        let mut h = at_clock(None);
        h.sm.handle_gesture(Gesture::AlarmTriggered);
        h.sm.handle_gesture(Gesture::SingleTap);
        assert!(h.sm.scheduler.is_live(TimerKind::AlarmAudioStop));

        h.sm.handle_gesture(Gesture::AlarmTriggered);
        assert!(!h.sm.scheduler.is_live(TimerKind::AlarmAudioStop));

        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert!(h.input_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_error_state_round_trip() {
        let mut h = at_clock(None);
        h.sm.handle_notice(BackendNotice::Failed {
            detail: "no dreams found".to_string(),
        });

        assert_eq!(h.sm.state(), State::Error);
        assert_eq!(h.sm.error(), Some("no dreams found"));
        assert!(h.effects.contains(&Effect::Icon(Some(Icon::Error))));
        assert_eq!(
            h.event_rx.try_recv().unwrap(),
            StateEvent::StateChanged {
                current: State::Error,
                previous: State::Clock,
                error: Some("no dreams found".to_string()),
            }
        );

        h.sm.handle_gesture(Gesture::DoubleTap);
        assert_eq!(h.sm.state(), State::Error);

        h.sm.handle_gesture(Gesture::SingleTap);
        assert_eq!(h.sm.state(), State::Clock);
        assert_eq!(h.sm.error(), None);
        assert!(h.effects.contains(&Effect::Icon(None)));
    }

    #[tokio::test]
    async fn test_video_ready_only_leaves_processing() {
        let mut h = at_clock(None);
        h.sm.handle_notice(BackendNotice::VideoReady);
        assert_eq!(h.sm.state(), State::Clock);

        h.sm.handle_gesture(Gesture::DoubleTap);
        h.sm.handle_gesture(Gesture::SingleTap);
        h.sm.handle_notice(BackendNotice::VideoReady);
        assert_eq!(h.sm.state(), State::Playback);
        assert!(h.sm.scheduler.is_live(TimerKind::PlaybackReturn));
    }

    #[tokio::test]
    async fn test_triple_tap_toggles_alarm() {
        let mut h = at_clock(Some(AlarmSettings::new(6, 30, true)));
        h.sm.handle_alarm_sync(AlarmSettings::new(6, 30, true));
        h.effects.take();

        h.sm.handle_gesture(Gesture::TripleTap);
        h.pump().await;
        assert_eq!(h.sm.state(), State::Clock);
        assert!(!h.sm.alarm().enabled);
        assert_eq!(h.effects.take(), vec![Effect::Indicator(None)]);
        assert_eq!(
            h.event_rx.try_recv().unwrap(),
            StateEvent::AlarmToggled { enabled: false }
        );

        h.sm.handle_gesture(Gesture::TripleTap);
        h.pump().await;
        assert_eq!(h.effects.take(), vec![Effect::Indicator(Some((6, 30)))]);
        assert!(h.transitions().is_empty());
    }

    #[tokio::test]
    async fn test_alarm_sync_ignored_while_editing() {
        let mut h = at_clock(Some(AlarmSettings::new(7, 30, true)));
        h.sm.handle_gesture(Gesture::Hold);
        h.pump().await;
        h.sm.handle_gesture(Gesture::SingleTap);

        h.sm.handle_alarm_sync(AlarmSettings::new(5, 0, false));
        assert_eq!(*h.sm.alarm(), AlarmSettings::new(8, 30, true));
    }

    #[tokio::test]
    async fn test_every_pair_makes_at_most_one_transition() {
        for state in State::ALL.into_iter().filter(|s| *s != State::Startup) {
            for gesture in Gesture::ALL {
                let mut h = at_clock(Some(AlarmSettings::new(7, 30, true)));
                h.sm.state = state;

                h.sm.handle_gesture(gesture);

                let transitions = h.transitions();
                assert!(
                    transitions.len() <= 1,
                    "{state} + {gesture} made {} transitions",
                    transitions.len()
                );
                if transitions.is_empty() {
                    assert_eq!(h.sm.state(), state, "{state} + {gesture} changed state silently");
                }
            }
        }
    }

    #[tokio::test]
    async fn test_unlisted_pairs_are_noops() {
        let unlisted = [
            (State::Processing, Gesture::SingleTap),
            (State::Processing, Gesture::Hold),
            (State::Recording, Gesture::Hold),
            (State::Playback, Gesture::TripleTap),
            (State::AlarmSettingHour, Gesture::TripleTap),
            (State::AlarmTriggered, Gesture::DoubleTap),
            (State::Error, Gesture::Hold),
        ];
        for (state, gesture) in unlisted {
            let mut h = at_clock(Some(AlarmSettings::new(7, 30, true)));
            h.sm.state = state;

            h.sm.handle_gesture(gesture);

            assert_eq!(h.sm.state(), state);
            assert!(h.transitions().is_empty());
            assert!(h.effects.take().is_empty(), "{state} + {gesture} had effects");
            assert!(!h.sm.scheduler.is_live(TimerKind::PlaybackReturn));
            assert!(!h.sm.scheduler.is_live(TimerKind::AlarmAudioStop));
        }
    }

    #[tokio::test]
    async fn test_observers_run_in_registration_order() {
        let mut h = at_clock(None);
        let order = Arc::new(Mutex::new(Vec::new()));
        for id in 1..=3 {
            let order = Arc::clone(&order);
            h.sm.on_state_change(move |current, _previous| {
                order.lock().unwrap().push((id, current));
            });
        }

        h.sm.handle_gesture(Gesture::DoubleTap);

        assert_eq!(
            *order.lock().unwrap(),
            vec![
                (1, State::Recording),
                (2, State::Recording),
                (3, State::Recording)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_drives_startup_then_gestures() {
        let h = create_harness(None);
        let Harness {
            mut sm,
            input_tx,
            input_rx,
            transitions,
            ..
        } = h;

        let task = tokio::spawn(async move {
            sm.run(input_rx).await;
            sm.state()
        });

        // Gestures during the logo sequence are dropped
        input_tx.send(Input::Gesture(Gesture::DoubleTap)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        input_tx.send(Input::Gesture(Gesture::DoubleTap)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            *transitions.lock().unwrap(),
            vec![(State::Clock, State::Startup), (State::Recording, State::Clock)]
        );
        task.abort();
    }
}
