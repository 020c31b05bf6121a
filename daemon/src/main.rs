//! dream-recorder-daemon: display and alarm controller for the bedside
//! dream recorder
//!
//! This daemon runs on the appliance and provides:
//! - Explicit state machine for the clock, alarm, recording and playback
//!   displays, driven by tap/hold gestures
//! - Alarm watcher raising the alarm at the stored time of day
//! - IPC server through which the sensor driver delivers gestures and the
//!   backend service reports pipeline results
//!
//! Out of scope: audio encoding, video generation, sensor debouncing.

mod alarm;
mod backend;
mod config;
mod events;
mod ipc;
mod lifecycle;
mod render;
mod state;
mod timer;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::alarm::AlarmWatcher;
use crate::backend::{Backend, HttpBackend};
use crate::config::{Config, RuntimeConfig};
use crate::events::StateEvent;
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::render::LogPresenter;
use crate::state::StateMachine;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "dream-recorder-daemon starting"
    );

    let mut shutdown = ShutdownSignal::new()?;

    // Load configuration
    let config = Config::load()?;
    info!(
        ?config.socket_path,
        backend = %config.backend_url,
        "configuration loaded"
    );

    let backend = HttpBackend::new(&config.backend_url, config.request_timeout)?;

    // Display timings are fixed for the process lifetime
    let timing = match backend.fetch_config().await {
        Ok(timing) => {
            info!(?timing, "runtime config loaded");
            timing
        }
        Err(e) => {
            error!(error = %e, "failed to load runtime config, using built-in timings");
            RuntimeConfig::default()
        }
    };

    // Gesture sources, timers and the alarm watcher -> state machine
    let (input_tx, input_rx) = mpsc::channel(32);
    // State machine -> IPC server
    let (event_tx, _event_rx) = broadcast::channel::<StateEvent>(64);

    let mut state_machine = StateMachine::new(
        timing,
        LogPresenter::new(timing),
        backend.clone(),
        input_tx.clone(),
        event_tx.clone(),
    );
    state_machine.on_state_change(|current, previous| {
        debug!(%current, %previous, "state observer notified");
    });

    let watcher = AlarmWatcher::new(backend, input_tx.clone(), config.alarm_poll_interval);
    let watcher_task = tokio::spawn(watcher.run());

    let server = Server::new(&config.socket_path, input_tx, event_tx.clone())?;

    // Subscribe to state events for the IPC status snapshot
    let mut status_rx = event_tx.subscribe();
    let server_for_events = &server;

    info!("daemon initialized, entering main loop");

    tokio::select! {
        // Run the state machine (startup sequence, then inputs)
        _ = state_machine.run(input_rx) => {
            info!("state machine exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Keep the status snapshot in step with the machine
        _ = async {
            loop {
                match status_rx.recv().await {
                    Ok(StateEvent::StateChanged { current, previous, error }) => {
                        server_for_events.set_state(current, previous, error).await;
                    }
                    Ok(StateEvent::AlarmToggled { .. }) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "state event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("state event handler exited");
        }

        // Wait for shutdown signal
        signal = shutdown.wait() => {
            info!(signal, "shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    watcher_task.abort();
    server.shutdown().await;

    info!(
        state = %state_machine.state(),
        previous = %state_machine.previous_state(),
        error = state_machine.error().unwrap_or("none"),
        alarm = %state_machine.alarm(),
        "final state"
    );
    drop(state_machine);

    info!("dream-recorder-daemon stopped");

    Ok(())
}
