//! Tracker orchestration: event stream in, state-machine transitions out.
//!
//! Two workers run until shutdown. The event worker drains the subscription
//! stream *sequentially*, so transitions apply in arrival order; the
//! same-window check and open/close pairing depend on that. The flush worker
//! ticks on a fixed interval and persists the current session's elapsed time.
//!
//! Session state lives behind one async mutex. The blocking active-window
//! query always runs before the lock is taken; nothing holds the lock across
//! socket I/O.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::event::WindowEvent;
use crate::ipc::{HyprlandIpc, IpcError};
use crate::session::{SessionState, UsageStore};

/// A running focus tracker.
///
/// Created with [`Tracker::start`]; must be shut down with [`Tracker::stop`]
/// for the final flush to happen.
pub struct Tracker<S> {
    state: Arc<Mutex<SessionState<S>>>,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl<S> Tracker<S>
where
    S: UsageStore + Send + 'static,
{
    /// Subscribes to compositor events and spawns the workers.
    ///
    /// Fails only on IPC setup (the subscription connect); per-event errors
    /// after startup are contained and logged.
    pub async fn start(
        ipc: HyprlandIpc,
        store: S,
        flush_interval: Duration,
    ) -> Result<Self, IpcError> {
        let mut events = ipc.subscribe().await?;
        let state = Arc::new(Mutex::new(SessionState::new(store)));
        let cancel = CancellationToken::new();

        let event_worker = tokio::spawn({
            let state = Arc::clone(&state);
            let cancel = cancel.clone();
            async move {
                // Whatever already has focus counts from startup.
                handle_focus_change(&ipc, &state).await;

                loop {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        line = events.recv() => match line {
                            Some(line) => dispatch(&ipc, &state, &line).await,
                            None => {
                                // Known gap: the subscription is not
                                // restartable, so tracking halts here while
                                // the periodic flush keeps draining whatever
                                // session is still open.
                                tracing::warn!(
                                    "compositor event stream terminated; no further window events will be tracked"
                                );
                                break;
                            }
                        },
                    }
                }
            }
        });

        let flush_worker = tokio::spawn({
            let state = Arc::clone(&state);
            let cancel = cancel.clone();
            async move {
                let mut ticker = tokio::time::interval(flush_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // An interval's first tick completes immediately; skip it.
                ticker.tick().await;

                loop {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        _ = ticker.tick() => state.lock().await.flush_periodic(Utc::now()),
                    }
                }
            }
        });

        tracing::info!("tracking started");
        Ok(Self {
            state,
            cancel,
            workers: vec![event_worker, flush_worker],
        })
    }

    /// Cooperative shutdown: stops both workers, waits for any in-flight
    /// transition, then flushes the current session exactly once.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        for worker in self.workers.drain(..) {
            if let Err(error) = worker.await {
                if !error.is_cancelled() {
                    tracing::error!(%error, "tracker worker failed");
                }
            }
        }
        self.state.lock().await.shutdown(Utc::now());
        tracing::info!("tracker stopped");
    }
}

/// Applies one decoded event. Runs on the single event worker, so events can
/// never interleave.
async fn dispatch<S: UsageStore>(ipc: &HyprlandIpc, state: &Mutex<SessionState<S>>, line: &str) {
    tracing::trace!(line, "event received");
    match WindowEvent::parse(line) {
        Some(WindowEvent::FocusChanged | WindowEvent::FocusChangedV2) => {
            handle_focus_change(ipc, state).await;
        }
        Some(WindowEvent::Opened { class, .. }) => state.lock().await.apply_open(&class),
        Some(WindowEvent::Closed { address }) => {
            state.lock().await.apply_close(&address, Utc::now());
        }
        None => {}
    }
}

/// Re-queries the full active-window snapshot and applies it. The query runs
/// before the state lock is acquired; a failed query aborts only this
/// transition and leaves the previous session running.
async fn handle_focus_change<S: UsageStore>(ipc: &HyprlandIpc, state: &Mutex<SessionState<S>>) {
    let window = match ipc.active_window().await {
        Ok(window) => window,
        Err(error) => {
            tracing::error!(%error, "failed to query active window");
            return;
        }
    };
    state.lock().await.apply_focus(&window, Utc::now());
}
