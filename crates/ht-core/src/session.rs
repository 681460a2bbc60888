//! Session state machine: turns focus/open/close events into durations.
//!
//! The machine is either idle or tracking exactly one [`Session`], the window
//! currently holding focus. Every transition takes an explicit `now` so the
//! accounting logic stays deterministic under test; the orchestrator supplies
//! wall-clock time.
//!
//! Accounting rule, identical on every flush path: elapsed time is measured
//! from the last flush if one happened for this session, otherwise from the
//! session start. A non-positive duration (clock anomaly, back-to-back
//! flushes) skips the store write.

use chrono::{DateTime, Utc};

use crate::ipc::ActiveWindow;

/// Opaque key for an application row in the usage store.
pub type AppId = i64;

/// Durable per-app usage counters, keyed by window class.
///
/// Implementations must make each call atomic for a given app: a concurrent
/// duration add and open-count increment must not lose an update.
pub trait UsageStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the app for a window class, creating it if needed. Idempotent;
    /// also touches the app's last-seen timestamp.
    fn resolve_app(&mut self, class: &str) -> Result<AppId, Self::Error>;

    /// Adds focused seconds to the app's all-time and current-day totals.
    /// Must be a no-op for `seconds <= 0`.
    fn add_duration(&mut self, app_id: AppId, seconds: i64) -> Result<(), Self::Error>;

    /// Increments the app's all-time and current-day open counters.
    fn record_open(&mut self, app_id: AppId) -> Result<(), Self::Error>;
}

/// The window currently holding focus.
///
/// The address is the identity key: it distinguishes "same window still
/// focused" from a genuine focus change within the same application class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub app_id: AppId,
    pub class: String,
    pub title: String,
    pub address: String,
    pub started_at: DateTime<Utc>,
}

/// Whether a flush keeps the session alive or ends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flush {
    /// Periodic flush: the window is still focused, advance the anchor.
    Keep,
    /// Close, focus change, or shutdown: the session ends with this flush.
    Discard,
}

/// Focus-tracking state machine over a [`UsageStore`].
///
/// Store failures are logged and the in-memory state still advances; losing
/// one increment is preferred over stalling tracking. The exception is
/// resolving the app for a *new* session, which the transition cannot
/// complete without.
#[derive(Debug)]
pub struct SessionState<S> {
    store: S,
    session: Option<Session>,
    last_flush: Option<DateTime<Utc>>,
}

impl<S: UsageStore> SessionState<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            session: None,
            last_flush: None,
        }
    }

    /// The current session, if any.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Applies an active-window snapshot taken after a focus-change event.
    ///
    /// Empty class or address means the compositor reported a null focus
    /// (e.g. the desktop background): no transition. A snapshot matching the
    /// current session's address is a no-op. Otherwise the old session (if
    /// any) is flushed and discarded and a new one starts at `now`.
    pub fn apply_focus(&mut self, window: &ActiveWindow, now: DateTime<Utc>) {
        if window.class.is_empty() || window.address.is_empty() {
            return;
        }
        if self
            .session
            .as_ref()
            .is_some_and(|session| session.address == window.address)
        {
            return;
        }

        self.flush(now, Flush::Discard);

        let app_id = match self.store.resolve_app(&window.class) {
            Ok(app_id) => app_id,
            Err(error) => {
                // The old session was already flushed; stay idle rather than
                // track time against an app row we could not resolve.
                tracing::error!(%error, class = %window.class, "failed to resolve app for focus change");
                return;
            }
        };

        self.session = Some(Session {
            app_id,
            class: window.class.clone(),
            title: window.title.clone(),
            address: window.address.clone(),
            started_at: now,
        });
        self.last_flush = None;
        tracing::info!(class = %window.class, title = %window.title, "focus changed");
    }

    /// Records a window-open event. Focus state is untouched; a window can
    /// open without gaining focus.
    pub fn apply_open(&mut self, class: &str) {
        let app_id = match self.store.resolve_app(class) {
            Ok(app_id) => app_id,
            Err(error) => {
                tracing::error!(%error, class, "failed to resolve app for window open");
                return;
            }
        };
        if let Err(error) = self.store.record_open(app_id) {
            tracing::error!(%error, class, "failed to record window open");
            return;
        }
        tracing::debug!(class, "window opened");
    }

    /// Records a window-close event. Only a close matching the current
    /// session's address ends the session; background windows closing are
    /// no-ops.
    pub fn apply_close(&mut self, address: &str, now: DateTime<Utc>) {
        if self
            .session
            .as_ref()
            .is_some_and(|session| session.address == address)
        {
            self.flush(now, Flush::Discard);
        }
    }

    /// Timer-driven flush: persists elapsed time and keeps the session.
    pub fn flush_periodic(&mut self, now: DateTime<Utc>) {
        self.flush(now, Flush::Keep);
    }

    /// Final flush on shutdown; leaves the machine idle.
    pub fn shutdown(&mut self, now: DateTime<Utc>) {
        self.flush(now, Flush::Discard);
    }

    fn flush(&mut self, now: DateTime<Utc>, disposition: Flush) {
        let Some(session) = self.session.as_ref() else {
            return;
        };

        let anchor = self.last_flush.unwrap_or(session.started_at);
        let seconds = (now - anchor).num_seconds();
        if seconds > 0 {
            match self.store.add_duration(session.app_id, seconds) {
                Ok(()) => tracing::debug!(class = %session.class, seconds, "flushed usage"),
                Err(error) => {
                    tracing::error!(%error, class = %session.class, seconds, "failed to flush usage");
                }
            }
        }

        match disposition {
            Flush::Keep => self.last_flush = Some(now),
            Flush::Discard => {
                tracing::debug!(class = %session.class, "session ended");
                self.session = None;
                self.last_flush = None;
            }
        }
    }
}
