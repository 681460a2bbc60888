//! Test doubles shared by the session and tracker tests.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::session::{AppId, UsageStore};

/// A store call, recorded in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Resolve(String),
    AddDuration(AppId, i64),
    RecordOpen(AppId),
}

/// Error returned by a [`RecordingStore`] switched into failure mode.
#[derive(Debug)]
pub struct StoreUnavailable;

impl fmt::Display for StoreUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store unavailable")
    }
}

impl std::error::Error for StoreUnavailable {}

/// In-memory [`UsageStore`] that records every call.
///
/// Clones share the same underlying log, so a test can hand one clone to the
/// state machine and keep another for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    apps: Vec<String>,
    calls: Vec<StoreCall>,
    failing: bool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When failing, every store call errors without recording anything.
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().unwrap().failing = failing;
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// The id a class resolved to. Panics if the class was never resolved.
    pub fn app_id(&self, class: &str) -> AppId {
        let inner = self.inner.lock().unwrap();
        let index = inner
            .apps
            .iter()
            .position(|known| known == class)
            .unwrap_or_else(|| panic!("class {class} was never resolved"));
        to_app_id(index)
    }

    /// All `(app, seconds)` duration writes, in order.
    pub fn durations(&self) -> Vec<(AppId, i64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::AddDuration(app_id, seconds) => Some((app_id, seconds)),
                _ => None,
            })
            .collect()
    }

    /// All open-count increments, in order.
    pub fn open_counts(&self) -> Vec<AppId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::RecordOpen(app_id) => Some(app_id),
                _ => None,
            })
            .collect()
    }

    pub fn total_seconds(&self, app_id: AppId) -> i64 {
        self.durations()
            .into_iter()
            .filter(|(id, _)| *id == app_id)
            .map(|(_, seconds)| seconds)
            .sum()
    }
}

fn to_app_id(index: usize) -> AppId {
    i64::try_from(index).expect("test app count fits in i64") + 1
}

impl UsageStore for RecordingStore {
    type Error = StoreUnavailable;

    fn resolve_app(&mut self, class: &str) -> Result<AppId, Self::Error> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing {
            return Err(StoreUnavailable);
        }
        inner.calls.push(StoreCall::Resolve(class.to_string()));
        let index = match inner.apps.iter().position(|known| known == class) {
            Some(index) => index,
            None => {
                inner.apps.push(class.to_string());
                inner.apps.len() - 1
            }
        };
        Ok(to_app_id(index))
    }

    fn add_duration(&mut self, app_id: AppId, seconds: i64) -> Result<(), Self::Error> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing {
            return Err(StoreUnavailable);
        }
        inner.calls.push(StoreCall::AddDuration(app_id, seconds));
        Ok(())
    }

    fn record_open(&mut self, app_id: AppId) -> Result<(), Self::Error> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing {
            return Err(StoreUnavailable);
        }
        inner.calls.push(StoreCall::RecordOpen(app_id));
        Ok(())
    }
}
