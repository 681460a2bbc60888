//! Window-focus tracking core for the Hyprland screen-time daemon.
//!
//! This crate contains the tracking engine:
//! - IPC: the two-socket Hyprland client (queries + event subscription)
//! - Event decoding: the `type>>payload` line format
//! - Session: the focus state machine and duration accounting
//! - Tracker: the orchestrator wiring events to transitions
//!
//! Persistence is consumed through the [`UsageStore`] trait; the SQLite
//! implementation lives in `ht-db`.

pub mod event;
pub mod ipc;
pub mod session;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testutil;

pub use event::WindowEvent;
pub use ipc::{ActiveWindow, EventStream, HyprlandIpc, IpcError};
pub use session::{AppId, Session, SessionState, UsageStore};
pub use tracker::Tracker;
