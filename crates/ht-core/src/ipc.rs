//! Hyprland IPC client.
//!
//! Hyprland exposes two Unix sockets per instance under
//! `$XDG_RUNTIME_DIR/hypr/$HYPRLAND_INSTANCE_SIGNATURE/`:
//!
//! - `.socket.sock`: request/response, one command per connection.
//! - `.socket2.sock`: a stream of newline-terminated event lines.
//!
//! The client holds no connection state of its own. Queries open a short-lived
//! connection per call; [`HyprlandIpc::subscribe`] opens the one long-lived
//! event connection and hands back an [`EventStream`].

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Command string for the active-window query; the `j/` prefix requests JSON.
const ACTIVE_WINDOW_COMMAND: &[u8] = b"j/activewindow";

/// Upper bound on a single request-socket reply.
const REPLY_BUFFER_SIZE: usize = 8192;

/// Backlog of undispatched event lines before the reader applies backpressure.
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Errors from compositor IPC.
#[derive(Debug, Error)]
pub enum IpcError {
    /// The instance signature is missing from the environment, so no socket
    /// path can be derived. Fatal at startup.
    #[error("HYPRLAND_INSTANCE_SIGNATURE is not set; is Hyprland running?")]
    MissingInstance,

    /// Socket connect/read/write failure.
    #[error("compositor socket I/O failed")]
    Io(#[from] std::io::Error),

    /// The compositor's reply was not the expected JSON object.
    #[error("malformed compositor reply")]
    Decode(#[from] serde_json::Error),
}

/// Snapshot of the currently focused window, as reported by the compositor.
///
/// All fields default to empty: Hyprland replies with an empty object when no
/// window has focus (e.g. the desktop background), and the tracker treats an
/// empty `class` or `address` as "no focus".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActiveWindow {
    pub address: String,
    pub class: String,
    pub title: String,
    pub initial_class: String,
    pub initial_title: String,
}

/// Client for the two Hyprland IPC sockets.
#[derive(Debug, Clone)]
pub struct HyprlandIpc {
    request_path: PathBuf,
    event_path: PathBuf,
}

impl HyprlandIpc {
    /// Resolves socket paths from `HYPRLAND_INSTANCE_SIGNATURE` and
    /// `XDG_RUNTIME_DIR` (falling back to `/run/user/$UID`).
    pub fn from_env() -> Result<Self, IpcError> {
        let instance = std::env::var("HYPRLAND_INSTANCE_SIGNATURE")
            .ok()
            .filter(|value| !value.is_empty())
            .ok_or(IpcError::MissingInstance)?;

        let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| format!("/run/user/{}", std::env::var("UID").unwrap_or_default()));

        Ok(Self::with_runtime_dir(runtime_dir, &instance))
    }

    /// Builds a client from an explicit runtime directory and instance
    /// signature.
    pub fn with_runtime_dir(runtime_dir: impl AsRef<Path>, instance: &str) -> Self {
        let base = runtime_dir.as_ref().join("hypr").join(instance);
        Self {
            request_path: base.join(".socket.sock"),
            event_path: base.join(".socket2.sock"),
        }
    }

    /// Queries the currently focused window.
    ///
    /// Opens an ephemeral connection, writes the query command, and reads a
    /// single bounded reply. Blocks the calling task until the compositor
    /// responds or the connection errors.
    pub async fn active_window(&self) -> Result<ActiveWindow, IpcError> {
        let mut conn = UnixStream::connect(&self.request_path).await?;
        conn.write_all(ACTIVE_WINDOW_COMMAND).await?;

        let mut buf = vec![0u8; REPLY_BUFFER_SIZE];
        let n = conn.read(&mut buf).await?;
        Ok(serde_json::from_slice(&buf[..n])?)
    }

    /// Opens the long-lived event connection and starts forwarding lines.
    ///
    /// The returned stream yields trimmed, non-empty event lines in arrival
    /// order. It is not restartable: when the connection errors or the
    /// compositor closes it, the reader logs the cause and the stream
    /// terminates (`recv` returns `None`).
    pub async fn subscribe(&self) -> Result<EventStream, IpcError> {
        let conn = UnixStream::connect(&self.event_path).await?;
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(conn).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        if tx.send(line.to_string()).await.is_err() {
                            // Receiver dropped; the tracker is shutting down.
                            return;
                        }
                    }
                    Ok(None) => {
                        tracing::error!("compositor closed the event socket");
                        return;
                    }
                    Err(error) => {
                        tracing::error!(%error, "failed to read compositor events");
                        return;
                    }
                }
            }
        });

        Ok(EventStream { rx, reader })
    }
}

/// Live sequence of event lines from the compositor.
///
/// Dropping the stream aborts the reader task and releases the connection.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<String>,
    reader: JoinHandle<()>,
}

impl EventStream {
    /// Receives the next event line, or `None` once the underlying connection
    /// has terminated and all buffered lines were drained.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
