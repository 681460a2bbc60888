//! Decoder for the compositor's event-socket line format.
//!
//! Hyprland streams one event per line as `<type>>><payload>`. Only the four
//! events the tracker cares about are decoded; everything else is ignored.

/// A decoded window event from the compositor's event socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    /// Input focus moved to a different window (`activewindow`).
    ///
    /// The payload (`class,title`) is not trusted: the tracker re-queries the
    /// full active-window snapshot over the request socket instead.
    FocusChanged,
    /// Address-keyed focus change (`activewindowv2`). Treated identically to
    /// [`WindowEvent::FocusChanged`]; newer compositor versions emit both.
    FocusChangedV2,
    /// A window was created (`openwindow`).
    Opened { address: String, class: String },
    /// A window was destroyed (`closewindow`).
    Closed { address: String },
}

impl WindowEvent {
    /// Decodes a single event line.
    ///
    /// Returns `None` for lines without the `>>` delimiter, unknown event
    /// types, and `openwindow` payloads too short to carry a class. Never
    /// fails.
    pub fn parse(line: &str) -> Option<Self> {
        let (kind, payload) = line.split_once(">>")?;
        match kind.trim() {
            "activewindow" => Some(Self::FocusChanged),
            "activewindowv2" => Some(Self::FocusChangedV2),
            "openwindow" => parse_open(payload.trim()),
            "closewindow" => Some(Self::Closed {
                address: payload.trim().to_string(),
            }),
            _ => None,
        }
    }
}

/// Payload is `address,workspace,class,title`. The split is capped at four
/// fields because titles may themselves contain commas.
fn parse_open(payload: &str) -> Option<WindowEvent> {
    let mut fields = payload.splitn(4, ',');
    let address = fields.next()?.trim();
    let _workspace = fields.next()?;
    let class = fields.next()?.trim();
    if class.is_empty() {
        return None;
    }
    Some(WindowEvent::Opened {
        address: address.to_string(),
        class: class.to_string(),
    })
}
