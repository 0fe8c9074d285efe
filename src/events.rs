//! Controller events pushed to the page.
//!
//! Every state mutation of a [`Controller`](crate::controller::Controller)
//! emits one [`ControllerEvent`]. The page subscribes over Server-Sent Events
//! and applies them to the DOM; the SSE `event:` name equals the serialized
//! `type` tag so `EventSource` listeners can route on it.
//!
//! # Example
//!
//! ```rust
//! use career_mentor::events::{ControllerEvent, event_name};
//!
//! let event = ControllerEvent::StreamDone {
//!     session_id: "abc".to_string(),
//! };
//! let json = serde_json::to_value(&event).unwrap();
//! assert_eq!(json["type"], "stream.done");
//! assert_eq!(event_name(&event), "stream.done");
//! ```

use axum::response::sse::Event;
use serde::Serialize;

use crate::session::ChatMessage;
use crate::usage::UsageSnapshot;

use crate::controller::SessionView;

/// Events emitted by the controller.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ControllerEvent {
    // ─────────────────────────────────────────────────────────────────────
    // Session lifecycle
    // ─────────────────────────────────────────────────────────────────────
    /// A session became active, freshly created or reactivated.
    #[serde(rename = "session.selected")]
    SessionSelected {
        session: SessionView,
        /// False when an existing session was reactivated.
        created: bool,
    },

    /// A session was removed.
    #[serde(rename = "session.deleted")]
    SessionDeleted {
        session_id: String,
        /// Session active after the deletion.
        active_session_id: String,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Messages
    // ─────────────────────────────────────────────────────────────────────
    /// A message was appended to a session.
    #[serde(rename = "message.appended")]
    MessageAppended {
        session_id: String,
        index: usize,
        message: ChatMessage,
    },

    /// Streamed playback revealed more of the tail message.
    #[serde(rename = "message.updated")]
    MessageUpdated {
        session_id: String,
        index: usize,
        content: String,
        is_streaming: bool,
    },

    /// Playback finished; the tail message is final.
    #[serde(rename = "stream.done")]
    StreamDone { session_id: String },

    // ─────────────────────────────────────────────────────────────────────
    // Gate and latch
    // ─────────────────────────────────────────────────────────────────────
    /// The in-flight latch flipped.
    #[serde(rename = "loading.changed")]
    LoadingChanged { is_loading: bool },

    /// Counter or overlay visibility changed.
    #[serde(rename = "usage.changed")]
    UsageChanged(UsageSnapshot),
}

/// Get the SSE event name for a [`ControllerEvent`].
pub fn event_name(evt: &ControllerEvent) -> &'static str {
    match evt {
        ControllerEvent::SessionSelected { .. } => "session.selected",
        ControllerEvent::SessionDeleted { .. } => "session.deleted",
        ControllerEvent::MessageAppended { .. } => "message.appended",
        ControllerEvent::MessageUpdated { .. } => "message.updated",
        ControllerEvent::StreamDone { .. } => "stream.done",
        ControllerEvent::LoadingChanged { .. } => "loading.changed",
        ControllerEvent::UsageChanged(_) => "usage.changed",
    }
}

fn to_json(evt: &ControllerEvent) -> String {
    serde_json::to_string(evt).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "data": { "message": e.to_string() } }).to_string()
    })
}

/// Convert a [`ControllerEvent`] to an axum SSE [`Event`].
pub fn to_sse(evt: &ControllerEvent) -> Event {
    Event::default().event(event_name(evt)).data(to_json(evt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_updated_serialization() {
        let event = ControllerEvent::MessageUpdated {
            session_id: "s1".to_string(),
            index: 3,
            content: "Hello there".to_string(),
            is_streaming: true,
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message.updated");
        assert_eq!(json["data"]["index"], 3);
        assert_eq!(json["data"]["content"], "Hello there");
    }

    #[test]
    fn test_name_matches_tag() {
        let event = ControllerEvent::SessionDeleted {
            session_id: "s".to_string(),
            active_session_id: "t".to_string(),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event_name(&event));
    }
}
