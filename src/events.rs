//! Events emitted towards the UI layer.
//!
//! A [`TutorSession`](crate::TutorSession) never renders anything itself. It
//! reports progress through an [`EventSink`]; a webview bridge, a terminal
//! front-end or a test can each decide what to draw.
//!
//! # Example
//!
//! ```rust
//! use tutor_bridge::events::{UiEvent, event_line};
//!
//! let line = event_line(&UiEvent::Loading);
//! assert!(line.contains("\"loading\""));
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::client::Reply;
use crate::types::Message;

/// Something the UI should reflect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum UiEvent {
    /// Echo of the text the user just sent.
    #[serde(rename = "user.message")]
    UserMessage {
        /// Sent text.
        content: String,
    },

    /// A request is in flight.
    #[serde(rename = "loading")]
    Loading,

    /// The backend answered.
    #[serde(rename = "reply")]
    Reply {
        /// Normalized answer.
        reply: Box<Reply>,
        /// Ready-to-display text.
        rendered: String,
    },

    /// The request failed; `message` is safe to show to the user.
    #[serde(rename = "error")]
    Error {
        /// User-facing description.
        message: String,
    },

    /// An editor diagnostic was forwarded to the backend.
    #[serde(rename = "diagnostic.detected")]
    DetectedError {
        /// Diagnostic text.
        message: String,
        /// One-based line number.
        line: u32,
    },

    /// Prior messages were loaded for the current session.
    #[serde(rename = "history.loaded")]
    HistoryLoaded {
        /// Messages in order.
        messages: Vec<Message>,
    },
}

impl UiEvent {
    /// Build a reply event, rendering the reply once.
    #[must_use]
    pub fn reply(reply: Reply) -> Self {
        let rendered = reply.render();
        Self::Reply {
            reply: Box::new(reply),
            rendered,
        }
    }

    /// Stable event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserMessage { .. } => "user.message",
            Self::Loading => "loading",
            Self::Reply { .. } => "reply",
            Self::Error { .. } => "error",
            Self::DetectedError { .. } => "diagnostic.detected",
            Self::HistoryLoaded { .. } => "history.loaded",
        }
    }
}

/// Serialize an event as a single JSON line.
pub fn event_line(evt: &UiEvent) -> String {
    serde_json::to_string(evt).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "data": { "message": e.to_string() } }).to_string()
    })
}

/// Receiver of [`UiEvent`]s.
pub trait EventSink: Send + Sync + std::fmt::Debug {
    /// Deliver an event. Must not block.
    fn emit(&self, event: UiEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: UiEvent) {}
}

/// Forwards events into a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that observes it.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: UiEvent) {
        // A closed receiver means the UI went away.
        let _ = self.tx.send(event);
    }
}
