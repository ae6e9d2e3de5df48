//! Local conversation transcripts.
//!
//! [`TranscriptRegistry`] replaces a process-global map of open views keyed by
//! session id. It is owned by the application and handed to each
//! [`TutorSession`](super::TutorSession), so any UI can read what was said
//! without reaching for ambient state.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::types::Message;

/// Messages exchanged in one session, in insertion order.
#[derive(Debug, Clone)]
pub struct Transcript {
    inner: Arc<TranscriptInner>,
}

#[derive(Debug)]
struct TranscriptInner {
    session_id: String,
    messages: RwLock<Vec<Message>>,
    last_activity: RwLock<DateTime<Utc>>,
}

impl Transcript {
    fn new(session_id: String) -> Self {
        Self {
            inner: Arc::new(TranscriptInner {
                session_id,
                messages: RwLock::new(Vec::new()),
                last_activity: RwLock::new(Utc::now()),
            }),
        }
    }

    /// Session this transcript belongs to.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// Append a message.
    pub fn push(&self, message: Message) {
        let mut guard = self.inner.messages.write().unwrap_or_else(PoisonError::into_inner);
        guard.push(message);
        drop(guard);
        self.touch();
    }

    /// Replace the transcript, e.g. with history loaded from the backend.
    pub fn replace(&self, messages: Vec<Message>) {
        let mut guard = self.inner.messages.write().unwrap_or_else(PoisonError::into_inner);
        *guard = messages;
        drop(guard);
        self.touch();
    }

    /// Snapshot of all messages.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.inner.messages.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.messages.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing has been said yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all messages.
    pub fn clear(&self) {
        self.inner.messages.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.touch();
    }

    /// Time of the last change.
    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        *self.inner.last_activity.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self) {
        let mut guard = self.inner.last_activity.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Utc::now();
    }
}

/// Thread-safe registry of transcripts keyed by session id.
#[derive(Debug, Clone, Default)]
pub struct TranscriptRegistry {
    inner: Arc<RwLock<HashMap<String, Transcript>>>,
}

impl TranscriptRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a transcript by session id.
    #[must_use]
    pub fn get(&self, session_id: &str) -> Option<Transcript> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).get(session_id).cloned()
    }

    /// Get a transcript, creating an empty one if needed.
    #[must_use]
    pub fn get_or_create(&self, session_id: &str) -> Transcript {
        {
            let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(transcript) = guard.get(session_id) {
                return transcript.clone();
            }
        }

        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard
            .entry(session_id.to_string())
            .or_insert_with(|| Transcript::new(session_id.to_string()))
            .clone()
    }

    /// Drop a transcript.
    pub fn remove(&self, session_id: &str) -> Option<Transcript> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner).remove(session_id)
    }

    /// Number of tracked sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no session is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All tracked session ids.
    #[must_use]
    pub fn list_ids(&self) -> Vec<String> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect()
    }
}
