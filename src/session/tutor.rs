//! The chat session client.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::manager::{Session, SessionManager};
use super::store::{MemoryStateStore, StateStore};
use super::transcript::TranscriptRegistry;
use crate::client::history::sync_message;
use crate::client::{AskRequest, BackendClient, HistorySync, Reply, RequestLog};
use crate::error::{Error, Result};
use crate::events::{EventSink, NullSink, UiEvent};
use crate::types::{DiagnosticReport, Message, Mode, Severity};

/// Lifecycle of a session as seen by this client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No session has been loaded or created yet.
    #[default]
    Uninitialized,
    /// A session exists and can be used.
    Active,
    /// History was cleared; the next `ask` reactivates the session.
    Cleared,
}

/// Behaviour switches for [`TutorSession`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Start a fresh session id after clearing history.
    #[serde(default)]
    pub rotate_on_clear: bool,
    /// Ask the backend to allocate new session ids.
    #[serde(default)]
    pub server_assigned: bool,
}

/// Session-scoped exchange with a tutor backend.
///
/// Owns the session id, sends questions with endpoint fallback, mirrors each
/// turn to the remote history without ever letting that mirror affect the
/// answer, and reports progress to an [`EventSink`].
///
/// Must be created inside a tokio runtime: the history worker is spawned on
/// construction.
#[derive(Debug)]
pub struct TutorSession {
    client: BackendClient,
    sessions: SessionManager,
    history: HistorySync,
    transcripts: TranscriptRegistry,
    sink: Arc<dyn EventSink>,
    options: SessionOptions,
    state: Mutex<SessionState>,
    /// Held shared by each exchange and exclusively by `clear_history`.
    exchanges: RwLock<()>,
}

impl TutorSession {
    /// Create a session client with an in-memory state store.
    #[must_use]
    pub fn new(client: BackendClient) -> Self {
        Self::with_store(client, Arc::new(MemoryStateStore::new()), Mode::default())
    }

    /// Create a session client persisting its id in `store`.
    #[must_use]
    pub fn with_store(client: BackendClient, store: Arc<dyn StateStore>, default_mode: Mode) -> Self {
        let history = HistorySync::spawn(client.clone());
        Self::with_parts(client, store, default_mode, history)
    }

    /// Create a session client from an existing history handle.
    ///
    /// Unlike [`with_store`](Self::with_store) this spawns nothing.
    #[must_use]
    pub fn with_parts(
        client: BackendClient,
        store: Arc<dyn StateStore>,
        default_mode: Mode,
        history: HistorySync,
    ) -> Self {
        Self {
            client,
            sessions: SessionManager::new(store, default_mode),
            history,
            transcripts: TranscriptRegistry::new(),
            sink: Arc::new(NullSink),
            options: SessionOptions::default(),
            state: Mutex::new(SessionState::Uninitialized),
            exchanges: RwLock::new(()),
        }
    }

    /// Report UI events to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Share a transcript registry with other components.
    #[must_use]
    pub fn with_transcripts(mut self, transcripts: TranscriptRegistry) -> Self {
        self.transcripts = transcripts;
        self
    }

    /// Set behaviour switches.
    #[must_use]
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Underlying HTTP client.
    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    /// Transcript registry.
    pub fn transcripts(&self) -> &TranscriptRegistry {
        &self.transcripts
    }

    /// Whether turns are mirrored to the backend history.
    pub fn history_enabled(&self) -> bool {
        self.history.is_enabled()
    }

    /// Log of recent backend requests.
    pub fn request_log(&self) -> &RequestLog {
        self.client.request_log()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.lock_state()
    }

    /// Session loaded so far, without touching storage.
    pub async fn session(&self) -> Option<Session> {
        self.sessions.current().await
    }

    fn set_state(&self, state: SessionState) {
        *self.lock_state() = state;
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Return the persisted session, creating one on first use.
    pub async fn ensure_session(&self) -> Result<Session> {
        let session = if self.options.server_assigned {
            let client = self.client.clone();
            self.sessions
                .ensure_with(|| async move {
                    match client.create_session().await {
                        Ok(id) => id,
                        Err(e) => {
                            warn!(
                                name: "session.server_assign.failed",
                                error = %e,
                                "Backend could not allocate a session, using a local id"
                            );
                            uuid::Uuid::new_v4().to_string()
                        }
                    }
                })
                .await?
        } else {
            self.sessions.ensure().await?
        };

        let mut state = self.lock_state();
        if *state == SessionState::Uninitialized {
            *state = SessionState::Active;
        }
        Ok(session)
    }

    /// Change the persisted mode.
    pub async fn set_mode(&self, mode: Mode) -> Result<Session> {
        let session = self.sessions.set_mode(mode).await?;
        if self.state() == SessionState::Uninitialized {
            self.set_state(SessionState::Active);
        }
        Ok(session)
    }

    /// Ask a question using the session's mode.
    pub async fn ask(&self, text: &str) -> Result<Reply> {
        let _exchange = self.exchanges.read().await;
        let session = self.ensure_session().await?;
        self.exchange(&session, text, session.mode).await
    }

    /// Ask a question in an explicit mode, leaving the session mode alone.
    pub async fn ask_with_mode(&self, text: &str, mode: Mode) -> Result<Reply> {
        let _exchange = self.exchanges.read().await;
        let session = self.ensure_session().await?;
        self.exchange(&session, text, mode).await
    }

    async fn exchange(&self, session: &Session, text: &str, mode: Mode) -> Result<Reply> {
        let text = text.trim();
        if text.is_empty() {
            self.sink.emit(UiEvent::Error {
                message: Error::EmptyInput.user_message(),
            });
            return Err(Error::EmptyInput);
        }

        let transcript = self.transcripts.get_or_create(&session.id);
        let user = Message::user(text);
        transcript.push(user.clone());
        self.history.enqueue(&session.id, user);
        self.sink.emit(UiEvent::UserMessage {
            content: text.to_string(),
        });
        self.sink.emit(UiEvent::Loading);

        let req = AskRequest {
            session_id: session.id.clone(),
            text: text.to_string(),
            mode,
        };

        match self.client.ask(&req).await {
            Ok(reply) => {
                let assistant = Message::assistant(reply.transcript_content());
                transcript.push(assistant.clone());
                self.history.enqueue(&session.id, assistant);
                self.set_state(SessionState::Active);
                info!(
                    name: "chat.ask.completed",
                    session_id = %session.id,
                    mode = %mode,
                    endpoint = %reply.endpoint,
                    "Reply received"
                );
                self.sink.emit(UiEvent::reply(reply.clone()));
                Ok(reply)
            }
            Err(e) => {
                warn!(
                    name: "chat.ask.failed",
                    session_id = %session.id,
                    mode = %mode,
                    error = %e,
                    "Ask failed"
                );
                self.sink.emit(UiEvent::Error {
                    message: e.user_message(),
                });
                Err(e)
            }
        }
    }

    /// Post one message to the remote history, logging any failure.
    pub async fn sync_message(&self, session_id: &str, message: &Message) {
        sync_message(&self.client, session_id, message).await;
    }

    /// Wait for queued history writes to be attempted.
    pub async fn flush_history(&self) {
        self.history.flush().await;
    }

    /// Fetch prior messages. Any failure yields an empty list.
    pub async fn load_history(&self) -> Vec<Message> {
        let session = match self.ensure_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(name: "history.load.failed", error = %e, "No session to load history for");
                return Vec::new();
            }
        };

        match self.client.fetch_messages(&session.id).await {
            Ok(messages) => {
                self.transcripts
                    .get_or_create(&session.id)
                    .replace(messages.clone());
                self.sink.emit(UiEvent::HistoryLoaded {
                    messages: messages.clone(),
                });
                messages
            }
            Err(e) => {
                warn!(
                    name: "history.load.failed",
                    session_id = %session.id,
                    error = %e,
                    "Could not load history, starting empty"
                );
                Vec::new()
            }
        }
    }

    /// Delete the remote history. Failures are returned to the caller.
    ///
    /// Returns the session that is active afterwards, which differs from the
    /// previous one when `rotate_on_clear` is set.
    ///
    /// Waits for exchanges already in flight, so their messages are deleted
    /// too rather than landing after the clear.
    pub async fn clear_history(&self) -> Result<Session> {
        let _exclusive = self.exchanges.write().await;
        let session = self.ensure_session().await?;

        self.history.flush().await;

        if let Err(e) = self.client.clear_messages(&session.id).await {
            warn!(
                name: "history.clear.failed",
                session_id = %session.id,
                error = %e,
                "Clearing history failed"
            );
            self.sink.emit(UiEvent::Error {
                message: e.user_message(),
            });
            return Err(e);
        }

        let next = if self.options.rotate_on_clear {
            self.transcripts.remove(&session.id);
            self.sessions.rotate().await?
        } else {
            if let Some(transcript) = self.transcripts.get(&session.id) {
                transcript.clear();
            }
            session
        };

        self.set_state(SessionState::Cleared);
        info!(
            name: "history.cleared",
            session_id = %next.id,
            "Session history cleared"
        );
        Ok(next)
    }

    /// Forward an editor diagnostic in the background.
    ///
    /// The returned handle may be awaited or dropped; failures are only
    /// logged.
    pub async fn report_diagnostic(
        &self,
        file: impl Into<String>,
        line: u32,
        message: impl Into<String>,
        severity: Severity,
    ) -> Result<JoinHandle<()>> {
        let session = self.ensure_session().await?;
        let report = DiagnosticReport {
            session_id: session.id,
            error_message: message.into(),
            file: file.into(),
            line,
            severity,
        };
        self.sink.emit(UiEvent::DetectedError {
            message: report.error_message.clone(),
            line,
        });

        let client = self.client.clone();
        Ok(tokio::spawn(async move {
            match client.report_diagnostic(&report).await {
                Ok(()) => info!(
                    name: "diagnostic.reported",
                    file = %report.file,
                    line = report.line,
                    "Diagnostic sent to backend"
                ),
                Err(e) => warn!(
                    name: "diagnostic.report.failed",
                    file = %report.file,
                    error = %e,
                    "Failed to send diagnostic"
                ),
            }
        }))
    }
}
