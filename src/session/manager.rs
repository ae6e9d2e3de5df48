//! Session identity and persistence.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use super::store::StateStore;
use crate::error::Result;
use crate::types::Mode;

/// Key under which the session record is persisted.
pub const SESSION_KEY: &str = "session";

/// A client-side conversation context.
///
/// The `id` is the only correlation key with remote history and never
/// changes; rotating the id produces a new `Session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque identifier, a UUID v4 unless the backend assigned one.
    pub id: String,
    /// Current assistant persona.
    #[serde(default)]
    pub mode: Mode,
    /// Creation time.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn new(id: String, mode: Mode) -> Self {
        Self {
            id,
            mode,
            created_at: Utc::now(),
        }
    }
}

/// Loads, creates and persists the session for one state scope.
#[derive(Debug)]
pub struct SessionManager {
    store: Arc<dyn StateStore>,
    default_mode: Mode,
    current: Mutex<Option<Session>>,
}

impl SessionManager {
    /// Create a manager over `store`.
    pub fn new(store: Arc<dyn StateStore>, default_mode: Mode) -> Self {
        Self {
            store,
            default_mode,
            current: Mutex::new(None),
        }
    }

    /// Return the persisted session, creating a UUID-backed one if needed.
    pub async fn ensure(&self) -> Result<Session> {
        self.ensure_with(|| async { Uuid::new_v4().to_string() })
            .await
    }

    /// Like [`ensure`](Self::ensure) but lets the caller allocate the id.
    ///
    /// `allocate` only runs when no session exists yet. Concurrent callers
    /// are serialized, so they all observe the same id.
    pub async fn ensure_with<F, Fut>(&self, allocate: F) -> Result<Session>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = String>,
    {
        let mut guard = self.current.lock().await;
        self.load_or_create(&mut guard, allocate).await
    }

    /// Resolve the session into `slot`; callers hold the `current` lock.
    async fn load_or_create<F, Fut>(&self, slot: &mut Option<Session>, allocate: F) -> Result<Session>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = String>,
    {
        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }

        if let Some(session) = self.load().await? {
            *slot = Some(session.clone());
            return Ok(session);
        }

        let session = Session::new(allocate().await, self.default_mode);
        self.persist(&session).await?;
        info!(
            name: "session.created",
            session_id = %session.id,
            mode = %session.mode,
            "New session created"
        );
        *slot = Some(session.clone());
        Ok(session)
    }

    /// Cached session, if [`ensure`](Self::ensure) has run.
    pub async fn current(&self) -> Option<Session> {
        self.current.lock().await.clone()
    }

    /// Change and persist the mode.
    pub async fn set_mode(&self, mode: Mode) -> Result<Session> {
        let mut guard = self.current.lock().await;
        let mut session = self
            .load_or_create(&mut guard, || async { Uuid::new_v4().to_string() })
            .await?;
        session.mode = mode;
        self.persist(&session).await?;
        *guard = Some(session.clone());
        Ok(session)
    }

    /// Replace the session with a fresh id, keeping the mode.
    pub async fn rotate(&self) -> Result<Session> {
        let mut guard = self.current.lock().await;
        let mode = guard.as_ref().map_or(self.default_mode, |s| s.mode);
        let session = Session::new(Uuid::new_v4().to_string(), mode);
        self.persist(&session).await?;
        info!(
            name: "session.rotated",
            session_id = %session.id,
            "Session id rotated"
        );
        *guard = Some(session.clone());
        Ok(session)
    }

    /// Drop the session from memory and storage.
    pub async fn forget(&self) -> Result<()> {
        let mut guard = self.current.lock().await;
        self.store.remove(SESSION_KEY).await?;
        *guard = None;
        Ok(())
    }

    async fn load(&self) -> Result<Option<Session>> {
        let Some(raw) = self.store.get(SESSION_KEY).await? else {
            return Ok(None);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        match serde_json::from_str::<Session>(raw) {
            Ok(session) => Ok(Some(session)),
            Err(_) => {
                // Older front-ends stored the bare id.
                warn!(
                    name: "session.legacy_record",
                    "Upgrading bare session id record"
                );
                let session = Session::new(raw.to_string(), self.default_mode);
                self.persist(&session).await?;
                Ok(Some(session))
            }
        }
    }

    async fn persist(&self, session: &Session) -> Result<()> {
        let json = serde_json::to_string(session)?;
        self.store.set(SESSION_KEY, &json).await
    }
}
