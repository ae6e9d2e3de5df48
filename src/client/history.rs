//! Advisory history mirroring.
//!
//! Messages are posted by a single background task fed from a FIFO channel,
//! so the remote history receives them in the order they were enqueued even
//! when an individual post is slow. Failures are logged and dropped.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::BackendClient;
use crate::types::Message;

enum SyncCommand {
    Append { session_id: String, message: Message },
    Flush(oneshot::Sender<()>),
}

/// Handle to the history sync worker.
///
/// Cheap to clone. The worker exits once every handle is dropped and the
/// queue has drained.
#[derive(Debug, Clone)]
pub struct HistorySync {
    tx: Option<mpsc::UnboundedSender<SyncCommand>>,
}

impl std::fmt::Debug for SyncCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Append { session_id, .. } => f
                .debug_struct("Append")
                .field("session_id", session_id)
                .finish_non_exhaustive(),
            Self::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl HistorySync {
    /// Spawn the worker on the current tokio runtime.
    #[must_use]
    pub fn spawn(client: BackendClient) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(client, rx));
        Self { tx: Some(tx) }
    }

    /// A handle that accepts and discards everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Whether messages are actually mirrored.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Queue a message for the remote history. Never blocks.
    pub fn enqueue(&self, session_id: &str, message: Message) {
        let Some(tx) = &self.tx else {
            return;
        };
        let cmd = SyncCommand::Append {
            session_id: session_id.to_string(),
            message,
        };
        if tx.send(cmd).is_err() {
            warn!(
                name: "history.sync.closed",
                session_id = %session_id,
                "History sync worker has stopped, message dropped"
            );
        }
    }

    /// Wait until everything enqueued before this call has been attempted.
    pub async fn flush(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(SyncCommand::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn run(client: BackendClient, mut rx: mpsc::UnboundedReceiver<SyncCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            SyncCommand::Append {
                session_id,
                message,
            } => sync_message(&client, &session_id, &message).await,
            SyncCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!(name: "history.sync.stopped", "History sync worker stopped");
}

/// Post one message, logging instead of failing.
pub async fn sync_message(client: &BackendClient, session_id: &str, message: &Message) {
    match client.post_message(session_id, message).await {
        Ok(()) => debug!(
            name: "history.sync.ok",
            session_id = %session_id,
            role = ?message.role,
            "Message mirrored to history"
        ),
        Err(e) => warn!(
            name: "history.sync.failed",
            session_id = %session_id,
            role = ?message.role,
            error = %e,
            "Failed to mirror message to history"
        ),
    }
}
