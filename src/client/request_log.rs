//! Bounded log of recent backend requests.
//!
//! Kept for debug panels and the `--verbose` CLI output. The oldest entry is
//! evicted once the buffer is full.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of retained entries.
pub const DEFAULT_CAPACITY: usize = 50;

/// Outcome of a logged request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// A `2xx` response was received.
    Ok,
    /// Transport failure or non-success status.
    Error,
}

/// One logged request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    /// Path or URL that was called.
    pub endpoint: String,
    /// Mode label (`tutor`, `debugger`, or `history` for sync calls).
    pub mode: String,
    /// When the request started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration.
    pub duration_ms: u64,
    /// Outcome.
    pub status: RequestStatus,
    /// Error description when `status` is `Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Thread-safe ring buffer of [`RequestLogEntry`].
///
/// Clones share the same buffer.
#[derive(Debug, Clone)]
pub struct RequestLog {
    inner: Arc<RequestLogInner>,
}

#[derive(Debug)]
struct RequestLogInner {
    capacity: usize,
    entries: Mutex<VecDeque<RequestLogEntry>>,
}

impl Default for RequestLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RequestLog {
    /// Create a log retaining at most `capacity` entries (minimum one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(RequestLogInner {
                capacity,
                entries: Mutex::new(VecDeque::with_capacity(capacity)),
            }),
        }
    }

    /// Append an entry, evicting the oldest if full.
    pub fn record(&self, entry: RequestLogEntry) {
        let mut guard = self.inner.entries.lock().unwrap_or_else(PoisonError::into_inner);
        while guard.len() >= self.inner.capacity {
            guard.pop_front();
        }
        guard.push_back(entry);
    }

    /// Snapshot of all entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<RequestLogEntry> {
        self.inner.entries.lock().unwrap_or_else(PoisonError::into_inner).iter().cloned().collect()
    }

    /// Most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<RequestLogEntry> {
        self.inner.entries.lock().unwrap_or_else(PoisonError::into_inner).back().cloned()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of retained entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.inner.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
