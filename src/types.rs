//! Shared types for the tutor client.
//!
//! These types mirror the backend's JSON contract and are used by both the
//! HTTP client and the session layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Mode
// =============================================================================

/// Which assistant persona a request is addressed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Explain and teach.
    #[default]
    Tutor,
    /// Diagnose and fix.
    Debugger,
}

impl Mode {
    /// Wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tutor => "tutor",
            Self::Debugger => "debugger",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tutor" => Ok(Self::Tutor),
            "debugger" | "debug" => Ok(Self::Debugger),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking.
    User,
    /// The backend's answer. Older backends label these `bot` or `ai`.
    #[serde(alias = "bot", alias = "ai")]
    Assistant,
    /// Out-of-band notices.
    System,
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message author.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// When the message was created.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped with the current time.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Response body of the history endpoint.
///
/// Current backends wrap the list in `{ "messages": [...] }`; some older
/// ones return the bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum HistoryResponse {
    Wrapped { messages: Vec<Message> },
    Bare(Vec<Message>),
}

impl HistoryResponse {
    pub(crate) fn into_messages(self) -> Vec<Message> {
        match self {
            Self::Wrapped { messages } | Self::Bare(messages) => messages,
        }
    }
}

// =============================================================================
// Sessions API Types
// =============================================================================

/// Response from creating a session server-side.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionResponse {
    /// Identifier assigned by the backend.
    pub session_id: String,
}

/// One entry of the session listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session identifier.
    pub session_id: String,
    /// Number of stored messages.
    #[serde(default)]
    pub message_count: usize,
    /// Creation time as reported by the backend.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update time as reported by the backend.
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SessionListResponse {
    #[serde(default)]
    pub sessions: Vec<SessionSummary>,
}

/// Backend health report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Usually `"ok"`.
    pub status: String,
    /// Name the backend reports for itself.
    #[serde(default)]
    pub service_name: Option<String>,
    /// Backend version string.
    #[serde(default)]
    pub version: Option<String>,
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Severity of a reported diagnostic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks compilation or execution.
    #[default]
    Critical,
    /// Compiler or linter error.
    Error,
    /// Warning.
    Warning,
    /// Informational hint.
    Info,
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "error" => Ok(Self::Error),
            "warning" | "warn" => Ok(Self::Warning),
            "info" | "hint" => Ok(Self::Info),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// An editor diagnostic forwarded to the backend for analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    /// Session the diagnostic belongs to.
    pub session_id: String,
    /// Diagnostic message as shown by the editor.
    pub error_message: String,
    /// File path.
    pub file: String,
    /// One-based line number.
    pub line: u32,
    /// Severity label.
    #[serde(default)]
    pub severity: Severity,
}
