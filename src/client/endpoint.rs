//! Endpoint adapters.
//!
//! The backend grew several chat routes with diverging field names. Each
//! [`EndpointKind`] owns one route and knows how to shape the internal
//! [`AskRequest`] for it, so callers never branch on route specifics.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::types::Mode;

/// Internal, route-independent shape of a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskRequest {
    /// Session the question belongs to.
    pub session_id: String,
    /// Selected code or free text.
    pub text: String,
    /// Assistant persona.
    pub mode: Mode,
}

/// A chat route on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// `POST /api/query` with `{ session_id, query, mode }`.
    Query,
    /// `POST /api/tutor/chat` with `{ session_id, message, mode }`.
    TutorChat,
    /// `POST /api/tutor/` with `{ sessionId, question, mode }`.
    TutorLegacy,
    /// `POST /api/debugger/chat` with `{ session_id, message, mode }`.
    DebuggerChat,
}

impl EndpointKind {
    /// Path relative to the backend base URL.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Query => "api/query",
            Self::TutorChat => "api/tutor/chat",
            Self::TutorLegacy => "api/tutor/",
            Self::DebuggerChat => "api/debugger/chat",
        }
    }

    /// Build the JSON body this route expects.
    #[must_use]
    pub fn body(self, req: &AskRequest) -> Value {
        match self {
            Self::Query => json!({
                "session_id": req.session_id,
                "query": req.text,
                "mode": req.mode,
            }),
            Self::TutorChat | Self::DebuggerChat => json!({
                "session_id": req.session_id,
                "message": req.text,
                "mode": req.mode,
            }),
            Self::TutorLegacy => json!({
                "sessionId": req.session_id,
                "question": req.text,
                "mode": req.mode,
            }),
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Query => "query",
            Self::TutorChat => "tutor_chat",
            Self::TutorLegacy => "tutor_legacy",
            Self::DebuggerChat => "debugger_chat",
        };
        f.write_str(name)
    }
}

impl FromStr for EndpointKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "query" => Ok(Self::Query),
            "tutor_chat" => Ok(Self::TutorChat),
            "tutor_legacy" => Ok(Self::TutorLegacy),
            "debugger_chat" => Ok(Self::DebuggerChat),
            other => Err(format!("unknown endpoint: {other}")),
        }
    }
}

/// Which route to try first for a mode, and where to go on `404`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePlan {
    /// Always attempted.
    pub primary: EndpointKind,
    /// Attempted exactly once, only when the primary answers `404`.
    #[serde(default)]
    pub fallback: Option<EndpointKind>,
}

impl RoutePlan {
    /// Plan with a primary route and no fallback.
    #[must_use]
    pub const fn single(primary: EndpointKind) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    /// Plan with a primary route and a `404` fallback.
    #[must_use]
    pub const fn with_fallback(primary: EndpointKind, fallback: EndpointKind) -> Self {
        Self {
            primary,
            fallback: Some(fallback),
        }
    }
}

/// Route plans for every mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTable {
    /// Plan used for [`Mode::Tutor`].
    pub tutor: RoutePlan,
    /// Plan used for [`Mode::Debugger`].
    pub debugger: RoutePlan,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            tutor: RoutePlan::with_fallback(EndpointKind::Query, EndpointKind::TutorChat),
            debugger: RoutePlan::with_fallback(EndpointKind::DebuggerChat, EndpointKind::Query),
        }
    }
}

impl RouteTable {
    /// Plan for the given mode.
    #[must_use]
    pub fn plan(&self, mode: Mode) -> RoutePlan {
        match mode {
            Mode::Tutor => self.tutor,
            Mode::Debugger => self.debugger,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AskRequest {
        AskRequest {
            session_id: "abc".into(),
            text: "print(x".into(),
            mode: Mode::Tutor,
        }
    }

    #[test]
    fn query_body_uses_query_field() {
        let body = EndpointKind::Query.body(&request());
        assert_eq!(body["session_id"], "abc");
        assert_eq!(body["query"], "print(x");
        assert_eq!(body["mode"], "tutor");
        assert!(body.get("message").is_none());
    }

    #[test]
    fn legacy_tutor_body_is_camel_case() {
        let body = EndpointKind::TutorLegacy.body(&request());
        assert_eq!(body["sessionId"], "abc");
        assert_eq!(body["question"], "print(x");
        assert!(body.get("session_id").is_none());
    }

    #[test]
    fn chat_routes_use_message_field() {
        for kind in [EndpointKind::TutorChat, EndpointKind::DebuggerChat] {
            let body = kind.body(&request());
            assert_eq!(body["message"], "print(x");
            assert_eq!(body["session_id"], "abc");
        }
    }

    #[test]
    fn default_table_matches_modes() {
        let table = RouteTable::default();
        assert_eq!(table.plan(Mode::Tutor).primary, EndpointKind::Query);
        assert_eq!(
            table.plan(Mode::Tutor).fallback,
            Some(EndpointKind::TutorChat)
        );
        assert_eq!(
            table.plan(Mode::Debugger).primary,
            EndpointKind::DebuggerChat
        );
    }

    #[test]
    fn endpoint_names_round_trip_through_display() {
        for kind in [
            EndpointKind::Query,
            EndpointKind::TutorChat,
            EndpointKind::TutorLegacy,
            EndpointKind::DebuggerChat,
        ] {
            assert_eq!(kind.to_string().parse::<EndpointKind>().unwrap(), kind);
        }
    }
}
