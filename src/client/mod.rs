//! HTTP client for the tutor backend.
//!
//! [`BackendClient`] speaks the backend's REST contract: chat routes (through
//! the [`endpoint`] adapters), the session-history routes, diagnostics and
//! health. Every call is recorded in the shared [`RequestLog`].
//!
//! # Example
//!
//! ```rust,no_run
//! use tutor_bridge::client::{AskRequest, BackendClient};
//! use tutor_bridge::Mode;
//!
//! # async fn example() -> tutor_bridge::Result<()> {
//! let client = BackendClient::new("http://127.0.0.1:8000")?;
//! let reply = client
//!     .ask(&AskRequest {
//!         session_id: "3f1c...".into(),
//!         text: "def f(x): return x+".into(),
//!         mode: Mode::Tutor,
//!     })
//!     .await?;
//! println!("{}", reply.render());
//! # Ok(())
//! # }
//! ```

pub mod endpoint;
pub mod history;
pub mod reply;
pub mod request_log;

pub use endpoint::{AskRequest, EndpointKind, RoutePlan, RouteTable};
pub use history::HistorySync;
pub use reply::Reply;
pub use request_log::{RequestLog, RequestLogEntry, RequestStatus};

use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::types::{
    CreateSessionResponse, DiagnosticReport, HealthStatus, HistoryResponse, Message,
    SessionListResponse, SessionSummary,
};

/// How remote history is cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearRoute {
    /// `DELETE /api/sessions/{id}/messages`.
    #[default]
    Delete,
    /// `POST /api/sessions/{id}/clear`.
    PostClear,
}

/// HTTP client for the backend API.
///
/// Cheap to clone; clones share the connection pool and request log.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: Url,
    http: reqwest::Client,
    routes: RouteTable,
    clear_route: ClearRoute,
    log: RequestLog,
}

impl BackendClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the backend (e.g., "http://127.0.0.1:8000")
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a new client with a custom reqwest client.
    pub fn with_client(base_url: impl AsRef<str>, http: reqwest::Client) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base(base_url.as_ref())?,
            http,
            routes: RouteTable::default(),
            clear_route: ClearRoute::default(),
            log: RequestLog::default(),
        })
    }

    /// Create a client whose requests time out after `timeout`.
    pub fn with_timeouts(
        base_url: impl AsRef<str>,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Self::with_client(base_url, http)
    }

    /// Replace the route table.
    #[must_use]
    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    /// Replace the history-clearing route.
    #[must_use]
    pub fn with_clear_route(mut self, clear_route: ClearRoute) -> Self {
        self.clear_route = clear_route;
        self
    }

    /// Record into an existing request log.
    #[must_use]
    pub fn with_request_log(mut self, log: RequestLog) -> Self {
        self.log = log;
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Active route table.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Shared request log.
    pub fn request_log(&self) -> &RequestLog {
        &self.log
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Chat
    // ─────────────────────────────────────────────────────────────────────────

    /// Ask the backend a question.
    ///
    /// Tries the mode's primary route; on `404` tries the fallback route
    /// exactly once. Any other failure is returned as-is.
    pub async fn ask(&self, req: &AskRequest) -> Result<Reply> {
        if req.text.trim().is_empty() {
            return Err(Error::EmptyInput);
        }

        let plan = self.routes.plan(req.mode);
        let (status, body) = self.post_chat(plan.primary, req).await?;

        if status == StatusCode::NOT_FOUND {
            if let Some(fallback) = plan.fallback {
                warn!(
                    name: "chat.ask.fallback",
                    primary = %plan.primary,
                    fallback = %fallback,
                    "Primary endpoint returned 404, trying fallback"
                );
                let (status, body) = self.post_chat(fallback, req).await?;
                return finish_chat(fallback, status, body);
            }
        }

        finish_chat(plan.primary, status, body)
    }

    async fn post_chat(&self, kind: EndpointKind, req: &AskRequest) -> Result<(StatusCode, String)> {
        let url = self.url(kind.path())?;
        let rb = self.http.post(url.clone()).json(&kind.body(req));
        self.send(url, req.mode.as_str(), rb).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session history
    // ─────────────────────────────────────────────────────────────────────────

    /// Append one message to the remote history.
    pub async fn post_message(&self, session_id: &str, message: &Message) -> Result<()> {
        let url = self.session_url(session_id, &["messages"])?;
        let rb = self.http.post(url.clone()).json(message);
        let (status, body) = self.send(url, "history", rb).await?;
        ensure_success(status, body)
    }

    /// Fetch the remote history of a session.
    pub async fn fetch_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let url = self.session_url(session_id, &["messages"])?;
        let rb = self.http.get(url.clone());
        let (status, body) = self.send(url, "history", rb).await?;
        ensure_success(status, body.clone())?;
        let parsed: HistoryResponse = serde_json::from_str(&body)?;
        Ok(parsed.into_messages())
    }

    /// Delete the remote history of a session.
    pub async fn clear_messages(&self, session_id: &str) -> Result<()> {
        let (url, rb) = match self.clear_route {
            ClearRoute::Delete => {
                let url = self.session_url(session_id, &["messages"])?;
                let rb = self.http.delete(url.clone());
                (url, rb)
            }
            ClearRoute::PostClear => {
                let url = self.session_url(session_id, &["clear"])?;
                let rb = self.http.post(url.clone());
                (url, rb)
            }
        };
        let (status, body) = self.send(url, "history", rb).await?;
        ensure_success(status, body)
    }

    /// Ask the backend to allocate a session id.
    pub async fn create_session(&self) -> Result<String> {
        let url = self.url("api/sessions/")?;
        let rb = self.http.post(url.clone()).json(&serde_json::json!({}));
        let (status, body) = self.send(url, "session", rb).await?;
        ensure_success(status, body.clone())?;
        let created: CreateSessionResponse = serde_json::from_str(&body)?;
        Ok(created.session_id)
    }

    /// List sessions known to the backend.
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let url = self.url("api/sessions")?;
        let rb = self.http.get(url.clone());
        let (status, body) = self.send(url, "session", rb).await?;
        ensure_success(status, body.clone())?;
        let listed: SessionListResponse = serde_json::from_str(&body)?;
        Ok(listed.sessions)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Diagnostics and health
    // ─────────────────────────────────────────────────────────────────────────

    /// Forward an editor diagnostic. The response body is ignored.
    pub async fn report_diagnostic(&self, report: &DiagnosticReport) -> Result<()> {
        let url = self.url("api/tutor/errors")?;
        let rb = self.http.post(url.clone()).json(report);
        let (status, body) = self.send(url, "diagnostic", rb).await?;
        ensure_success(status, body)
    }

    /// Query the backend health endpoint.
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = self.url("health")?;
        let rb = self.http.get(url.clone());
        let (status, body) = self.send(url, "health", rb).await?;
        ensure_success(status, body.clone())?;
        Ok(serde_json::from_str(&body)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// `{base}/api/sessions/{id}/{suffix..}` with the id percent-encoded.
    fn session_url(&self, session_id: &str, suffix: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            segments.pop_if_empty();
            segments.extend(["api", "sessions", session_id]);
            segments.extend(suffix);
        }
        Ok(url)
    }

    /// Send a request, record it, and return status plus body text.
    async fn send(&self, url: Url, mode: &str, rb: RequestBuilder) -> Result<(StatusCode, String)> {
        let started_at = Utc::now();
        let start = Instant::now();
        let endpoint = url.path().to_string();

        let outcome = match rb.send().await {
            Ok(resp) => {
                let status = resp.status();
                resp.text().await.map(|body| (status, body))
            }
            Err(e) => Err(e),
        };
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (status_label, error) = match &outcome {
            Ok((status, _)) if status.is_success() => (RequestStatus::Ok, None),
            Ok((status, _)) => (RequestStatus::Error, Some(format!("HTTP {}", status.as_u16()))),
            Err(e) => (RequestStatus::Error, Some(e.to_string())),
        };
        self.log.record(RequestLogEntry {
            endpoint: endpoint.clone(),
            mode: mode.to_string(),
            started_at,
            duration_ms,
            status: status_label,
            error,
        });

        match outcome {
            Ok((status, body)) => {
                debug!(
                    name: "backend.request.completed",
                    endpoint = %endpoint,
                    status = status.as_u16(),
                    duration_ms,
                    "Backend request completed"
                );
                Ok((status, body))
            }
            Err(source) => Err(Error::NetworkUnavailable {
                endpoint: url.to_string(),
                source,
            }),
        }
    }
}

fn finish_chat(kind: EndpointKind, status: StatusCode, body: String) -> Result<Reply> {
    ensure_success(status, body.clone())?;
    Ok(Reply::from_body(kind, &body))
}

fn ensure_success(status: StatusCode, body: String) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::BackendHttp {
            status: status.as_u16(),
            body,
        })
    }
}

/// Parse the base URL and make sure relative joins stay beneath it.
fn normalize_base(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())?;
    if url.cannot_be_a_base() {
        return Err(Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase));
    }
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "unsupported backend URL scheme: {}",
            url.scheme()
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = BackendClient::new("http://localhost:8000/backend").unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8000/backend/");
        assert_eq!(
            client.url(EndpointKind::Query.path()).unwrap().as_str(),
            "http://localhost:8000/backend/api/query"
        );
    }

    #[test]
    fn legacy_tutor_path_keeps_trailing_slash() {
        let client = BackendClient::new("http://localhost:8000").unwrap();
        assert_eq!(
            client.url(EndpointKind::TutorLegacy.path()).unwrap().as_str(),
            "http://localhost:8000/api/tutor/"
        );
    }

    #[test]
    fn session_ids_are_percent_encoded() {
        let client = BackendClient::new("http://localhost:8000").unwrap();
        let url = client.session_url("a b/c", &["messages"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/sessions/a%20b%2Fc/messages"
        );
    }

    #[test]
    fn rejects_non_http_base_urls() {
        assert!(matches!(
            BackendClient::new("mailto:tutor@example.com"),
            Err(Error::InvalidUrl(_))
        ));
        assert!(matches!(
            BackendClient::new("file:///tmp/backend"),
            Err(Error::Config(_))
        ));
        assert!(BackendClient::new("https://tutor.example.com/api-root").is_ok());
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            BackendClient::new("not a url"),
            Err(Error::InvalidUrl(_))
        ));
    }
}
