#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

/// One request received by the mock backend.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
struct Canned {
    method: Method,
    path_suffix: String,
    status: StatusCode,
    body: String,
    delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Mutex<Vec<RecordedCall>>,
    canned: Mutex<Vec<Canned>>,
    history: Mutex<HashMap<String, Vec<Value>>>,
}

/// In-process backend bound to `127.0.0.1:0`.
///
/// Canned responses are matched by method and path suffix. Requests without
/// a canned response fall through to a small in-memory implementation of the
/// session history routes; anything else is a `404`.
pub struct MockBackend {
    pub base_url: String,
    state: Arc<MockState>,
    handle: tokio::task::JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .fallback(handle)
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("mock backend listener should bind");
        let bind_addr = listener
            .local_addr()
            .expect("mock backend listener local address should exist");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("mock backend should run");
        });

        Self {
            base_url: format!("http://{bind_addr}"),
            state,
            handle,
        }
    }

    /// Answer `method` requests whose path ends with `path_suffix`.
    pub fn respond(&self, method: Method, path_suffix: &str, status: u16, body: Value) {
        self.respond_raw(method, path_suffix, status, body.to_string(), None);
    }

    /// Like [`respond`](Self::respond) but waits `delay` before answering.
    pub fn respond_slowly(
        &self,
        method: Method,
        path_suffix: &str,
        status: u16,
        body: Value,
        delay: Duration,
    ) {
        self.respond_raw(method, path_suffix, status, body.to_string(), Some(delay));
    }

    pub fn respond_raw(
        &self,
        method: Method,
        path_suffix: &str,
        status: u16,
        body: String,
        delay: Option<Duration>,
    ) {
        self.state.canned.lock().unwrap().push(Canned {
            method,
            path_suffix: path_suffix.to_string(),
            status: StatusCode::from_u16(status).expect("valid status code"),
            body,
            delay,
        });
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }

    /// Calls whose path ends with `path_suffix`.
    pub fn calls_to(&self, method: Method, path_suffix: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method && c.path.ends_with(path_suffix))
            .collect()
    }

    /// Messages the in-memory history holds for `session_id`.
    pub fn stored_history(&self, session_id: &str) -> Vec<Value> {
        self.state
            .history
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn seed_history(&self, session_id: &str, messages: Vec<Value>) {
        self.state
            .history
            .lock()
            .unwrap()
            .insert(session_id.to_string(), messages);
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A base URL nothing listens on.
pub async fn unreachable_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local address should exist");
    drop(listener);
    format!("http://{addr}")
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let body: Option<Value> = serde_json::from_slice(&body).ok();
    state.calls.lock().unwrap().push(RecordedCall {
        method: method.clone(),
        path: path.clone(),
        body: body.clone(),
    });

    let canned = state
        .canned
        .lock()
        .unwrap()
        .iter()
        .find(|c| c.method == method && path.ends_with(&c.path_suffix))
        .cloned();
    if let Some(canned) = canned {
        if let Some(delay) = canned.delay {
            tokio::time::sleep(delay).await;
        }
        return json_response(canned.status, canned.body);
    }

    history_route(&state, &method, &path, body)
}

fn history_route(state: &MockState, method: &Method, path: &str, body: Option<Value>) -> Response {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    let (id, action) = match segments.as_slice() {
        ["api", "sessions", id, action] => ((*id).to_string(), *action),
        _ => return not_found(),
    };

    let mut history = state.history.lock().unwrap();
    match (method.as_str(), action) {
        ("POST", "messages") => {
            history
                .entry(id)
                .or_default()
                .push(body.unwrap_or(Value::Null));
            json_response(StatusCode::OK, json!({ "status": "ok" }).to_string())
        }
        ("GET", "messages") => {
            let messages = history.get(&id).cloned().unwrap_or_default();
            json_response(StatusCode::OK, json!({ "messages": messages }).to_string())
        }
        ("DELETE", "messages") | ("POST", "clear") => {
            history.remove(&id);
            json_response(StatusCode::OK, json!({ "status": "cleared" }).to_string())
        }
        _ => not_found(),
    }
}

fn not_found() -> Response {
    json_response(
        StatusCode::NOT_FOUND,
        json!({ "detail": "Not Found" }).to_string(),
    )
}

fn json_response(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}
