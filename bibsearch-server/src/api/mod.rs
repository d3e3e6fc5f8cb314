//! HTTP API for bibsearch-server
//!
//! A single search endpoint dispatches on the body's shape: a plain string
//! starts a new session, a `{session, url, items}` object resumes a
//! suspended one. Expired sessions are reclaimed by a counter-triggered
//! sweep run off the request path.

use crate::error::{Error, Result};
use crate::session::{self, table::SessionTable, ResumeRequest, SearchOutcome};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bibsearch_common::engine::Engine;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// A sweep runs once every this many handled requests
const SWEEP_INTERVAL_REQUESTS: u32 = 10;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub sessions: Arc<SessionTable>,
    pub session_ttl: Duration,
    request_count: Arc<AtomicU32>,
}

impl AppState {
    pub fn new(engine: Engine, session_ttl: Duration) -> Self {
        AppState {
            engine: Arc::new(engine),
            sessions: Arc::new(SessionTable::new()),
            session_ttl,
            request_count: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Counter-triggered eviction: true once per SWEEP_INTERVAL_REQUESTS.
    ///
    /// This bounds staleness only as well as traffic is steady; under sparse
    /// traffic an expired session can linger until the next burst.
    fn sweep_due(&self) -> bool {
        let count = self.request_count.fetch_add(1, Ordering::Relaxed) + 1;
        count % SWEEP_INTERVAL_REQUESTS == 0
    }
}

/// Create the API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/search", post(search))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "module": "bibsearch-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Parsed request body shapes accepted by the search endpoint
#[derive(Debug)]
enum RequestBody {
    /// A new free-text identifier query
    Query(String),
    /// A follow-up selection for a suspended session
    Resume(ResumeRequest),
}

/// POST /search - new query or session resumption, decided by body shape
async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    if state.sweep_due() {
        let sessions = Arc::clone(&state.sessions);
        let ttl = state.session_ttl;
        // Keep eviction cost off the request path
        tokio::spawn(async move { sessions.sweep(ttl).await });
    }

    let outcome = match parse_body(&headers, &body)? {
        RequestBody::Query(query) => {
            session::start(&query, &state.engine, &state.sessions).await?
        }
        RequestBody::Resume(request) => session::resume(request, &state.sessions).await?,
    };
    Ok(respond(outcome))
}

fn respond(outcome: SearchOutcome) -> Response {
    match outcome {
        SearchOutcome::Done(items) => Json(items).into_response(),
        SearchOutcome::NeedsSelection { token, query, items } => (
            StatusCode::MULTIPLE_CHOICES,
            Json(json!({
                "query": query,
                "token": token,
                "items": items,
            })),
        )
            .into_response(),
    }
}

fn parse_body(headers: &HeaderMap, body: &Bytes) -> Result<RequestBody> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    let is_text = mime == "text/plain";
    let is_json = mime == "application/json" || mime == "text/json" || mime.ends_with("+json");
    if !is_text && !is_json {
        return Err(Error::UnsupportedContentType);
    }

    if body.is_empty() {
        return Err(Error::MissingBody);
    }

    if is_text {
        let query = std::str::from_utf8(body)
            .map_err(|_| Error::InvalidBody("body is not valid UTF-8".into()))?
            .trim();
        if query.is_empty() {
            return Err(Error::MissingBody);
        }
        return Ok(RequestBody::Query(query.to_string()));
    }

    let value: Value =
        serde_json::from_slice(body).map_err(|e| Error::InvalidBody(e.to_string()))?;
    match value {
        // A JSON string is still a new query
        Value::String(query) if !query.trim().is_empty() => {
            Ok(RequestBody::Query(query.trim().to_string()))
        }
        Value::String(_) => Err(Error::MissingBody),
        Value::Object(_) => {
            let request: ResumeRequest =
                serde_json::from_value(value).map_err(|e| Error::InvalidBody(e.to_string()))?;
            Ok(RequestBody::Resume(request))
        }
        _ => Err(Error::InvalidBody(
            "expected a query string or a resume object".into(),
        )),
    }
}
