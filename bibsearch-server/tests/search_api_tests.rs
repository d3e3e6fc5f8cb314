//! Integration tests for the search endpoint
//!
//! Drives the router in-process over the full two-request workflow:
//! new query, multiple-choices suspension, selection, and every rejection
//! path the dispatcher and session machine expose.

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::Router;
use bibsearch_common::engine::{
    Candidate, Candidates, Engine, PromptHandle, SearchQuery, TranslateError, Translator,
};
use bibsearch_common::record::Record;
use bibsearch_server::api::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Mock translators
// ============================================================================

/// Always succeeds with fixed records
struct StaticTranslator {
    label: &'static str,
    priority: u32,
    records: Vec<Record>,
    attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl Translator for StaticTranslator {
    fn label(&self) -> &str {
        self.label
    }
    fn priority(&self) -> u32 {
        self.priority
    }
    fn supports(&self, _query: &SearchQuery) -> bool {
        true
    }
    async fn translate(
        &self,
        _query: &SearchQuery,
        _prompt: &PromptHandle,
    ) -> Result<Vec<Record>, TranslateError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.clone())
    }
}

/// Always fails with an engine error
struct FailingTranslator {
    attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl Translator for FailingTranslator {
    fn label(&self) -> &str {
        "failing"
    }
    fn priority(&self) -> u32 {
        1
    }
    fn supports(&self, _query: &SearchQuery) -> bool {
        true
    }
    async fn translate(
        &self,
        _query: &SearchQuery,
        _prompt: &PromptHandle,
    ) -> Result<Vec<Record>, TranslateError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(TranslateError::Engine("simulated upstream failure".into()))
    }
}

/// Prompts once over two journal years, returns the chosen records
struct ChoosingTranslator;

#[async_trait]
impl Translator for ChoosingTranslator {
    fn label(&self) -> &str {
        "choosing"
    }
    fn supports(&self, _query: &SearchQuery) -> bool {
        true
    }
    async fn translate(
        &self,
        _query: &SearchQuery,
        prompt: &PromptHandle,
    ) -> Result<Vec<Record>, TranslateError> {
        let candidates = Candidates::List(vec![
            Candidate::Label("Journal A 2020".into()),
            Candidate::Label("Journal A 2021".into()),
        ]);
        let chosen = prompt.select(candidates).await;
        if chosen.is_empty() {
            return Err(TranslateError::NoResults);
        }
        Ok(chosen
            .values()
            .map(|label| Record::new("journalArticle").field("title", label.clone()))
            .collect())
    }
}

/// Prompts twice: a coarse choice, then a refinement of it
struct TwoRoundTranslator;

#[async_trait]
impl Translator for TwoRoundTranslator {
    fn label(&self) -> &str {
        "two-round"
    }
    fn supports(&self, _query: &SearchQuery) -> bool {
        true
    }
    async fn translate(
        &self,
        _query: &SearchQuery,
        prompt: &PromptHandle,
    ) -> Result<Vec<Record>, TranslateError> {
        let first = prompt
            .select(Candidates::List(vec![
                Candidate::Label("Volume 1".into()),
                Candidate::Label("Volume 2".into()),
            ]))
            .await;
        if first.is_empty() {
            return Err(TranslateError::NoResults);
        }
        let second = prompt
            .select(Candidates::List(vec![
                Candidate::Label("Issue 1".into()),
                Candidate::Label("Issue 2".into()),
            ]))
            .await;
        if second.is_empty() {
            return Err(TranslateError::NoResults);
        }
        Ok(second
            .values()
            .map(|label| Record::new("journalArticle").field("title", label.clone()))
            .collect())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn app_with(translators: Vec<Arc<dyn Translator>>) -> Router {
    let mut engine = Engine::new();
    for translator in translators {
        engine.register(translator);
    }
    build_router(AppState::new(engine, Duration::from_secs(60)))
}

async fn post_search(app: &Router, content_type: Option<&str>, body: &str) -> (StatusCode, Value) {
    use axum::body::Body;
    use http::Request;
    use tower::ServiceExt;

    let mut request = Request::builder().method("POST").uri("/search");
    if let Some(content_type) = content_type {
        request = request.header("content-type", content_type);
    }
    let request = request.body(Body::from(body.to_string())).unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn query(app: &Router, text: &str) -> (StatusCode, Value) {
    post_search(app, Some("text/plain"), text).await
}

async fn resume(app: &Router, body: Value) -> (StatusCode, Value) {
    post_search(app, Some("application/json"), &body.to_string()).await
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn health_endpoint_reports_module() {
    use axum::body::Body;
    use http::Request;
    use tower::ServiceExt;

    let app = app_with(vec![]);
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "bibsearch-server");
}

#[tokio::test]
async fn unambiguous_query_returns_items_without_a_detour() {
    let app = app_with(vec![Arc::new(StaticTranslator {
        label: "static",
        priority: 10,
        records: vec![Record::new("journalArticle").field("title", "Single Hit")],
        attempts: Arc::new(AtomicUsize::new(0)),
    })]);

    let (status, body) = query(&app, "10.1234/solo").await;
    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().expect("item array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Single Hit");
    assert_eq!(items[0]["version"], 0);
    assert!(items[0]["key"].is_string());
}

#[tokio::test]
async fn json_string_body_starts_a_new_query() {
    let app = app_with(vec![Arc::new(StaticTranslator {
        label: "static",
        priority: 10,
        records: vec![Record::new("book").field("title", "From JSON String")],
        attempts: Arc::new(AtomicUsize::new(0)),
    })]);

    let (status, body) = post_search(&app, Some("application/json"), "\"9783161484100\"").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["title"], "From JSON String");
}

#[tokio::test]
async fn ambiguous_query_round_trips_through_selection() {
    let app = app_with(vec![Arc::new(ChoosingTranslator)]);

    // First request: multiple choices
    let (status, body) = query(&app, "1234-5678").await;
    assert_eq!(status, StatusCode::MULTIPLE_CHOICES);
    assert_eq!(body["query"], "1234-5678");
    let token = body["token"].as_str().expect("token").to_string();
    assert_eq!(body["items"]["0"], "Journal A 2020");
    assert_eq!(body["items"]["1"], "Journal A 2021");

    // Follow-up: pick the 2021 entry
    let (status, body) = resume(
        &app,
        json!({
            "session": token,
            "url": "1234-5678",
            "items": { "1": "Journal A 2021" },
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().expect("item array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Journal A 2021");
}

#[tokio::test]
async fn re_ambiguous_resume_issues_a_fresh_token() {
    let app = app_with(vec![Arc::new(TwoRoundTranslator)]);

    let (status, body) = query(&app, "1234-5678").await;
    assert_eq!(status, StatusCode::MULTIPLE_CHOICES);
    let first_token = body["token"].as_str().unwrap().to_string();
    assert_eq!(body["items"]["0"], "Volume 1");

    let (status, body) = resume(
        &app,
        json!({
            "session": &first_token,
            "url": "1234-5678",
            "items": { "0": "Volume 1" },
        }),
    )
    .await;
    assert_eq!(status, StatusCode::MULTIPLE_CHOICES);
    let second_token = body["token"].as_str().unwrap().to_string();
    assert_ne!(first_token, second_token);
    assert_eq!(body["items"]["1"], "Issue 2");

    let (status, body) = resume(
        &app,
        json!({
            "session": &second_token,
            "url": "1234-5678",
            "items": { "1": "Issue 2" },
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["title"], "Issue 2");
}

#[tokio::test]
async fn failing_translator_falls_back_to_the_next_one() {
    let failing_attempts = Arc::new(AtomicUsize::new(0));
    let static_attempts = Arc::new(AtomicUsize::new(0));
    let app = app_with(vec![
        Arc::new(FailingTranslator { attempts: Arc::clone(&failing_attempts) }),
        Arc::new(StaticTranslator {
            label: "backup",
            priority: 50,
            records: vec![Record::new("journalArticle").field("title", "From Backup")],
            attempts: Arc::clone(&static_attempts),
        }),
    ]);

    let (status, body) = query(&app, "10.1234/fallback").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["title"], "From Backup");
    assert_eq!(failing_attempts.load(Ordering::SeqCst), 1);
    assert_eq!(static_attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn no_translators_yields_501_with_generic_message() {
    let app = app_with(vec![]);
    let (status, body) = query(&app, "10.1234/nothing").await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn engine_failure_detail_is_not_leaked() {
    let app = app_with(vec![Arc::new(FailingTranslator {
        attempts: Arc::new(AtomicUsize::new(0)),
    })]);
    let (status, body) = query(&app, "10.1234/boom").await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    let message = body["error"].as_str().unwrap();
    assert!(!message.contains("simulated upstream failure"));
}

#[tokio::test]
async fn mismatched_url_conflicts_and_burns_the_token() {
    let app = app_with(vec![Arc::new(ChoosingTranslator)]);

    let (_, body) = query(&app, "1234-5678").await;
    let token = body["token"].as_str().unwrap().to_string();

    let (status, _) = resume(
        &app,
        json!({
            "session": &token,
            "url": "9999-0000",
            "items": { "0": "Journal A 2020" },
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // The token was consumed before validation; a corrected retry cannot work
    let (status, _) = resume(
        &app,
        json!({
            "session": &token,
            "url": "1234-5678",
            "items": { "0": "Journal A 2020" },
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_selection_is_a_bad_request() {
    let app = app_with(vec![Arc::new(ChoosingTranslator)]);
    let (_, body) = query(&app, "1234-5678").await;
    let token = body["token"].as_str().unwrap();

    let (status, _) = resume(
        &app,
        json!({ "session": token, "url": "1234-5678", "items": {} }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_items_is_a_bad_request() {
    let app = app_with(vec![Arc::new(ChoosingTranslator)]);
    let (_, body) = query(&app, "1234-5678").await;
    let token = body["token"].as_str().unwrap();

    let (status, _) = resume(&app, json!({ "session": token, "url": "1234-5678" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn selection_outside_the_offer_conflicts() {
    let app = app_with(vec![Arc::new(ChoosingTranslator)]);
    let (_, body) = query(&app, "1234-5678").await;
    let token = body["token"].as_str().unwrap();

    let (status, _) = resume(
        &app,
        json!({
            "session": token,
            "url": "1234-5678",
            "items": { "9": "Journal A 2035" },
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_session_token_is_not_found() {
    let app = app_with(vec![Arc::new(ChoosingTranslator)]);
    let (status, body) = resume(
        &app,
        json!({
            "session": "deadbeefdeadbee",
            "url": "1234-5678",
            "items": { "0": "x" },
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn missing_session_field_is_a_bad_request() {
    let app = app_with(vec![Arc::new(ChoosingTranslator)]);
    let (status, _) = resume(&app, json!({ "url": "1234-5678", "items": { "0": "x" } })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unsupported_content_type_is_rejected() {
    let app = app_with(vec![]);
    let (status, _) = post_search(&app, Some("application/xml"), "<query/>").await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let (status, _) = post_search(&app, None, "1234-5678").await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn missing_body_is_a_bad_request() {
    let app = app_with(vec![]);
    let (status, _) = post_search(&app, Some("text/plain"), "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
