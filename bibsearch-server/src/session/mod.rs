//! Session state machine
//!
//! One search is one logical operation that may span two HTTP requests. The
//! first request spawns the translator-fallback loop and races it against the
//! loop's disambiguation prompt channel. If translation completes outright,
//! the caller gets the final item array. If a translator prompts instead, the
//! in-flight work is parked here as a [`Session`]: the prompt's one-shot
//! response sender plus the still-running translation, keyed in the
//! [`SessionTable`] by a fresh token. The follow-up request consumes the
//! token, validates the client's selection against what was offered, fires
//! the response sender, and races the resumed translation the same way — so
//! a re-ambiguous answer simply parks again under a new token.
//!
//! The conceptual states map onto control flow rather than an enum field:
//! querying is a live [`drive`] call, awaiting-selection is a stored
//! `Session`, and the terminal states are the returned `Result`.

pub mod table;

use crate::error::{Error, Result};
use bibsearch_common::engine::{
    Engine, PromptHandle, SearchQuery, Selection, SelectionPrompt, TranslateError, Translator,
};
use bibsearch_common::format::to_api_items;
use bibsearch_common::record::Record;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use table::SessionTable;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of driving a search as far as it can go in one request
#[derive(Debug)]
pub enum SearchOutcome {
    /// Translation finished; the final public item array (HTTP 200)
    Done(Vec<Value>),
    /// Translation suspended on a client choice (HTTP 300); the session is
    /// already stored under `token`
    NeedsSelection {
        token: String,
        query: String,
        items: IndexMap<String, String>,
    },
}

/// The translation still running on the other side of a suspension
pub struct PendingTranslation {
    pub handle: JoinHandle<std::result::Result<Vec<Record>, TranslateError>>,
    pub prompt_rx: mpsc::Receiver<SelectionPrompt>,
}

/// A suspended search awaiting the client's selection
pub struct Session {
    pub token: String,
    pub created_at: Instant,
    /// The original identifier string; the follow-up must echo it
    pub query: String,
    /// Exactly the candidates shown to the client, in offer order
    pub offered: IndexMap<String, String>,
    /// One-shot resume handle into the suspended translator
    pub respond: oneshot::Sender<Selection>,
    pub pending: PendingTranslation,
}

/// Follow-up request resuming a suspended session
#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    pub session: Option<String>,
    /// Must match the session's original query
    #[serde(default)]
    pub url: String,
    /// Chosen subset of the offered key -> label mapping
    pub items: Option<IndexMap<String, String>>,
}

/// Start a new search for `query`.
///
/// Collects supporting translators (none at all is a 501), spawns the
/// fallback loop, and drives it until it finishes or suspends.
pub async fn start(query: &str, engine: &Engine, table: &SessionTable) -> Result<SearchOutcome> {
    let parsed = SearchQuery::parse(query);
    let translators = engine.translators_for(&parsed);
    if translators.is_empty() {
        return Err(Error::NoTranslators);
    }
    debug!(query, translators = translators.len(), "starting search");

    let (prompt, prompt_rx) = PromptHandle::channel();
    let handle = tokio::spawn(run_translators(translators, parsed, prompt));
    drive(query.to_string(), PendingTranslation { handle, prompt_rx }, table).await
}

/// Resume a suspended session with the client's selection.
///
/// The token is consumed from the table before any validation, so no second
/// resume attempt can ever match it — not even after a rejected one.
pub async fn resume(request: ResumeRequest, table: &SessionTable) -> Result<SearchOutcome> {
    let token = request
        .session
        .clone()
        .filter(|t| !t.is_empty())
        .ok_or(Error::MissingSession)?;

    let session = table
        .take_if_present(&token)
        .await
        .ok_or_else(|| Error::UnknownSession(token))?;
    session.resume(request, table).await
}

impl Session {
    async fn resume(self, request: ResumeRequest, table: &SessionTable) -> Result<SearchOutcome> {
        let Session {
            token,
            query,
            offered,
            respond,
            pending,
            ..
        } = self;

        if request.url != query {
            return Err(abort(
                respond,
                Error::QueryMismatch {
                    supplied: request.url,
                    expected: query,
                },
            ));
        }

        let selected = match request.items {
            Some(items) => items,
            None => return Err(abort(respond, Error::MissingItems)),
        };
        if selected.is_empty() {
            return Err(abort(respond, Error::NoItemsSelected));
        }
        for (key, label) in &selected {
            if offered.get(key) != Some(label) {
                return Err(abort(respond, Error::ItemMismatch));
            }
        }

        info!(%token, chosen = selected.len(), "resuming suspended session");
        // If the translator vanished, the join handle below reports it
        let _ = respond.send(selected);
        drive(query, pending, table).await
    }
}

/// Fire the one-shot with an empty selection so the suspended translator
/// terminates instead of hanging, then hand back the client-facing error.
fn abort(respond: oneshot::Sender<Selection>, err: Error) -> Error {
    let _ = respond.send(Selection::new());
    err
}

/// Try translators in priority order; first non-empty success wins.
async fn run_translators(
    translators: Vec<Arc<dyn Translator>>,
    query: SearchQuery,
    prompt: PromptHandle,
) -> std::result::Result<Vec<Record>, TranslateError> {
    let mut last = TranslateError::NoResults;
    for translator in translators {
        debug!(translator = translator.label(), "attempting translation");
        match translator.translate(&query, &prompt).await {
            Ok(records) if !records.is_empty() => return Ok(records),
            Ok(_) => {
                warn!(translator = translator.label(), "translator returned nothing; trying next");
                last = TranslateError::NoResults;
            }
            Err(e) => {
                warn!(translator = translator.label(), error = %e, "translation failed; trying next");
                last = e;
            }
        }
    }
    Err(last)
}

/// Race the running translation against its disambiguation prompt channel.
///
/// Completion finalizes the response. A prompt suspends: candidates are
/// normalized into the offered mapping, a token is minted, and the whole
/// operation is parked in the table.
async fn drive(
    query: String,
    mut pending: PendingTranslation,
    table: &SessionTable,
) -> Result<SearchOutcome> {
    loop {
        tokio::select! {
            result = &mut pending.handle => return finalize(result),
            Some(prompt) = pending.prompt_rx.recv() => {
                let SelectionPrompt { candidates, respond } = prompt;
                if candidates.is_empty() {
                    // Nothing worth offering; dismiss this prompt and keep
                    // listening, since a fallback translator may still ask
                    let _ = respond.send(Selection::new());
                    continue;
                }
                let offered = candidates.into_offered();

                let token = table::generate_token();
                info!(%token, candidates = offered.len(), "suspending session for selection");
                let session = Session {
                    token: token.clone(),
                    created_at: Instant::now(),
                    query: query.clone(),
                    offered: offered.clone(),
                    respond,
                    pending,
                };
                table.put(session).await?;
                return Ok(SearchOutcome::NeedsSelection { token, query, items: offered });
            }
        }
    }
}

fn finalize(
    result: std::result::Result<
        std::result::Result<Vec<Record>, TranslateError>,
        tokio::task::JoinError,
    >,
) -> Result<SearchOutcome> {
    match result {
        Ok(Ok(records)) => {
            let mut items = Vec::new();
            for record in &records {
                items.extend(to_api_items(record));
            }
            Ok(SearchOutcome::Done(items))
        }
        Ok(Err(TranslateError::NoResults)) => Err(Error::NoResults),
        Ok(Err(TranslateError::Engine(detail))) => Err(Error::Translation(detail)),
        Err(join_error) => Err(Error::Internal(format!("translation task failed: {join_error}"))),
    }
}
