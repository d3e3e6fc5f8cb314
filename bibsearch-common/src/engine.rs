//! Extraction engine abstraction
//!
//! Translators are extraction strategies tried in priority order against a
//! query. A translator that finds more than one plausible record asks the
//! client to choose through a [`PromptHandle`]: the prompt carries the
//! candidates and a one-shot response channel, and the translator suspends
//! on that channel until the follow-up request (or abandonment) answers it.

use crate::identifier::{extract_identifiers, Identifier};
use crate::record::Record;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// A search request parsed into its recognized identifiers
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// The query string exactly as submitted
    pub raw: String,
    pub identifiers: Vec<Identifier>,
}

impl SearchQuery {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let identifiers = extract_identifiers(&raw);
        SearchQuery { raw, identifiers }
    }

    pub fn doi(&self) -> Option<&str> {
        self.identifiers.iter().find_map(|id| match id {
            Identifier::Doi(v) => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn issn(&self) -> Option<&str> {
        self.identifiers.iter().find_map(|id| match id {
            Identifier::Issn(v) => Some(v.as_str()),
            _ => None,
        })
    }
}

/// Translator-side failure
#[derive(Debug, Error)]
pub enum TranslateError {
    /// The strategy applied but found nothing
    #[error("no results")]
    NoResults,
    /// The strategy itself failed (network, parse, upstream error)
    #[error("{0}")]
    Engine(String),
}

/// One disambiguation candidate as reported by a translator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Candidate {
    /// A plain display label
    Label(String),
    /// A record-shaped candidate; only the title is shown to the client
    Titled { title: String },
}

impl Candidate {
    fn into_label(self) -> String {
        match self {
            Candidate::Label(label) => label,
            Candidate::Titled { title } => title,
        }
    }
}

/// Candidate collection shape, as lists and keyed maps both occur in the wild
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Candidates {
    List(Vec<Candidate>),
    Map(IndexMap<String, Candidate>),
}

impl Candidates {
    /// Normalize either shape into a single ordered key -> label mapping.
    ///
    /// Lists get positional keys ("0", "1", ...); maps keep their intrinsic
    /// keys and order. The result is what gets offered to the client, and the
    /// same input always yields the same mapping.
    pub fn into_offered(self) -> IndexMap<String, String> {
        match self {
            Candidates::List(list) => list
                .into_iter()
                .enumerate()
                .map(|(i, c)| (i.to_string(), c.into_label()))
                .collect(),
            Candidates::Map(map) => map.into_iter().map(|(k, c)| (k, c.into_label())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Candidates::List(list) => list.len(),
            Candidates::Map(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The subset of offered keys (with labels) chosen by the client.
///
/// An empty selection is the abort signal: the prompting translator must
/// terminate instead of waiting for a choice that will never come.
pub type Selection = IndexMap<String, String>;

/// A pending disambiguation request from a suspended translator
pub struct SelectionPrompt {
    pub candidates: Candidates,
    /// One-shot resume handle back into the suspended translator
    pub respond: oneshot::Sender<Selection>,
}

/// Translator-side handle for asking the client to disambiguate
#[derive(Clone)]
pub struct PromptHandle {
    tx: mpsc::Sender<SelectionPrompt>,
}

impl PromptHandle {
    /// Create a prompt channel; the receiver side belongs to the session.
    pub fn channel() -> (PromptHandle, mpsc::Receiver<SelectionPrompt>) {
        let (tx, rx) = mpsc::channel(1);
        (PromptHandle { tx }, rx)
    }

    /// Offer `candidates` to the client and suspend until they answer.
    ///
    /// Returns the chosen subset; empty means the session was rejected or
    /// abandoned, in which case the translator should give up cleanly.
    pub async fn select(&self, candidates: Candidates) -> Selection {
        let (respond, chosen) = oneshot::channel();
        if self
            .tx
            .send(SelectionPrompt { candidates, respond })
            .await
            .is_err()
        {
            return Selection::new();
        }
        chosen.await.unwrap_or_default()
    }
}

/// One extraction strategy for a class of identifiers
#[async_trait]
pub trait Translator: Send + Sync {
    /// Human-readable name, used only in logs
    fn label(&self) -> &str;

    /// Lower values are tried first
    fn priority(&self) -> u32 {
        100
    }

    /// Whether this strategy applies to the query at all
    fn supports(&self, query: &SearchQuery) -> bool;

    /// Attempt extraction. May suspend on `prompt` when more than one
    /// plausible record matches.
    async fn translate(
        &self,
        query: &SearchQuery,
        prompt: &PromptHandle,
    ) -> Result<Vec<Record>, TranslateError>;
}

/// Registry of available translators
#[derive(Default)]
pub struct Engine {
    translators: Vec<Arc<dyn Translator>>,
}

impl Engine {
    pub fn new() -> Self {
        Engine::default()
    }

    pub fn register(&mut self, translator: Arc<dyn Translator>) {
        self.translators.push(translator);
    }

    /// Translators that support `query`, in ascending priority order
    pub fn translators_for(&self, query: &SearchQuery) -> Vec<Arc<dyn Translator>> {
        let mut matching: Vec<_> = self
            .translators
            .iter()
            .filter(|t| t.supports(query))
            .cloned()
            .collect();
        matching.sort_by_key(|t| t.priority());
        matching
    }
}
