//! Bundled translators
//!
//! Thin Crossref-backed extraction strategies: a DOI lookup that resolves to
//! a single record, and an ISSN lookup over a journal's recent works that
//! prompts for disambiguation when more than one matches. Site-specific
//! parsing beyond this stays out of the server; these exist so the binary
//! answers real queries out of the box.

use async_trait::async_trait;
use bibsearch_common::engine::{
    Candidate, Candidates, Engine, PromptHandle, SearchQuery, TranslateError, Translator,
};
use bibsearch_common::record::{Creator, Record};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const CROSSREF_API: &str = "https://api.crossref.org";

/// How many recent works an ISSN lookup offers for selection
const ISSN_RESULT_LIMIT: usize = 20;

/// Engine preloaded with the bundled translators
pub fn default_engine(client: reqwest::Client) -> Engine {
    let mut engine = Engine::new();
    engine.register(Arc::new(CrossrefDoiTranslator { client: client.clone() }));
    engine.register(Arc::new(CrossrefIssnTranslator { client }));
    engine
}

fn upstream(e: reqwest::Error) -> TranslateError {
    TranslateError::Engine(e.to_string())
}

/// Resolves a DOI against the Crossref works API
pub struct CrossrefDoiTranslator {
    client: reqwest::Client,
}

#[async_trait]
impl Translator for CrossrefDoiTranslator {
    fn label(&self) -> &str {
        "Crossref DOI"
    }

    fn priority(&self) -> u32 {
        10
    }

    fn supports(&self, query: &SearchQuery) -> bool {
        query.doi().is_some()
    }

    async fn translate(
        &self,
        query: &SearchQuery,
        _prompt: &PromptHandle,
    ) -> Result<Vec<Record>, TranslateError> {
        let doi = query.doi().ok_or(TranslateError::NoResults)?;
        let url = format!("{CROSSREF_API}/works/{doi}");
        debug!(%url, "fetching work by DOI");

        let response = self.client.get(&url).send().await.map_err(upstream)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(TranslateError::NoResults);
        }
        let body: Value = response
            .error_for_status()
            .map_err(upstream)?
            .json()
            .await
            .map_err(upstream)?;

        Ok(vec![record_from_work(&body["message"])])
    }
}

/// Lists a journal's recent works by ISSN; prompts when several match
pub struct CrossrefIssnTranslator {
    client: reqwest::Client,
}

#[async_trait]
impl Translator for CrossrefIssnTranslator {
    fn label(&self) -> &str {
        "Crossref ISSN"
    }

    fn priority(&self) -> u32 {
        20
    }

    fn supports(&self, query: &SearchQuery) -> bool {
        query.issn().is_some()
    }

    async fn translate(
        &self,
        query: &SearchQuery,
        prompt: &PromptHandle,
    ) -> Result<Vec<Record>, TranslateError> {
        let issn = query.issn().ok_or(TranslateError::NoResults)?;
        let url = format!(
            "{CROSSREF_API}/journals/{issn}/works?rows={ISSN_RESULT_LIMIT}&sort=published&order=desc"
        );
        debug!(%url, "listing journal works by ISSN");

        let response = self.client.get(&url).send().await.map_err(upstream)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(TranslateError::NoResults);
        }
        let body: Value = response
            .error_for_status()
            .map_err(upstream)?
            .json()
            .await
            .map_err(upstream)?;

        let works = match body["message"]["items"].as_array() {
            Some(works) if !works.is_empty() => works,
            _ => return Err(TranslateError::NoResults),
        };

        let records: Vec<Record> = works.iter().map(record_from_work).collect();
        if records.len() == 1 {
            return Ok(records);
        }

        let candidates =
            Candidates::List(works.iter().map(|w| Candidate::Label(work_label(w))).collect());
        let chosen = prompt.select(candidates).await;
        if chosen.is_empty() {
            return Err(TranslateError::NoResults);
        }

        let picked: Vec<Record> = chosen
            .keys()
            .filter_map(|key| key.parse::<usize>().ok())
            .filter_map(|index| records.get(index).cloned())
            .collect();
        if picked.is_empty() {
            return Err(TranslateError::NoResults);
        }
        Ok(picked)
    }
}

/// Display label for a work in the selection list: title plus year
fn work_label(work: &Value) -> String {
    let title = work["title"][0].as_str().unwrap_or("[untitled]");
    match published_year(work) {
        Some(year) => format!("{title} ({year})"),
        None => title.to_string(),
    }
}

fn published_year(work: &Value) -> Option<i64> {
    work["published"]["date-parts"][0][0]
        .as_i64()
        .or_else(|| work["published-print"]["date-parts"][0][0].as_i64())
        .or_else(|| work["published-online"]["date-parts"][0][0].as_i64())
}

/// Map a Crossref work message into the internal record model
fn record_from_work(work: &Value) -> Record {
    let item_type = match work["type"].as_str() {
        Some("journal-article") => "journalArticle",
        Some("book") | Some("monograph") | Some("edited-book") => "book",
        Some("book-chapter") => "bookSection",
        Some("proceedings-article") => "conferencePaper",
        Some("report") => "report",
        Some("posted-content") => "preprint",
        _ => "document",
    };
    let mut record = Record::new(item_type);

    if let Some(title) = work["title"][0].as_str() {
        record.fields.insert("title".into(), title.to_string());
    }
    if let Some(container) = work["container-title"][0].as_str() {
        record
            .fields
            .insert("publicationTitle".into(), container.to_string());
    }
    if let Some(doi) = work["DOI"].as_str() {
        record.fields.insert("DOI".into(), doi.to_string());
    }
    if let Some(issn) = work["ISSN"][0].as_str() {
        record.fields.insert("ISSN".into(), issn.to_string());
    }
    if let Some(volume) = work["volume"].as_str() {
        record.fields.insert("volume".into(), volume.to_string());
    }
    if let Some(issue) = work["issue"].as_str() {
        record.fields.insert("issue".into(), issue.to_string());
    }
    if let Some(pages) = work["page"].as_str() {
        record.fields.insert("pages".into(), pages.to_string());
    }
    if let Some(url) = work["URL"].as_str() {
        record.fields.insert("url".into(), url.to_string());
    }
    if let Some(date) = published_date(work) {
        record.fields.insert("date".into(), date);
    }

    if let Some(authors) = work["author"].as_array() {
        for author in authors {
            let given = author["given"].as_str();
            let family = author["family"].as_str();
            let creator = match (given, family) {
                (Some(given), Some(family)) => Creator::two_field(given, family),
                (None, Some(family)) => Creator::single_field(family),
                (Some(given), None) => Creator::single_field(given),
                (None, None) => match author["name"].as_str() {
                    Some(name) => Creator::single_field(name),
                    None => continue,
                },
            };
            record.creators.push(creator);
        }
    }

    record
}

fn published_date(work: &Value) -> Option<String> {
    let parts = work["published"]["date-parts"][0].as_array()?;
    let mut date = parts.first()?.as_i64()?.to_string();
    if let Some(month) = parts.get(1).and_then(Value::as_i64) {
        date.push_str(&format!("-{month:02}"));
        if let Some(day) = parts.get(2).and_then(Value::as_i64) {
            date.push_str(&format!("-{day:02}"));
        }
    }
    Some(date)
}
