//! Internal bibliographic record model
//!
//! Translators produce `Record` values; the formatter turns them into the
//! public item JSON. The shape is deliberately closed: a known item type, an
//! ordered field map checked against a known field list at format time,
//! plus creators, tags and notes. Unknown fields never ride along silently.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One extracted bibliographic record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    /// Item type, e.g. `journalArticle`; unknown types format as `webpage`
    pub item_type: String,
    /// Scalar bibliographic fields in display order
    pub fields: IndexMap<String, String>,
    pub creators: Vec<Creator>,
    pub tags: Vec<String>,
    /// Free-text notes; each expands into a child item on formatting
    pub notes: Vec<String>,
}

/// A contributor entry on a record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Creator {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Defaults to `author` when absent or unrecognized
    pub creator_type: Option<String>,
    /// Institutional/single-field names are emitted as one `name` value
    pub single_field: bool,
}

impl Record {
    pub fn new(item_type: impl Into<String>) -> Self {
        Record {
            item_type: item_type.into(),
            ..Default::default()
        }
    }

    /// Builder-style field setter used by translators and tests
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn creator(mut self, creator: Creator) -> Self {
        self.creators.push(creator);
        self
    }
}

impl Creator {
    pub fn two_field(first: impl Into<String>, last: impl Into<String>) -> Self {
        Creator {
            first_name: Some(first.into()),
            last_name: Some(last.into()),
            ..Default::default()
        }
    }

    pub fn single_field(name: impl Into<String>) -> Self {
        Creator {
            last_name: Some(name.into()),
            single_field: true,
            ..Default::default()
        }
    }
}

/// Item types the formatter accepts as-is
pub static KNOWN_ITEM_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "book",
        "bookSection",
        "journalArticle",
        "magazineArticle",
        "newspaperArticle",
        "conferencePaper",
        "thesis",
        "report",
        "preprint",
        "webpage",
        "document",
        "note",
    ]
    .into_iter()
    .collect()
});

/// Scalar fields the formatter will carry into the public item
pub static KNOWN_FIELDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "title",
        "abstractNote",
        "publicationTitle",
        "bookTitle",
        "proceedingsTitle",
        "journalAbbreviation",
        "volume",
        "issue",
        "pages",
        "numPages",
        "edition",
        "series",
        "seriesNumber",
        "publisher",
        "place",
        "institution",
        "university",
        "date",
        "accessDate",
        "language",
        "DOI",
        "ISBN",
        "ISSN",
        "url",
        "rights",
        "extra",
        "shortTitle",
        "archive",
        "archiveLocation",
        "libraryCatalog",
        "callNumber",
        "section",
    ]
    .into_iter()
    .collect()
});

/// Creator types the formatter accepts; anything else falls back to `author`
pub static KNOWN_CREATOR_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "author",
        "editor",
        "contributor",
        "translator",
        "seriesEditor",
        "bookAuthor",
        "reviewedAuthor",
    ]
    .into_iter()
    .collect()
});
