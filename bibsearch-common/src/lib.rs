//! # bibsearch Common Library
//!
//! Shared code for the bibsearch service:
//! - Identifier recognition (DOI/ISBN/ISSN/PMID)
//! - Internal record model
//! - Public item formatting
//! - Extraction engine abstraction (translators, candidates, prompts)

pub mod engine;
pub mod format;
pub mod identifier;
pub mod record;

pub use engine::{Engine, SearchQuery, TranslateError, Translator};
pub use record::{Creator, Record};
