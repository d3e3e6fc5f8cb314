//! # bibsearch Server Library
//!
//! HTTP service exposing the search-and-disambiguate workflow over
//! bibliographic identifiers: submit a free-text identifier, get either the
//! final item array or a "multiple choices" answer whose token lets a
//! follow-up request pick one candidate and finish the job.

pub mod api;
pub mod error;
pub mod providers;
pub mod session;

pub use api::{build_router, AppState};
pub use error::{Error, Result};
