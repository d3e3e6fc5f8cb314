//! Error types for bibsearch-server
//!
//! One enum covers the whole taxonomy: client errors (4xx, descriptive and
//! user-safe), extraction failures (501, generic message with the detail
//! logged), and internal failures (500, opaque message with the detail
//! logged). `IntoResponse` maps each variant to its status plus an
//! `{"error": ...}` JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Main error type for bibsearch-server
#[derive(Error, Debug)]
pub enum Error {
    /// Request content type is neither plain text nor JSON
    #[error("unsupported content type; use text/plain or application/json")]
    UnsupportedContentType,

    /// Request arrived without a body
    #[error("POST data not provided")]
    MissingBody,

    /// Body could not be parsed into a query or a resume request
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// Resume request without a 'session' token
    #[error("'session' not provided")]
    MissingSession,

    /// Resume token not in the table: already consumed, swept, or never issued
    #[error("unknown or expired session '{0}'")]
    UnknownSession(String),

    /// Resume request without an 'items' selection
    #[error("'items' not provided")]
    MissingItems,

    /// Resume request selected nothing
    #[error("no items specified")]
    NoItemsSelected,

    /// Resume request's url does not match the query stored in the session
    #[error("'url' '{supplied}' does not match URL '{expected}' in session")]
    QueryMismatch { supplied: String, expected: String },

    /// A selected key/label is not among the items originally offered
    #[error("items specified do not match items available")]
    ItemMismatch,

    /// No translator supports the query
    #[error("no translators available")]
    NoTranslators,

    /// Every supporting translator was tried and none produced a result
    #[error("no results found")]
    NoResults,

    /// Every supporting translator was tried and the last one failed
    /// outright; detail is logged, never exposed
    #[error("an error occurred during translation")]
    Translation(String),

    /// Anything else unexpected; detail is logged, never exposed
    #[error("internal server error")]
    Internal(String),
}

/// Convenience Result type using bibsearch-server Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    fn status(&self) -> StatusCode {
        match self {
            Error::UnsupportedContentType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::MissingBody
            | Error::InvalidBody(_)
            | Error::MissingSession
            | Error::MissingItems
            | Error::NoItemsSelected => StatusCode::BAD_REQUEST,
            Error::UnknownSession(_) => StatusCode::NOT_FOUND,
            Error::QueryMismatch { .. } | Error::ItemMismatch => StatusCode::CONFLICT,
            Error::NoTranslators | Error::NoResults | Error::Translation(_) => {
                StatusCode::NOT_IMPLEMENTED
            }
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Translation(detail) => error!(%detail, "translation failed"),
            Error::Internal(detail) => error!(%detail, "internal error"),
            Error::NoTranslators | Error::NoResults => warn!("extraction failed: {}", self),
            _ => {}
        }

        // Display for the opaque variants omits the server-side detail
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
