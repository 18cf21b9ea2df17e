//! Error taxonomy shared by the resolver and the aggregation pipeline.
//!
//! Every variant is surfaced to the caller unchanged; nothing in this crate
//! retries. Non-fatal conditions (unplaceable fragments, ambiguous duplicates)
//! never become errors, they are logged with `tracing` instead.

use thiserror::Error;

/// Fixed internal code reported for any upstream fetch failure.
pub const UPSTREAM_HTTP_ERROR: u32 = 1;

/// Fixed internal code reported when native and translated arrays disagree.
pub const UNEQUAL_LENGTH_ERROR: u32 = 2;

/// Errors raised by [`resolve`](crate::resolver::resolve) and
/// [`Aggregator::aggregate`](crate::pipeline::Aggregator::aggregate).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No title prefix of the query matched the alias index.
    #[error("Could not find title: {query}")]
    UnknownTitle { query: String },

    /// The remainder of a query could not be parsed as a page or page range.
    ///
    /// `tokens` holds the literal offending token(s), possibly empty when the
    /// query shape itself (rather than a token) was the problem.
    #[error("{message}")]
    InvalidQuery {
        tokens: Vec<String>,
        message: String,
    },

    /// One or more pages fall outside the title's validated range.
    #[error("{}", page_does_not_exist_message(.title, .pages))]
    PageDoesNotExist { title: String, pages: Vec<String> },

    /// One or more concurrently issued fetches failed; `bodies` aggregates
    /// every failing response body (or transport error description).
    #[error("{}", .bodies.join("\n"))]
    UpstreamFetch { bodies: Vec<String> },

    /// The primary text's native and translated arrays differ in length.
    #[error("Hebrew length != English length")]
    LengthMismatch { unmatched: Vec<String> },
}

impl Error {
    /// Machine-readable code for transport to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnknownTitle { .. } => "unknown_title",
            Error::InvalidQuery { .. } => "invalid_query",
            Error::PageDoesNotExist { .. } => "page_does_not_exist",
            Error::UpstreamFetch { .. } => "upstream_fetch",
            Error::LengthMismatch { .. } => "length_mismatch",
        }
    }

    /// Internal numeric code for upstream-facing failures.
    pub fn internal_code(&self) -> Option<u32> {
        match self {
            Error::UpstreamFetch { .. } => Some(UPSTREAM_HTTP_ERROR),
            Error::LengthMismatch { .. } => Some(UNEQUAL_LENGTH_ERROR),
            _ => None,
        }
    }

    /// Whether the failure was caused by the caller's input rather than by
    /// the upstream text source.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownTitle { .. } | Error::InvalidQuery { .. } | Error::PageDoesNotExist { .. }
        )
    }

    pub(crate) fn invalid_query(message: impl Into<String>) -> Self {
        Error::InvalidQuery {
            tokens: Vec::new(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Joins items as "a, b and c".
pub fn format_list_english(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

fn page_does_not_exist_message(title: &str, pages: &[String]) -> String {
    if pages.len() == 1 {
        format!("{} {} doesn't exist", title, pages[0])
    } else {
        format!("{} {} don't exist", title, format_list_english(pages))
    }
}
