//! Error types for the Bulwark GraphQL client.

use bulwark_core::Classify;
use bulwark_types::ErrorKind;
use thiserror::Error;

/// Errors that can occur on a single GraphQL request.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport failure: connect, timeout, or body read.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server rejected the credentials (401/403).
    #[error("Unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// Server returned 404.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Server returned 408.
    #[error("Request timed out (408)")]
    RequestTimeout,

    /// Server returned 429 Too Many Requests.
    #[error("Rate limited (429): retry after {retry_after:?}")]
    RateLimited {
        /// Raw `Retry-After` header, if provided.
        retry_after: Option<String>,
    },

    /// Server returned a 5xx error.
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Any other non-success status.
    #[error("Bad request ({status}): {message}")]
    BadRequest { status: u16, message: String },

    /// Response body was not a GraphQL response.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Response carried a non-empty `errors` array.
    #[error("GraphQL errors: {}", messages.join("; "))]
    GraphQl { messages: Vec<String> },
}

impl ClientError {
    /// Map a non-success HTTP status to an error.
    pub fn from_status(status: u16, message: String, retry_after: Option<String>) -> Self {
        match status {
            401 | 403 => Self::Unauthorized { status, message },
            404 => Self::NotFound(message),
            408 => Self::RequestTimeout,
            429 => Self::RateLimited { retry_after },
            500..=599 => Self::ServerError { status, message },
            _ => Self::BadRequest { status, message },
        }
    }
}

impl Classify for ClientError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Request(e) if e.is_timeout() => ErrorKind::Timeout,
            Self::Request(e) if e.is_decode() => ErrorKind::Format,
            Self::Request(e) if e.is_builder() => ErrorKind::Client,
            Self::Request(_) => ErrorKind::Network,
            Self::Unauthorized { .. } => ErrorKind::Auth,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::RequestTimeout => ErrorKind::Timeout,
            Self::RateLimited { .. } => ErrorKind::RateLimit,
            Self::ServerError { .. } => ErrorKind::Server,
            Self::BadRequest { .. } => ErrorKind::Client,
            Self::InvalidResponse(_) => ErrorKind::Format,
            Self::GraphQl { .. } => ErrorKind::Schema,
        }
    }

    fn retry_after(&self) -> Option<&str> {
        match self {
            Self::RateLimited { retry_after } => retry_after.as_deref(),
            _ => None,
        }
    }
}
