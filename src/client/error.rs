//! Remote API error types.
//!
//! Errors are categorized so that callers can tell transport failures apart
//! from the remote reporting a missing item:
//!
//! - **Transport**: network/HTTP-level failure; the response carries no
//!   usable data and nothing may be deleted from the cache because of it.
//! - **RateLimited**: the remote signalled an exhausted cost budget.
//! - **NotFound**: the remote reports that an item could not be resolved.
//!   For batched queries this is non-fatal; the item is simply absent.
//!
//! Invariant violations (for example a batch exceeding the query arity) are
//! programming errors and panic instead of surfacing here.

use std::fmt;

use thiserror::Error;

/// The kind of remote API error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    /// Network or HTTP-level failure.
    Transport,

    /// The remote signalled an exhausted request budget.
    RateLimited,

    /// The remote reports the requested item does not resolve.
    NotFound,
}

/// A remote API error with categorization.
#[derive(Debug, Error)]
pub struct ClientError {
    pub kind: ClientErrorKind,
    pub message: String,

    /// The underlying octocrab error, if this came from the transport.
    #[source]
    pub source: Option<octocrab::Error>,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ClientErrorKind::Transport => write!(f, "transport error: {}", self.message),
            ClientErrorKind::RateLimited => write!(f, "rate limited: {}", self.message),
            ClientErrorKind::NotFound => write!(f, "not found: {}", self.message),
        }
    }
}

impl ClientError {
    pub fn transport(message: impl Into<String>) -> Self {
        ClientError {
            kind: ClientErrorKind::Transport,
            message: message.into(),
            source: None,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        ClientError {
            kind: ClientErrorKind::RateLimited,
            message: message.into(),
            source: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ClientError {
            kind: ClientErrorKind::NotFound,
            message: message.into(),
            source: None,
        }
    }

    /// Categorizes an octocrab error.
    pub fn from_octocrab(err: octocrab::Error) -> Self {
        let message = err.to_string();
        let kind = if is_rate_limit_message(&message) {
            ClientErrorKind::RateLimited
        } else {
            ClientErrorKind::Transport
        };

        ClientError {
            kind,
            message,
            source: Some(err),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ClientErrorKind::NotFound
    }
}

/// Error from a labels fetch that may have collected some pages before
/// failing. The partial result is still applied to the cache by the caller.
#[derive(Debug, Error)]
#[error("labels fetch failed after {} labels: {source}", fetched.len())]
pub struct LabelsError {
    /// Labels collected before the failing page.
    pub fetched: Vec<String>,

    #[source]
    pub source: ClientError,
}

/// Checks if an error message indicates an exhausted rate limit.
fn is_rate_limit_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("rate limit")
        || message.contains("api rate")
        || message.contains("secondary rate")
        || message.contains("abuse detection")
}
