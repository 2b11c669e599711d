//! Error taxonomy for the crawl pipeline.
//!
//! Every per-item failure is one of four kinds. None of them is fatal to a
//! run: the orchestrator counts them in the [`RunSummary`](crate::RunSummary)
//! and moves on.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Debug, Clone, Error)]
pub enum IngestError {
    /// The input URL cannot yield a book identifier. Never retried.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The page could not be fetched (status, timeout, transport).
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: FetchFailure },

    /// The page was fetched but a mandatory field is missing.
    #[error("incomplete data at {url}: missing {field}")]
    IncompleteData { url: String, field: &'static str },

    /// A single store write failed after its retries.
    #[error("store write failed ({write}): {message}")]
    StoreWrite { write: WriteKind, message: String },
}

impl IngestError {
    pub fn kind(&self) -> FailureKind {
        match self {
            IngestError::MalformedInput(_) => FailureKind::MalformedInput,
            IngestError::Fetch { .. } => FailureKind::Fetch,
            IngestError::IncompleteData { .. } => FailureKind::IncompleteData,
            IngestError::StoreWrite { .. } => FailureKind::StoreWrite,
        }
    }

    /// Whether a caller-side retry policy may try this again.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Fetch { reason, .. } => reason.is_retryable(),
            IngestError::StoreWrite { .. } => true,
            _ => false,
        }
    }

    pub fn fetch(url: &str, reason: FetchFailure) -> Self {
        IngestError::Fetch {
            url: url.to_string(),
            reason,
        }
    }
}

/// Why a fetch failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Non-success HTTP status.
    Status(u16),
    /// The bounded request timeout elapsed.
    Timeout,
    /// Connection, TLS, or body decoding failure.
    Network(String),
}

impl FetchFailure {
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchFailure::Status(code) => *code == 429 || *code >= 500,
            FetchFailure::Timeout | FetchFailure::Network(_) => true,
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Status(code) => write!(f, "http status {}", code),
            FetchFailure::Timeout => write!(f, "timed out"),
            FetchFailure::Network(msg) => write!(f, "network error: {}", msg),
        }
    }
}

/// Which of the three persistence write groups failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    Book,
    Metric,
    Review,
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WriteKind::Book => "book",
            WriteKind::Metric => "metric",
            WriteKind::Review => "review",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MalformedInput,
    Fetch,
    IncompleteData,
    StoreWrite,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::MalformedInput => "malformed_input",
            FailureKind::Fetch => "fetch",
            FailureKind::IncompleteData => "incomplete_data",
            FailureKind::StoreWrite => "store_write",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
