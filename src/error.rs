//! Error types for bulk-clone
//!
//! Errors fall into four families with different propagation rules:
//! - [`FetchError`] - the remote catalog failed; fatal to the whole run
//! - [`ItemError`] - one item failed; recorded and merged into an [`AggregatedError`]
//! - [`CancellationCause`] - why the shared run lifetime was cancelled
//! - [`RenderError`] - the progress display failed; surfaced but never aborts work

use std::fmt;
use thiserror::Error;

use crate::types::Item;

/// Result type alias for bulk-clone operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bulk-clone
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "workers")
        key: Option<String>,
    },

    /// Remote catalog query failed
    #[error("failed to list repositories: {0}")]
    Fetch(#[from] FetchError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External tool execution failed (gh)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// The run lifetime was cancelled while the operation was blocked
    #[error("cancelled: {0}")]
    Cancelled(CancellationCause),

    /// Progress display failed
    #[error(transparent)]
    Render(#[from] RenderError),

    /// A pipeline task panicked or could not be joined
    #[error("pipeline task failed: {0}")]
    TaskFailed(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a config key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Failures of the paginated catalog query
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure talking to the catalog
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The catalog answered with a non-success HTTP status
    #[error("catalog returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// The query reached the catalog but was rejected (GraphQL `errors`)
    #[error("query rejected: {0}")]
    Query(String),

    /// No credentials could be found for the catalog
    #[error("authentication unavailable: {0}")]
    Auth(String),

    /// The response could not be interpreted
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A single item's processing failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{item}: {cause}")]
pub struct ItemError {
    /// The item that failed
    pub item: Item,
    /// Human-readable diagnostic from the processor
    pub cause: String,
}

impl ItemError {
    /// Create a new item error
    pub fn new(item: Item, cause: impl Into<String>) -> Self {
        Self {
            item,
            cause: cause.into(),
        }
    }
}

/// Why the shared run lifetime was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationCause {
    /// The operator interrupted the run
    UserAbort,
    /// The wall-clock deadline elapsed
    Deadline,
    /// A fatal pipeline error (catalog failure, panicked task)
    Fatal,
}

impl fmt::Display for CancellationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CancellationCause::UserAbort => "aborted by user",
            CancellationCause::Deadline => "deadline exceeded",
            CancellationCause::Fatal => "fatal pipeline error",
        };
        f.write_str(text)
    }
}

/// The progress display could not be written
#[derive(Debug, Error)]
#[error("progress display failed: {source}")]
pub struct RenderError {
    /// Underlying write failure
    #[from]
    pub source: std::io::Error,
}

/// Every per-item failure of a run, collected from all workers
///
/// Entries are kept in item order so reporting does not depend on which
/// worker finished first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedError {
    failures: Vec<ItemError>,
}

impl AggregatedError {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failure
    pub fn push(&mut self, failure: ItemError) {
        let at = self
            .failures
            .partition_point(|existing| existing.item <= failure.item);
        self.failures.insert(at, failure);
    }

    /// Merge another collection into this one
    pub fn merge(&mut self, other: AggregatedError) {
        for failure in other.failures {
            self.push(failure);
        }
    }

    /// Whether no failures were recorded
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of recorded failures
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Recorded failures, ordered by item
    pub fn failures(&self) -> &[ItemError] {
        &self.failures
    }

    /// Failure recorded for `item`, if any
    pub fn get(&self, item: &str) -> Option<&ItemError> {
        self.failures.iter().find(|f| f.item == item)
    }
}

impl Extend<ItemError> for AggregatedError {
    fn extend<T: IntoIterator<Item = ItemError>>(&mut self, iter: T) {
        for failure in iter {
            self.push(failure);
        }
    }
}

impl FromIterator<ItemError> for AggregatedError {
    fn from_iter<T: IntoIterator<Item = ItemError>>(iter: T) -> Self {
        let mut aggregated = AggregatedError::new();
        aggregated.extend(iter);
        aggregated
    }
}

impl fmt::Display for AggregatedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} repositories failed", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregatedError {}
