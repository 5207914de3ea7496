//! Core types for bulk-clone

use std::path::{Path, PathBuf};

use crate::error::{AggregatedError, RenderError};

/// Identifier of one unit of work, a repository in `owner/name` form
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Item(String);

impl Item {
    /// Create a new Item
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the identifier into its owner and repository name
    ///
    /// Returns `None` unless the identifier has exactly one `/` with non-empty
    /// parts on both sides.
    pub fn owner_and_name(&self) -> Option<(&str, &str)> {
        let (owner, name) = self.0.split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some((owner, name))
    }

    /// Local checkout path for this item below `root` (`<root>/<owner>/<name>`)
    pub fn target_path(&self, root: &Path) -> Option<PathBuf> {
        let (owner, name) = self.owner_and_name()?;
        Some(root.join(owner).join(name))
    }
}

impl From<&str> for Item {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Item {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl PartialEq<&str> for Item {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Terminal classification of a run
#[derive(Debug)]
pub enum RunOutcome {
    /// Every item was processed successfully
    Completed,
    /// The operator interrupted the run; not an error
    Aborted,
    /// The wall-clock deadline elapsed before the run finished
    DeadlineExceeded,
    /// At least one item failed; contains every failure
    Failed(AggregatedError),
}

impl RunOutcome {
    /// Process exit code for this outcome
    ///
    /// A user abort exits cleanly, a deadline or item failures do not.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed | RunOutcome::Aborted => 0,
            RunOutcome::DeadlineExceeded | RunOutcome::Failed(_) => 1,
        }
    }

    /// Whether the outcome maps to a successful exit
    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }
}

/// Result of a finished run as reported by the orchestrator
#[derive(Debug)]
pub struct RunReport {
    /// Final classification of the run
    pub outcome: RunOutcome,
    /// Items completed (success or failure) as last seen by the progress coordinator
    pub completed: u64,
    /// Last total reported by the catalog, if any
    pub total: Option<u64>,
    /// First progress display failure, if rendering broke during the run
    pub render_failure: Option<RenderError>,
}
