//! Item processing -- the unit of work a worker performs for one repository.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::types::Item;

pub mod gh;

pub use gh::GhCliProcessor;

/// Whether a repository is created or brought up to date
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessMode {
    /// Target path is absent: clone into it
    Clone,
    /// Target path exists: sync it in place
    Sync,
}

impl ProcessMode {
    /// Pick the mode by inspecting the local filesystem
    ///
    /// Anything already at `target` (even if it cannot be inspected further)
    /// selects [`ProcessMode::Sync`].
    pub async fn for_target(target: &Path) -> Self {
        match tokio::fs::symlink_metadata(target).await {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ProcessMode::Clone,
            _ => ProcessMode::Sync,
        }
    }
}

/// Everything a processor needs for one item
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessRequest {
    /// Repository identifier
    pub item: Item,
    /// Local checkout path derived from the identifier
    pub target: PathBuf,
    /// Clone or sync
    pub mode: ProcessMode,
    /// Extra flags passed through to the underlying tool
    pub extra_args: Vec<String>,
}

/// Why processing an item did not succeed
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProcessError {
    /// The operation failed; carries human-readable diagnostics
    #[error("{0}")]
    Failed(String),
    /// The run was cancelled while the operation was in flight
    #[error("cancelled")]
    Cancelled,
}

/// Performs the clone or sync of one item
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    /// Process one item, stopping early once `cancel` fires
    async fn process(
        &self,
        request: &ProcessRequest,
        cancel: &CancellationToken,
    ) -> Result<(), ProcessError>;

    /// Short name of the implementation, for logs
    fn name(&self) -> &'static str;
}
