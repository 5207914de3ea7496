//! # bulk-clone
//!
//! Clone or sync every repository of a GitHub owner, concurrently, with a live
//! progress view.
//!
//! ## Design Philosophy
//!
//! bulk-clone is built around a small pipeline:
//! - **Item source** - pages through the catalog and feeds a bounded dispatch queue
//! - **Worker pool** - symmetric workers pull items and clone or sync each one
//! - **Progress coordinator** - a single task owning all progress state, reached only by events
//! - **Orchestrator** - one cancelable lifetime, a deadline, and aggregated item errors
//!
//! Item failures never stop the run; they are collected from every worker and
//! reported together at the end. A catalog failure, an operator interrupt, or the
//! deadline cancel the run.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use bulk_clone::{Config, GhCliProcessor, GitHubCatalog, Orchestrator, TerminalDisplay};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         owner: "octo-org".to_string(),
//!         ..Default::default()
//!     };
//!     config.validate()?;
//!
//!     let catalog = GitHubCatalog::from_config(&config.catalog, None).await?;
//!     let processor = GhCliProcessor::from_config(&config.clone)?;
//!
//!     let report = Orchestrator::new(config, Arc::new(catalog), Arc::new(processor))
//!         .run(Box::new(TerminalDisplay::stderr()))
//!         .await?;
//!
//!     std::process::exit(report.outcome.exit_code());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Remote repository catalog
pub mod catalog;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Operator interrupt input
pub mod input;
/// Shared cancelable run lifetime
pub mod lifetime;
/// Run orchestration
pub mod orchestrator;
/// Per-item clone/sync processing
pub mod processor;
/// Progress coordination and rendering
pub mod progress;
/// Catalog pagination feeding the dispatch queue
pub mod source;
/// Core types
pub mod types;
/// Worker pool
pub mod worker;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogPage, GitHubCatalog, PageRequest, SearchScope};
pub use config::{CatalogConfig, CloneConfig, Config, ProgressConfig};
pub use error::{
    AggregatedError, CancellationCause, Error, FetchError, ItemError, RenderError, Result,
};
pub use lifetime::RunLifetime;
pub use input::InterruptSignal;
pub use orchestrator::Orchestrator;
pub use processor::{GhCliProcessor, ItemProcessor, ProcessError, ProcessMode, ProcessRequest};
pub use progress::{
    CoordinatorExit, HiddenDisplay, ProgressDisplay, ProgressEvent, ProgressHandle,
    TerminalDisplay,
};
pub use types::{Item, RunOutcome, RunReport};
