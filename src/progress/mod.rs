//! Progress coordination -- a single-writer actor that owns all progress state.
//!
//! Split into focused submodules:
//! - [`state`] - Event-sourced state machine (counts, active set, abort flag)
//! - [`render`] - Pure frame rendering from a state snapshot
//! - [`display`] - Sinks that put frames on screen
//! - [`coordinator`] - The actor task: mailbox, render ticks, settle timer
//!
//! Every other task talks to the coordinator through a [`ProgressHandle`];
//! nothing else can read or mutate the state.

mod coordinator;
pub mod display;
pub mod render;
mod state;


use tokio::sync::mpsc;

use crate::error::RenderError;
use crate::types::Item;

pub use coordinator::ProgressCoordinator;
pub use display::{HiddenDisplay, ProgressDisplay, TerminalDisplay};
pub use render::{ProgressView, render};

/// Events accepted by the coordinator's mailbox
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The catalog reported the expected number of items
    SetTotal(u64),
    /// A worker picked up an item
    Start(Item),
    /// A worker finished an item, successfully or not
    Complete(Item),
    /// The operator asked to stop
    UserInterrupt,
    /// The source and every worker have unwound; no further events will follow
    PipelineDrained,
}

/// How the coordinator terminated
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinatorExit {
    /// Every expected item completed
    Completed,
    /// The pipeline drained before the reported total was reached
    Exhausted,
    /// The operator interrupted the run
    Aborted,
    /// The run lifetime was cancelled from outside (deadline, fatal error)
    Stopped,
}

/// Final state handed back by the coordinator task
#[derive(Debug)]
pub struct CoordinatorReport {
    /// Terminal state
    pub exit: CoordinatorExit,
    /// Items completed
    pub current: u64,
    /// Last known total
    pub total: Option<u64>,
    /// Whether an interrupt was received
    pub aborted: bool,
    /// First display failure, if any
    pub render_failure: Option<RenderError>,
}

/// Sending side of the coordinator's mailbox
///
/// Sends never block. Once the coordinator has terminated, events are dropped.
#[derive(Clone, Debug)]
pub struct ProgressHandle {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressHandle {
    /// Create a handle together with its raw mailbox, for callers that consume events themselves
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Report the expected total
    pub fn set_total(&self, total: u64) {
        self.send(ProgressEvent::SetTotal(total));
    }

    /// Report that `item` was picked up
    pub fn start(&self, item: &Item) {
        self.send(ProgressEvent::Start(item.clone()));
    }

    /// Report that `item` is done
    pub fn complete(&self, item: &Item) {
        self.send(ProgressEvent::Complete(item.clone()));
    }

    /// Forward an operator interrupt
    pub fn interrupt(&self) {
        self.send(ProgressEvent::UserInterrupt);
    }

    /// Signal that no further item events will be sent
    pub fn pipeline_drained(&self) {
        self.send(ProgressEvent::PipelineDrained);
    }

    /// Whether the coordinator is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, event: ProgressEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("progress coordinator gone, event dropped");
        }
    }
}
