//! Progress display sinks.

use std::io;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::CoordinatorExit;
use super::render::{ProgressView, active_line, counts, render};

const TEMPLATE: &str = "\n  {prefix} {wide_msg}\n  {wide_bar} {percent:>3}%\n\n  Press Ctrl+C to quit";

/// Destination for progress snapshots
///
/// Only the coordinator task calls into a display, so implementations need no
/// synchronization of their own.
pub trait ProgressDisplay: Send {
    /// Replace whatever was drawn before with `view`
    fn draw(&mut self, view: &ProgressView<'_>) -> io::Result<()>;

    /// Draw the last snapshot and release the display
    fn finish(&mut self, view: &ProgressView<'_>, exit: CoordinatorExit) -> io::Result<()>;
}

/// Live bar on the terminal, redrawn in place by `indicatif`
///
/// The bar stretches to the terminal width on every draw, so resizes need no
/// handling here.
pub struct TerminalDisplay {
    bar: ProgressBar,
}

impl TerminalDisplay {
    /// Display drawing on standard error
    pub fn stderr() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    /// Display drawing on an arbitrary `indicatif` target
    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(None, target);
        match ProgressStyle::with_template(TEMPLATE) {
            Ok(style) => bar.set_style(style.progress_chars("█░")),
            Err(e) => tracing::warn!(error = %e, "invalid progress template, using the default bar"),
        }
        Self { bar }
    }

    fn apply(&self, view: &ProgressView<'_>) {
        // Zero or unknown totals show an empty bar rather than indicatif's 100%.
        match view.total {
            Some(total) if total > 0 => {
                self.bar.set_length(total);
                self.bar.set_position(view.current.min(total));
            }
            _ => {
                self.bar.set_length(1);
                self.bar.set_position(0);
            }
        }
        self.bar.set_prefix(counts(view));
        self.bar.set_message(active_line(view));
    }
}

impl ProgressDisplay for TerminalDisplay {
    fn draw(&mut self, view: &ProgressView<'_>) -> io::Result<()> {
        self.apply(view);
        Ok(())
    }

    fn finish(&mut self, view: &ProgressView<'_>, exit: CoordinatorExit) -> io::Result<()> {
        self.apply(view);
        match exit {
            CoordinatorExit::Aborted | CoordinatorExit::Stopped => self.bar.finish_and_clear(),
            CoordinatorExit::Completed | CoordinatorExit::Exhausted => self.bar.finish(),
        }
        Ok(())
    }
}

/// Display for non-interactive output: frames are only traced
#[derive(Debug, Default)]
pub struct HiddenDisplay;

impl ProgressDisplay for HiddenDisplay {
    fn draw(&mut self, view: &ProgressView<'_>) -> io::Result<()> {
        tracing::trace!(frame = %render(view), "progress");
        Ok(())
    }

    fn finish(&mut self, view: &ProgressView<'_>, exit: CoordinatorExit) -> io::Result<()> {
        tracing::debug!(exit = ?exit, current = view.current, "progress display finished");
        Ok(())
    }
}
