//! The coordinator actor task.

use std::pin::Pin;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;

use crate::config::ProgressConfig;
use crate::error::RenderError;

use super::display::ProgressDisplay;
use super::render::ProgressView;
use super::state::{ProgressState, Transition};
use super::{CoordinatorExit, CoordinatorReport, ProgressEvent, ProgressHandle};

/// Single-writer owner of progress state
///
/// Runs as exactly one task. Events arrive in mailbox order; render ticks and
/// the settle timer are multiplexed with them in one `select!` loop.
pub struct ProgressCoordinator {
    state: ProgressState,
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
    display: Box<dyn ProgressDisplay>,
    config: ProgressConfig,
    stop: CancellationToken,
    render_failure: Option<RenderError>,
}

impl ProgressCoordinator {
    /// Create a coordinator reading from `rx`
    ///
    /// `stop` terminates the coordinator with [`CoordinatorExit::Stopped`].
    pub fn new(
        config: ProgressConfig,
        rx: mpsc::UnboundedReceiver<ProgressEvent>,
        display: Box<dyn ProgressDisplay>,
        stop: CancellationToken,
    ) -> Self {
        Self {
            state: ProgressState::new(),
            rx,
            display,
            config,
            stop,
            render_failure: None,
        }
    }

    /// Spawn a coordinator task and return the handle to its mailbox
    pub fn spawn(
        config: ProgressConfig,
        display: Box<dyn ProgressDisplay>,
        stop: CancellationToken,
    ) -> (ProgressHandle, JoinHandle<CoordinatorReport>) {
        let (handle, rx) = ProgressHandle::channel();
        let coordinator = Self::new(config, rx, display, stop);
        (handle, tokio::spawn(coordinator.run()))
    }

    /// Process events until a terminal state is reached
    pub async fn run(mut self) -> CoordinatorReport {
        let mut tick = render_interval(&self.config);
        let mut settle: Option<Pin<Box<Sleep>>> = None;
        let mut mailbox_open = true;

        let exit = loop {
            tokio::select! {
                biased;

                _ = self.stop.cancelled() => {
                    break self.state.stop();
                }

                event = self.rx.recv(), if mailbox_open => {
                    let event = match event {
                        Some(event) => event,
                        None => {
                            // Every sender is gone, so nothing can follow.
                            mailbox_open = false;
                            ProgressEvent::PipelineDrained
                        }
                    };
                    tracing::trace!(event = ?event, "progress event");
                    match self.state.apply(event) {
                        Transition::None => {}
                        Transition::ScheduleSettle => {
                            settle = Some(Box::pin(tokio::time::sleep(self.config.settle_delay)));
                        }
                        Transition::CancelSettle => settle = None,
                        Transition::Terminate(exit) => break exit,
                    }
                }

                _ = async {
                    if let Some(sleep) = settle.as_mut() {
                        sleep.await;
                    }
                }, if settle.is_some() => {
                    settle = None;
                    if let Some(exit) = self.state.settle() {
                        break exit;
                    }
                }

                _ = tick.tick() => self.redraw(),
            }
        };

        self.finish(exit)
    }

    fn redraw(&mut self) {
        if self.render_failure.is_some() {
            return;
        }
        let drawn = self.display.draw(&ProgressView {
            current: self.state.current(),
            total: self.state.total(),
            active: self.state.active(),
        });
        if let Err(e) = drawn {
            self.record_render_failure(e);
        }
    }

    fn record_render_failure(&mut self, error: std::io::Error) {
        tracing::warn!(error = %error, "progress display failed; continuing without it");
        if self.render_failure.is_none() {
            self.render_failure = Some(RenderError::from(error));
        }
    }

    fn finish(mut self, exit: CoordinatorExit) -> CoordinatorReport {
        if self.render_failure.is_none() {
            let finished = self.display.finish(
                &ProgressView {
                    current: self.state.current(),
                    total: self.state.total(),
                    active: self.state.active(),
                },
                exit,
            );
            if let Err(e) = finished {
                self.record_render_failure(e);
            }
        }

        tracing::debug!(
            exit = ?exit,
            current = self.state.current(),
            total = ?self.state.total(),
            "progress coordinator terminated"
        );

        CoordinatorReport {
            exit,
            current: self.state.current(),
            total: self.state.total(),
            aborted: self.state.aborted(),
            render_failure: self.render_failure,
        }
    }
}

fn render_interval(config: &ProgressConfig) -> Interval {
    let period = config
        .tick_interval
        .max(std::time::Duration::from_millis(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}
