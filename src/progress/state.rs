//! Progress state machine -- pure transitions, no I/O and no timers.

use crate::types::Item;

use super::{CoordinatorExit, ProgressEvent};

/// Lifecycle phase of the coordinator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Accepting events and redrawing
    Running,
    /// Done; waiting out the settle delay before terminating with the given exit
    Completing(CoordinatorExit),
    /// Absorbing terminal state
    Terminated(CoordinatorExit),
}

/// What the actor loop must do after an event was applied
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Transition {
    /// Nothing beyond the state update
    None,
    /// Arm the settle timer
    ScheduleSettle,
    /// Disarm the settle timer
    CancelSettle,
    /// Stop immediately with this exit
    Terminate(CoordinatorExit),
}

/// Progress state owned exclusively by the coordinator task
#[derive(Debug)]
pub(crate) struct ProgressState {
    current: u64,
    total: Option<u64>,
    active: Vec<Item>,
    aborted: bool,
    phase: Phase,
}

impl ProgressState {
    pub(crate) fn new() -> Self {
        Self {
            current: 0,
            total: None,
            active: Vec::new(),
            aborted: false,
            phase: Phase::Running,
        }
    }

    pub(crate) fn current(&self) -> u64 {
        self.current
    }

    pub(crate) fn total(&self) -> Option<u64> {
        self.total
    }

    /// Items in flight, in the order they started
    pub(crate) fn active(&self) -> &[Item] {
        &self.active
    }

    pub(crate) fn aborted(&self) -> bool {
        self.aborted
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    /// Apply one mailbox event
    pub(crate) fn apply(&mut self, event: ProgressEvent) -> Transition {
        if let Phase::Terminated(_) = self.phase {
            return Transition::None;
        }

        match event {
            ProgressEvent::SetTotal(total) => self.set_total(total),
            ProgressEvent::Start(item) => {
                if !self.active.contains(&item) {
                    self.active.push(item);
                }
                Transition::None
            }
            ProgressEvent::Complete(item) => self.complete(&item),
            ProgressEvent::UserInterrupt => {
                self.aborted = true;
                self.terminate(CoordinatorExit::Aborted)
            }
            ProgressEvent::PipelineDrained => {
                if self.phase != Phase::Running {
                    return Transition::None;
                }
                let exit = if self.reached_total() {
                    CoordinatorExit::Completed
                } else {
                    CoordinatorExit::Exhausted
                };
                self.phase = Phase::Completing(exit);
                Transition::ScheduleSettle
            }
        }
    }

    /// The settle timer fired
    pub(crate) fn settle(&mut self) -> Option<CoordinatorExit> {
        match self.phase {
            Phase::Completing(exit) => {
                self.phase = Phase::Terminated(exit);
                Some(exit)
            }
            _ => None,
        }
    }

    /// The run lifetime was cancelled from outside
    pub(crate) fn stop(&mut self) -> CoordinatorExit {
        match self.phase {
            Phase::Terminated(exit) => exit,
            _ => {
                self.phase = Phase::Terminated(CoordinatorExit::Stopped);
                CoordinatorExit::Stopped
            }
        }
    }

    fn set_total(&mut self, total: u64) -> Transition {
        if let Some(previous) = self.total
            && total < previous
        {
            tracing::warn!(previous, total, "catalog total decreased");
        }
        // Completed items are real; the total never drops below them.
        self.total = Some(total.max(self.current));

        match self.phase {
            Phase::Running if self.reached_total() => {
                self.phase = Phase::Completing(CoordinatorExit::Completed);
                Transition::ScheduleSettle
            }
            Phase::Completing(CoordinatorExit::Completed) if !self.reached_total() => {
                self.phase = Phase::Running;
                Transition::CancelSettle
            }
            _ => Transition::None,
        }
    }

    fn complete(&mut self, item: &Item) -> Transition {
        self.active.retain(|active| active != item);
        self.current += 1;

        if let Some(total) = self.total
            && self.current > total
        {
            tracing::warn!(
                current = self.current,
                total,
                "more items completed than the catalog reported"
            );
            self.total = Some(self.current);
        }

        if self.phase == Phase::Running && self.reached_total() {
            self.phase = Phase::Completing(CoordinatorExit::Completed);
            return Transition::ScheduleSettle;
        }
        Transition::None
    }

    fn terminate(&mut self, exit: CoordinatorExit) -> Transition {
        self.phase = Phase::Terminated(exit);
        Transition::Terminate(exit)
    }

    fn reached_total(&self) -> bool {
        self.total.is_some_and(|total| self.current >= total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> Item {
        Item::new(id)
    }

    #[test]
    fn start_and_complete_track_active_set() {
        let mut state = ProgressState::new();
        state.apply(ProgressEvent::SetTotal(3));
        state.apply(ProgressEvent::Start(item("o/a")));
        state.apply(ProgressEvent::Start(item("o/b")));
        assert_eq!(state.active(), &[item("o/a"), item("o/b")]);

        let transition = state.apply(ProgressEvent::Complete(item("o/a")));
        assert_eq!(transition, Transition::None);
        assert_eq!(state.active(), &[item("o/b")]);
        assert_eq!(state.current(), 1);
    }

    #[test]
    fn out_of_order_completion_is_tolerated() {
        let mut state = ProgressState::new();
        state.apply(ProgressEvent::SetTotal(2));
        state.apply(ProgressEvent::Start(item("o/a")));
        state.apply(ProgressEvent::Start(item("o/b")));
        state.apply(ProgressEvent::Complete(item("o/b")));
        assert_eq!(state.active(), &[item("o/a")]);
        assert_eq!(state.phase(), Phase::Running);
    }

    #[test]
    fn reaching_total_schedules_settle_once() {
        let mut state = ProgressState::new();
        state.apply(ProgressEvent::SetTotal(2));
        state.apply(ProgressEvent::Complete(item("o/a")));

        let transition = state.apply(ProgressEvent::Complete(item("o/b")));
        assert_eq!(transition, Transition::ScheduleSettle);
        assert_eq!(
            state.phase(),
            Phase::Completing(CoordinatorExit::Completed)
        );

        assert_eq!(state.settle(), Some(CoordinatorExit::Completed));
        assert_eq!(state.settle(), None, "terminal state is absorbing");
        assert_eq!(
            state.phase(),
            Phase::Terminated(CoordinatorExit::Completed)
        );
    }

    #[test]
    fn completions_before_total_do_not_terminate() {
        let mut state = ProgressState::new();
        state.apply(ProgressEvent::Complete(item("o/a")));
        assert_eq!(state.phase(), Phase::Running, "total unknown, keep running");

        let transition = state.apply(ProgressEvent::SetTotal(3));
        assert_eq!(transition, Transition::None);
        assert_eq!(state.total(), Some(3));
    }

    #[test]
    fn raising_total_while_completing_resumes_running() {
        let mut state = ProgressState::new();
        state.apply(ProgressEvent::SetTotal(1));
        state.apply(ProgressEvent::Complete(item("o/a")));
        assert!(matches!(state.phase(), Phase::Completing(_)));

        let transition = state.apply(ProgressEvent::SetTotal(2));
        assert_eq!(transition, Transition::CancelSettle);
        assert_eq!(state.phase(), Phase::Running);

        let transition = state.apply(ProgressEvent::Complete(item("o/b")));
        assert_eq!(transition, Transition::ScheduleSettle);
    }

    #[test]
    fn repeated_identical_total_is_harmless() {
        let mut state = ProgressState::new();
        for _ in 0..3 {
            assert_eq!(state.apply(ProgressEvent::SetTotal(5)), Transition::None);
        }
        assert_eq!(state.total(), Some(5));
    }

    #[test]
    fn current_never_exceeds_total() {
        let mut state = ProgressState::new();
        state.apply(ProgressEvent::SetTotal(2));
        state.apply(ProgressEvent::Complete(item("o/a")));
        state.apply(ProgressEvent::Complete(item("o/b")));
        state.apply(ProgressEvent::Complete(item("o/c")));
        assert_eq!(state.current(), 3);
        assert_eq!(state.total(), Some(3));

        state.apply(ProgressEvent::SetTotal(1));
        assert_eq!(state.total(), Some(3), "total never drops below current");
    }

    #[test]
    fn zero_total_completes_without_items() {
        let mut state = ProgressState::new();
        let transition = state.apply(ProgressEvent::SetTotal(0));
        assert_eq!(transition, Transition::ScheduleSettle);
        assert_eq!(state.settle(), Some(CoordinatorExit::Completed));
    }

    #[test]
    fn interrupt_terminates_immediately_and_absorbs() {
        let mut state = ProgressState::new();
        state.apply(ProgressEvent::SetTotal(10));
        state.apply(ProgressEvent::Start(item("o/a")));

        let transition = state.apply(ProgressEvent::UserInterrupt);
        assert_eq!(transition, Transition::Terminate(CoordinatorExit::Aborted));
        assert!(state.aborted());

        assert_eq!(
            state.apply(ProgressEvent::Complete(item("o/a"))),
            Transition::None
        );
        assert_eq!(state.current(), 0, "no events accepted after termination");
        assert_eq!(state.stop(), CoordinatorExit::Aborted);
    }

    #[test]
    fn interrupt_while_completing_aborts() {
        let mut state = ProgressState::new();
        state.apply(ProgressEvent::SetTotal(1));
        state.apply(ProgressEvent::Complete(item("o/a")));

        let transition = state.apply(ProgressEvent::UserInterrupt);
        assert_eq!(transition, Transition::Terminate(CoordinatorExit::Aborted));
        assert_eq!(state.settle(), None);
    }

    #[test]
    fn drained_short_of_total_exhausts() {
        let mut state = ProgressState::new();
        state.apply(ProgressEvent::SetTotal(1500));
        state.apply(ProgressEvent::Complete(item("o/a")));

        let transition = state.apply(ProgressEvent::PipelineDrained);
        assert_eq!(transition, Transition::ScheduleSettle);
        assert_eq!(state.settle(), Some(CoordinatorExit::Exhausted));
    }

    #[test]
    fn drained_after_completing_keeps_completed() {
        let mut state = ProgressState::new();
        state.apply(ProgressEvent::SetTotal(1));
        state.apply(ProgressEvent::Complete(item("o/a")));

        assert_eq!(
            state.apply(ProgressEvent::PipelineDrained),
            Transition::None
        );
        assert_eq!(state.settle(), Some(CoordinatorExit::Completed));
    }

    #[test]
    fn stop_terminates_running_state() {
        let mut state = ProgressState::new();
        assert_eq!(state.stop(), CoordinatorExit::Stopped);
        assert_eq!(state.apply(ProgressEvent::SetTotal(1)), Transition::None);
    }
}
