//! The navigation state machine.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::steps::{compile, DocumentType, FlowMode, PlanEntry, Step, StepPlan};

use super::{NavigationHistory, NavigationPosition, RouterEvent};

/// Hook invoked on a flow switch with `(new_flow, new_index,
/// previous_flow, previous_index)`. The desktop side uses it to remember
/// which capture step to hand to the companion as its starting point.
pub type FlowObserver = Box<dyn FnMut(FlowMode, usize, FlowMode, usize) + Send>;

/// Walks the compiled plan for the active flow.
///
/// The plan is recompiled from the step configuration on demand rather than
/// cached; compile determinism makes the recompiled plan identical for a
/// given `(flow, steps, document type)`, which is what makes a restored
/// history position land on the same screen.
///
/// Whether traversal ends in `Completed` or `ClientSuccess` is fixed by the
/// `mobile_flow` flag at construction and never re-checked per advance.
pub struct Navigator {
    flow: FlowMode,
    index: usize,
    mobile_flow: bool,
    document_type: DocumentType,
    steps: Vec<Step>,
    history: Box<dyn NavigationHistory>,
    events: mpsc::UnboundedSender<RouterEvent>,
    flow_observer: Option<FlowObserver>,
}

impl Navigator {
    /// Create a navigator positioned at `initial_index` of the capture
    /// flow and record that position into history immediately, so position
    /// zero is itself restorable.
    pub fn new(
        steps: Vec<Step>,
        document_type: DocumentType,
        mobile_flow: bool,
        initial_index: usize,
        history: Box<dyn NavigationHistory>,
        events: mpsc::UnboundedSender<RouterEvent>,
    ) -> Self {
        let mut navigator = Self {
            flow: FlowMode::CaptureSteps,
            index: 0,
            mobile_flow,
            document_type,
            steps,
            history,
            events,
            flow_observer: None,
        };
        let plan = navigator.plan();
        let index = if plan.is_empty() {
            0
        } else {
            initial_index.min(plan.len() - 1)
        };
        navigator.set_position(navigator.flow, index);
        navigator
    }

    /// Install the flow-switch observer hook.
    pub fn set_flow_observer(&mut self, observer: FlowObserver) {
        self.flow_observer = Some(observer);
    }

    pub fn position(&self) -> NavigationPosition {
        NavigationPosition::new(self.flow, self.index)
    }

    pub fn flow(&self) -> FlowMode {
        self.flow
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Recompile the authoritative plan for the active flow.
    pub fn plan(&self) -> StepPlan {
        compile(self.flow, &self.document_type, &self.steps, self.mobile_flow)
    }

    /// Entry under the current position, if the plan has one.
    pub fn current_entry(&self) -> Option<PlanEntry> {
        self.plan().into_iter().nth(self.index)
    }

    /// Move to the next screen, or emit the session's terminal event when
    /// already on the last one. Position never moves past the end, so a
    /// repeated advance at the terminal index only re-emits the event.
    pub fn advance(&mut self) {
        let plan = self.plan();
        let next = self.index + 1;
        if next >= plan.len() {
            let terminal = if self.mobile_flow {
                RouterEvent::ClientSuccess
            } else {
                RouterEvent::Completed
            };
            debug!(flow = %self.flow, index = self.index, "plan traversed, emitting terminal event");
            let _ = self.events.send(terminal);
            return;
        }
        self.set_position(self.flow, next);
    }

    /// Move to the previous screen; no-op at index zero (use [`Self::back`]
    /// to leave the plan through history instead).
    pub fn retreat(&mut self) {
        if self.index == 0 {
            return;
        }
        let index = self.index - 1;
        self.set_position(self.flow, index);
    }

    /// Pop one history entry and restore the position it carries.
    pub fn back(&mut self) {
        if let Some(position) = self.history.back() {
            self.restore(position);
        }
    }

    /// Reposition into a different flow, notifying the observer hook with
    /// the position being left behind. Same-flow switches are no-ops.
    pub fn switch_flow(&mut self, new_flow: FlowMode, new_index: usize) {
        if new_flow == self.flow {
            return;
        }
        let (previous_flow, previous_index) = (self.flow, self.index);
        if let Some(observer) = self.flow_observer.as_mut() {
            observer(new_flow, new_index, previous_flow, previous_index);
        }
        self.set_position(new_flow, new_index);
    }

    /// React to an externally restored history entry (browser back/forward
    /// landing on a recorded state). Restores the exact position without
    /// pushing a new entry; history is the single source of truth.
    pub fn on_history_change(&mut self, position: NavigationPosition) {
        self.restore(position);
    }

    fn restore(&mut self, position: NavigationPosition) {
        self.flow = position.flow;
        self.index = position.index;
        self.emit_step();
    }

    fn set_position(&mut self, flow: FlowMode, index: usize) {
        self.flow = flow;
        self.index = index;
        let plan = self.plan();
        // Out-of-range positions are a programming error, not a runtime
        // condition: compile determinism plus advance/retreat clamping keep
        // the invariant.
        debug_assert!(plan.is_empty() || index < plan.len());
        if !plan.is_empty() && index >= plan.len() {
            warn!(flow = %flow, index, plan_len = plan.len(), "position beyond plan, clamping");
            self.index = plan.len() - 1;
        }
        self.history.push(self.position());
        self.emit_step();
    }

    fn emit_step(&self) {
        let _ = self.events.send(RouterEvent::StepChanged {
            position: self.position(),
            entry: self.current_entry(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::InMemoryHistory;
    use crate::steps::{ScreenKind, StepKind};

    fn standard_steps() -> Vec<Step> {
        vec![
            Step::new(StepKind::Welcome),
            Step::new(StepKind::Document),
            Step::new(StepKind::Face),
            Step::new(StepKind::Complete),
        ]
    }

    fn navigator(
        mobile_flow: bool,
    ) -> (Navigator, mpsc::UnboundedReceiver<RouterEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let nav = Navigator::new(
            standard_steps(),
            DocumentType::Passport,
            mobile_flow,
            0,
            Box::new(InMemoryHistory::new()),
            tx,
        );
        (nav, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<RouterEvent>) -> Vec<RouterEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_initial_position_is_recorded_and_emitted() {
        let (nav, mut rx) = navigator(false);
        assert_eq!(nav.position(), NavigationPosition::new(FlowMode::CaptureSteps, 0));
        let events = drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [RouterEvent::StepChanged { position, .. }] if position.index == 0
        ));
    }

    #[test]
    fn test_advance_walks_plan_in_order() {
        let (mut nav, mut rx) = navigator(false);
        drain(&mut rx);

        let expected = [
            ScreenKind::Select,
            ScreenKind::FrontCapture,
            ScreenKind::FrontConfirm,
            ScreenKind::FaceCapture,
            ScreenKind::FaceConfirm,
            ScreenKind::Complete,
        ];
        for screen in expected {
            nav.advance();
            assert_eq!(nav.current_entry().unwrap().screen, screen);
        }
    }

    #[test]
    fn test_advance_at_terminal_emits_once_and_holds_position() {
        let (mut nav, mut rx) = navigator(false);
        let plan_len = nav.plan().len();
        for _ in 0..plan_len - 1 {
            nav.advance();
        }
        assert_eq!(nav.index(), plan_len - 1);
        drain(&mut rx);

        nav.advance();
        assert_eq!(nav.index(), plan_len - 1, "index must never reach plan length");
        let events = drain(&mut rx);
        assert_eq!(events, vec![RouterEvent::Completed]);
    }

    #[test]
    fn test_mobile_terminal_event_is_client_success() {
        let (mut nav, mut rx) = navigator(true);
        let plan_len = nav.plan().len();
        for _ in 0..plan_len {
            nav.advance();
        }
        let events = drain(&mut rx);
        assert_eq!(events.last(), Some(&RouterEvent::ClientSuccess));
    }

    #[test]
    fn test_duplicate_terminal_advance_does_not_move_position() {
        let (mut nav, mut rx) = navigator(true);
        let plan_len = nav.plan().len();
        for _ in 0..plan_len + 3 {
            nav.advance();
        }
        assert_eq!(nav.index(), plan_len - 1);
        let terminals = drain(&mut rx)
            .into_iter()
            .filter(|e| *e == RouterEvent::ClientSuccess)
            .count();
        assert_eq!(terminals, 4);
    }

    #[test]
    fn test_retreat_clamps_at_zero() {
        let (mut nav, _rx) = navigator(false);
        nav.retreat();
        assert_eq!(nav.index(), 0);

        nav.advance();
        nav.advance();
        nav.retreat();
        assert_eq!(nav.index(), 1);
    }

    #[test]
    fn test_switch_flow_notifies_observer_with_previous_position() {
        let (mut nav, _rx) = navigator(false);
        let (observer_tx, mut observer_rx) = mpsc::unbounded_channel();
        nav.set_flow_observer(Box::new(move |new_flow, new_index, prev_flow, prev_index| {
            let _ = observer_tx.send((new_flow, new_index, prev_flow, prev_index));
        }));

        nav.advance();
        nav.advance();
        nav.switch_flow(FlowMode::CrossDevice, 0);

        assert_eq!(
            observer_rx.try_recv().unwrap(),
            (FlowMode::CrossDevice, 0, FlowMode::CaptureSteps, 2)
        );
        assert_eq!(nav.flow(), FlowMode::CrossDevice);
        assert_eq!(nav.current_entry().unwrap().screen, ScreenKind::CrossDeviceLink);
    }

    #[test]
    fn test_switch_to_same_flow_is_a_no_op() {
        let (mut nav, mut rx) = navigator(false);
        nav.advance();
        drain(&mut rx);

        nav.switch_flow(FlowMode::CaptureSteps, 0);
        assert_eq!(nav.index(), 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_back_restores_previous_position_through_history() {
        let (mut nav, _rx) = navigator(false);
        nav.advance();
        nav.advance();
        assert_eq!(nav.index(), 2);

        nav.back();
        assert_eq!(nav.index(), 1);
        nav.back();
        assert_eq!(nav.index(), 0);
        // At the oldest entry, back stays put.
        nav.back();
        assert_eq!(nav.index(), 0);
    }

    #[test]
    fn test_history_restore_reproduces_exact_screen() {
        let (mut nav, _rx) = navigator(false);
        nav.advance();
        nav.advance();
        let screen_at_two = nav.current_entry().unwrap().screen;

        // A fresh navigator over the same step list restores the recorded
        // state onto the identical screen.
        let (tx, _rx2) = mpsc::unbounded_channel();
        let mut restored = Navigator::new(
            standard_steps(),
            DocumentType::Passport,
            false,
            0,
            Box::new(InMemoryHistory::new()),
            tx,
        );
        restored.on_history_change(NavigationPosition::new(FlowMode::CaptureSteps, 2));
        assert_eq!(restored.index(), 2);
        assert_eq!(restored.current_entry().unwrap().screen, screen_at_two);
    }

    #[test]
    fn test_initial_index_from_config_is_honored() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let nav = Navigator::new(
            standard_steps(),
            DocumentType::Passport,
            true,
            3,
            Box::new(InMemoryHistory::new()),
            tx,
        );
        assert_eq!(nav.index(), 3);
    }

    #[test]
    fn test_initial_index_clamped_to_plan_bounds() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let nav = Navigator::new(
            vec![Step::new(StepKind::Welcome)],
            DocumentType::Passport,
            false,
            9,
            Box::new(InMemoryHistory::new()),
            tx,
        );
        assert_eq!(nav.index(), 0);
    }
}
