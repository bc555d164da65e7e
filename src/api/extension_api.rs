use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::core::Viewport;
use crate::model::Payload;

/// Whether the engine is inside an update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    #[default]
    Idle,
    InMainProcess,
}

/// Options of one action dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOpts {
    /// Suppresses the action and refined events.
    pub silent: bool,
    /// Paints a frame right after the action instead of waiting for `on_frame`.
    pub flush: bool,
}

impl DispatchOpts {
    #[must_use]
    pub fn silent() -> Self {
        Self {
            silent: true,
            flush: false,
        }
    }
}

/// Actions dispatched while a cycle runs, flushed in program order after it.
#[derive(Debug, Default)]
pub(crate) struct PendingActions {
    queue: VecDeque<(Payload, DispatchOpts)>,
}

impl PendingActions {
    fn push(&mut self, payload: Payload, opts: DispatchOpts) {
        self.queue.push_back((payload, opts));
    }

    fn pop(&mut self) -> Option<(Payload, DispatchOpts)> {
        self.queue.pop_front()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn clear(&mut self) {
        self.queue.clear();
    }
}

#[derive(Debug)]
struct ProcessControl {
    state: Cell<ProcessState>,
    version: Cell<u32>,
    viewport: Cell<Viewport>,
    disposed: Cell<bool>,
    pending: RefCell<PendingActions>,
}

/// Handle given to stage handlers, views and event listeners.
///
/// It never touches the engine directly: actions dispatched through it are
/// queued and run once the current cycle has returned to idle.
#[derive(Clone)]
pub struct ExtensionApi {
    control: Rc<ProcessControl>,
}

impl ExtensionApi {
    pub(crate) fn new(viewport: Viewport) -> Self {
        Self {
            control: Rc::new(ProcessControl {
                state: Cell::new(ProcessState::Idle),
                version: Cell::new(0),
                viewport: Cell::new(viewport),
                disposed: Cell::new(false),
                pending: RefCell::new(PendingActions::default()),
            }),
        }
    }

    /// Queues `payload` for dispatch after the running cycle.
    pub fn dispatch_action(&self, payload: Payload) {
        self.dispatch_action_with(payload, DispatchOpts::default());
    }

    pub fn dispatch_action_with(&self, payload: Payload, opts: DispatchOpts) {
        if self.control.disposed.get() {
            return;
        }
        self.control.pending.borrow_mut().push(payload, opts);
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.control.viewport.get()
    }

    #[must_use]
    pub fn process_state(&self) -> ProcessState {
        self.control.state.get()
    }

    /// Incremented (mod 1000) on every entry into the main process.
    #[must_use]
    pub fn main_process_version(&self) -> u32 {
        self.control.version.get()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.control.disposed.get()
    }

    #[must_use]
    pub fn pending_action_count(&self) -> usize {
        self.control.pending.borrow().len()
    }

    pub(crate) fn enter_main_process(&self) {
        self.control.state.set(ProcessState::InMainProcess);
        self.control
            .version
            .set((self.control.version.get() + 1) % 1000);
    }

    pub(crate) fn leave_main_process(&self) {
        self.control.state.set(ProcessState::Idle);
    }

    pub(crate) fn set_viewport(&self, viewport: Viewport) {
        self.control.viewport.set(viewport);
    }

    pub(crate) fn pop_pending(&self) -> Option<(Payload, DispatchOpts)> {
        self.control.pending.borrow_mut().pop()
    }

    pub(crate) fn mark_disposed(&self) {
        self.control.disposed.set(true);
        self.control.pending.borrow_mut().clear();
    }
}

impl fmt::Debug for ExtensionApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionApi")
            .field("state", &self.control.state.get())
            .field("version", &self.control.version.get())
            .field("pending", &self.control.pending.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{ExtensionApi, ProcessState};
    use crate::core::Viewport;
    use crate::model::Payload;

    #[test]
    fn dispatched_actions_queue_in_order() {
        let api = ExtensionApi::new(Viewport::new(100, 100));
        api.dispatch_action(Payload::new("first"));
        api.clone().dispatch_action(Payload::new("second"));
        assert_eq!(api.pending_action_count(), 2);

        let first = api.pop_pending().expect("first action");
        assert_eq!(first.0.action_type(), "first");
        let second = api.pop_pending().expect("second action");
        assert_eq!(second.0.action_type(), "second");
        assert!(api.pop_pending().is_none());
    }

    #[test]
    fn version_wraps_at_one_thousand() {
        let api = ExtensionApi::new(Viewport::new(100, 100));
        for _ in 0..1001 {
            api.enter_main_process();
            api.leave_main_process();
        }
        assert_eq!(api.main_process_version(), 1);
        assert_eq!(api.process_state(), ProcessState::Idle);
    }

    #[test]
    fn disposed_api_drops_dispatches() {
        let api = ExtensionApi::new(Viewport::new(100, 100));
        api.dispatch_action(Payload::new("queued"));
        api.mark_disposed();
        api.dispatch_action(Payload::new("late"));
        assert_eq!(api.pending_action_count(), 0);
    }
}
