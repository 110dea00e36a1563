//! Compare-then-apply transactions over a controller's current states.

use crate::controller::{Controller, ControllerError, Result};
use crate::core::FlagGuard;
use tracing::debug;

type StartCallback = Box<dyn FnOnce()>;
type ResultCallback = Box<dyn FnOnce(bool)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TransactionOp {
    Add,
    Set,
    Remove,
}

/// Fluent builder for a guarded add, set or remove of current states.
///
/// `commit` resets every field, so one transaction can be reused.
///
/// # Example
///
/// ```rust
/// use flagstate::controller::Controller;
/// use flagstate::core::{BoxedState, ReplaceMerger, State, StateContext};
///
/// struct Plain;
///
/// impl State for Plain {
///     type Param = ();
///     fn name(&self) -> &str {
///         "plain"
///     }
///     fn on_enter(&mut self, _ctx: &StateContext<()>) {}
///     fn on_exit(&mut self, _ctx: &StateContext<()>) {}
/// }
///
/// let controller: Controller<()> = Controller::new();
/// controller
///     .set_state_factory(|_: u32, _: Option<&()>| -> Option<BoxedState<()>> {
///         Some(Box::new(Plain))
///     })
///     .unwrap();
/// controller.set_parameter_merger(ReplaceMerger).unwrap();
/// controller.add_state(1, None).unwrap();
///
/// let mut tx = controller.begin_transaction();
/// let applied = tx.when_has(1).add(2).commit().unwrap();
/// assert!(applied);
/// assert_eq!(controller.current_state_flags().unwrap(), 3);
/// ```
pub struct StateTransaction<P> {
    controller: Controller<P>,
    op: Option<TransactionOp>,
    gate: Option<FlagGuard>,
    flags: Option<u32>,
    param: Option<P>,
    on_start: Option<StartCallback>,
    on_result: Option<ResultCallback>,
}

impl<P: Clone + 'static> StateTransaction<P> {
    pub(crate) fn new(controller: Controller<P>) -> Self {
        Self {
            controller,
            op: None,
            gate: None,
            flags: None,
            param: None,
            on_start: None,
            on_result: None,
        }
    }

    pub fn add(&mut self, flags: u32) -> &mut Self {
        self.op = Some(TransactionOp::Add);
        self.flags = Some(flags);
        self
    }

    pub fn set(&mut self, flags: u32) -> &mut Self {
        self.op = Some(TransactionOp::Set);
        self.flags = Some(flags);
        self
    }

    pub fn remove(&mut self, flags: u32) -> &mut Self {
        self.op = Some(TransactionOp::Remove);
        self.flags = Some(flags);
        self
    }

    pub fn with_param(&mut self, param: P) -> &mut Self {
        self.param = Some(param);
        self
    }

    /// Apply only when any bit of `mask` is a current state.
    pub fn when_has(&mut self, mask: u32) -> &mut Self {
        self.gate = Some(FlagGuard::has(mask));
        self
    }

    /// Apply only when the current states are exactly `mask`.
    pub fn when_equals(&mut self, mask: u32) -> &mut Self {
        self.gate = Some(FlagGuard::equals(mask));
        self
    }

    /// Apply only when `guard` passes on the current flags.
    pub fn when(&mut self, guard: FlagGuard) -> &mut Self {
        self.gate = Some(guard);
        self
    }

    /// Runs after the gate passes, before the operation.
    pub fn on_start(&mut self, callback: impl FnOnce() + 'static) -> &mut Self {
        self.on_start = Some(Box::new(callback));
        self
    }

    /// Receives the outcome, including `false` for a closed gate.
    pub fn on_result(&mut self, callback: impl FnOnce(bool) + 'static) -> &mut Self {
        self.on_result = Some(Box::new(callback));
        self
    }

    /// Evaluate the gate and apply the operation.
    ///
    /// Fails with [`ControllerError::IncompleteTransaction`] when no operation
    /// or flags were given. The builder is empty afterwards either way.
    pub fn commit(&mut self) -> Result<bool> {
        let outcome = self.execute();
        self.reset();
        outcome
    }

    fn execute(&mut self) -> Result<bool> {
        let op = self.op.ok_or(ControllerError::IncompleteTransaction {
            missing: "operation",
        })?;
        let flags = self
            .flags
            .ok_or(ControllerError::IncompleteTransaction { missing: "flags" })?;

        if let Some(gate) = &self.gate {
            let current = self.controller.current_state_flags()?;
            if !gate.check(current) {
                debug!(gate = ?gate, flags = current, "transaction gate closed");
                if let Some(on_result) = self.on_result.take() {
                    on_result(false);
                }
                return Ok(false);
            }
        }

        if let Some(on_start) = self.on_start.take() {
            on_start();
        }
        let param = self.param.take();
        let applied = match op {
            TransactionOp::Add => self.controller.add_state(flags, param)?,
            TransactionOp::Set => self.controller.set_state(flags, param)?,
            TransactionOp::Remove => self.controller.remove_state(flags, param)?,
        };
        if let Some(on_result) = self.on_result.take() {
            on_result(applied);
        }
        Ok(applied)
    }

    fn reset(&mut self) {
        self.op = None;
        self.gate = None;
        self.flags = None;
        self.param = None;
        self.on_start = None;
        self.on_result = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BoxedState, ReplaceMerger, State, StateContext};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Plain;

    impl State for Plain {
        type Param = String;

        fn name(&self) -> &str {
            "plain"
        }

        fn on_enter(&mut self, _ctx: &StateContext<String>) {}

        fn on_exit(&mut self, _ctx: &StateContext<String>) {}
    }

    fn controller() -> Controller<String> {
        let controller = Controller::new();
        controller
            .set_state_factory(|_: u32, _: Option<&String>| -> Option<BoxedState<String>> {
                Some(Box::new(Plain))
            })
            .unwrap();
        controller.set_parameter_merger(ReplaceMerger).unwrap();
        controller
    }

    #[test]
    fn missing_operation_fails_fast() {
        let controller = controller();
        let mut tx = controller.begin_transaction();
        assert_eq!(
            tx.when_has(1).commit(),
            Err(ControllerError::IncompleteTransaction {
                missing: "operation"
            })
        );
    }

    #[test]
    fn closed_gate_reports_false_without_applying() {
        let controller = controller();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let started = Rc::new(RefCell::new(false));

        let log = Rc::clone(&seen);
        let start = Rc::clone(&started);
        let mut tx = controller.begin_transaction();
        let applied = tx
            .when_equals(4)
            .add(2)
            .on_start(move || *start.borrow_mut() = true)
            .on_result(move |ok| log.borrow_mut().push(ok))
            .commit()
            .unwrap();

        assert!(!applied);
        assert!(!*started.borrow());
        assert_eq!(*seen.borrow(), vec![false]);
        assert_eq!(controller.current_state_flags().unwrap(), 0);
    }

    #[test]
    fn open_gate_runs_callbacks_in_order() {
        let controller = controller();
        controller.add_state(1, None).unwrap();
        let order = Rc::new(RefCell::new(Vec::new()));

        let start_log = Rc::clone(&order);
        let result_log = Rc::clone(&order);
        let mut tx = controller.begin_transaction();
        let applied = tx
            .when_has(1)
            .set(2)
            .on_start(move || start_log.borrow_mut().push("start".to_string()))
            .on_result(move |ok| result_log.borrow_mut().push(format!("result:{ok}")))
            .commit()
            .unwrap();

        assert!(applied);
        assert_eq!(*order.borrow(), vec!["start", "result:true"]);
        assert_eq!(controller.current_state_flags().unwrap(), 2);
    }

    #[test]
    fn commit_resets_the_builder() {
        let controller = controller();
        let mut tx = controller.begin_transaction();
        assert!(tx.add(1).commit().unwrap());
        assert_eq!(
            tx.commit(),
            Err(ControllerError::IncompleteTransaction {
                missing: "operation"
            })
        );
        assert!(tx.remove(1).commit().unwrap());
        assert_eq!(controller.current_state_flags().unwrap(), 0);
    }

    #[test]
    fn custom_guard_gates_removal() {
        let controller = controller();
        controller.add_state(1 | 2, None).unwrap();
        let mut tx = controller.begin_transaction();
        let applied = tx
            .when(FlagGuard::new(|flags| flags.count_ones() > 1))
            .remove(2)
            .commit()
            .unwrap();
        assert!(applied);
        assert_eq!(controller.current_state_flags().unwrap(), 1);
    }
}
