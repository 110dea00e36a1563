//! The `State` trait and the bookkeeping the engine keeps beside each state.
//!
//! A state is the unit of behavior driven by a controller. The user object
//! implements [`State`]; everything the engine tracks about it (its flag,
//! parameters, enter count, transient markers and controller back-reference)
//! lives in a [`StateContext`] that is handed to every hook.

use crate::controller::{ControllerError, WeakController};
use crate::core::merger::ParameterMerger;
use crate::message::Message;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::time::Duration;

/// Trait for controller-driven states.
///
/// Only `name`, `on_enter` and `on_exit` are required. Every hook receives
/// the engine-side [`StateContext`], which exposes the merged parameter and
/// the one-shot markers for the transition in progress.
///
/// # Example
///
/// ```rust
/// use flagstate::core::{State, StateContext};
///
/// struct Sleep {
///     naps: u32,
/// }
///
/// impl State for Sleep {
///     type Param = String;
///
///     fn name(&self) -> &str {
///         "Sleep"
///     }
///
///     fn on_enter(&mut self, ctx: &StateContext<String>) {
///         if ctx.enter_count() == 1 {
///             self.naps += 1;
///         }
///     }
///
///     fn on_exit(&mut self, _ctx: &StateContext<String>) {}
/// }
/// ```
pub trait State: 'static {
    /// Parameter type carried into every transition.
    type Param: 'static;

    /// Name used for logging and diagnostics.
    fn name(&self) -> &str;

    /// Called when the state becomes active.
    fn on_enter(&mut self, ctx: &StateContext<Self::Param>);

    /// Called when the state is requested again while already active, or when
    /// a team notification reaches it.
    fn on_reenter(&mut self, _ctx: &StateContext<Self::Param>) {}

    /// Called when the state leaves the active set.
    fn on_exit(&mut self, ctx: &StateContext<Self::Param>);

    /// Called from `Controller::update` for every active state.
    fn on_update(
        &mut self,
        _ctx: &StateContext<Self::Param>,
        _delta: Duration,
        _param: Option<&Self::Param>,
    ) {
    }

    /// Handle a message. Return `true` when the message was consumed.
    fn handle_message(&mut self, _ctx: &StateContext<Self::Param>, _msg: &Message) -> bool {
        false
    }

    /// Called once before the instance is dropped by the engine.
    fn on_dispose(&mut self) {}

    /// Opaque blob persisted by `Controller::snapshot`.
    fn save_state(&self) -> Option<Vec<u8>> {
        None
    }

    /// Receives the blob saved for this state's flag, if any.
    fn restore_state(&mut self, _saved: Option<&[u8]>) {}
}

/// Boxed state as produced by a `StateFactory`.
pub type BoxedState<P> = Box<dyn State<Param = P>>;

/// Transient markers kept on a state's context.
///
/// `ATTACHED` lives for one attach lifetime. `MUTEX` and `TEAM` are one-shot:
/// set just before a hook runs and cleared right after it.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StateFlags(u8);

impl StateFlags {
    pub const NONE: StateFlags = StateFlags(0);
    pub const ATTACHED: StateFlags = StateFlags(1);
    pub const MUTEX: StateFlags = StateFlags(1 << 1);
    pub const TEAM: StateFlags = StateFlags(1 << 2);

    const ONE_SHOT: StateFlags = StateFlags(Self::MUTEX.0 | Self::TEAM.0);

    pub fn contains(self, other: StateFlags) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: StateFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: StateFlags) {
        self.0 &= !other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for StateFlags {
    type Output = StateFlags;

    fn bitor(self, rhs: StateFlags) -> StateFlags {
        StateFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for StateFlags {
    fn bitor_assign(&mut self, rhs: StateFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for StateFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::ATTACHED) {
            names.push("ATTACHED");
        }
        if self.contains(Self::MUTEX) {
            names.push("MUTEX");
        }
        if self.contains(Self::TEAM) {
            names.push("TEAM");
        }
        write!(f, "StateFlags({})", names.join(" | "))
    }
}

/// Engine-side view of one state instance.
pub struct StateContext<P> {
    id: u32,
    parameter: Option<P>,
    team_parameter: Option<P>,
    enter_count: u32,
    flags: StateFlags,
    controller: Option<WeakController<P>>,
}

impl<P> StateContext<P> {
    pub(crate) fn new(id: u32) -> Self {
        Self {
            id,
            parameter: None,
            team_parameter: None,
            enter_count: 0,
            flags: StateFlags::NONE,
            controller: None,
        }
    }

    /// The single flag this instance represents.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Parameter merged from every transition since the state was created.
    pub fn parameter(&self) -> Option<&P> {
        self.parameter.as_ref()
    }

    /// Parameter delivered by team notifications.
    pub fn team_parameter(&self) -> Option<&P> {
        self.team_parameter.as_ref()
    }

    /// Enter and reenter calls since the last exit.
    pub fn enter_count(&self) -> u32 {
        self.enter_count
    }

    pub fn flags(&self) -> StateFlags {
        self.flags
    }

    pub fn has_flags(&self, flags: StateFlags) -> bool {
        self.flags.contains(flags)
    }

    pub fn is_attached(&self) -> bool {
        self.flags.contains(StateFlags::ATTACHED)
    }

    /// True while a hook runs because a mutex partner forced this transition.
    pub fn is_mutex_triggered(&self) -> bool {
        self.flags.contains(StateFlags::MUTEX)
    }

    /// True while a hook runs because of a team notification.
    pub fn is_team_triggered(&self) -> bool {
        self.flags.contains(StateFlags::TEAM)
    }

    /// Handle to the owning controller.
    ///
    /// Fails with [`ControllerError::Detached`] once the state has exited.
    pub fn controller(&self) -> Result<WeakController<P>, ControllerError> {
        match (&self.controller, self.is_attached()) {
            (Some(controller), true) => Ok(controller.clone()),
            _ => Err(ControllerError::Detached),
        }
    }

    pub(crate) fn attach(&mut self, controller: &WeakController<P>) {
        self.controller = Some(controller.clone());
        self.flags.insert(StateFlags::ATTACHED);
    }

    pub(crate) fn detach(&mut self) {
        self.controller = None;
        self.flags = StateFlags::NONE;
    }

    pub(crate) fn mark(&mut self, flags: StateFlags) {
        self.flags.insert(flags);
    }

    pub(crate) fn clear_one_shot(&mut self) {
        self.flags.remove(StateFlags::ONE_SHOT);
    }

    pub(crate) fn increment_enter_count(&mut self) {
        self.enter_count = self.enter_count.saturating_add(1);
    }

    pub(crate) fn reset_enter_count(&mut self) {
        self.enter_count = 0;
    }
}

impl<P: Clone> StateContext<P> {
    pub(crate) fn merge_parameter(
        &mut self,
        merger: &dyn ParameterMerger<P>,
        incoming: Option<&P>,
    ) {
        let current = self.parameter.take();
        self.parameter = merger.merge(current, incoming.cloned());
    }

    pub(crate) fn merge_team_parameter(
        &mut self,
        merger: &dyn ParameterMerger<P>,
        incoming: Option<&P>,
    ) {
        let current = self.team_parameter.take();
        self.team_parameter = merger.merge(current, incoming.cloned());
    }
}

impl<P: fmt::Debug> fmt::Debug for StateContext<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateContext")
            .field("id", &self.id)
            .field("parameter", &self.parameter)
            .field("team_parameter", &self.team_parameter)
            .field("enter_count", &self.enter_count)
            .field("flags", &self.flags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::merger::ReplaceMerger;

    struct Idle;

    impl State for Idle {
        type Param = String;

        fn name(&self) -> &str {
            "Idle"
        }

        fn on_enter(&mut self, _ctx: &StateContext<String>) {}

        fn on_exit(&mut self, _ctx: &StateContext<String>) {}
    }

    #[test]
    fn state_name_returns_correct_value() {
        assert_eq!(Idle.name(), "Idle");
    }

    #[test]
    fn default_hooks_are_inert() {
        let mut state = Idle;
        let ctx = StateContext::<String>::new(1);
        state.on_reenter(&ctx);
        assert!(!state.handle_message(&ctx, &Message::new(7)));
        assert!(state.save_state().is_none());
    }

    #[test]
    fn one_shot_flags_clear_without_touching_attached() {
        let mut flags = StateFlags::ATTACHED | StateFlags::MUTEX | StateFlags::TEAM;
        flags.remove(StateFlags::ONE_SHOT);
        assert!(flags.contains(StateFlags::ATTACHED));
        assert!(!flags.contains(StateFlags::MUTEX));
        assert!(!flags.contains(StateFlags::TEAM));
    }

    #[test]
    fn empty_flags_contain_nothing() {
        assert!(!StateFlags::NONE.contains(StateFlags::NONE));
        assert!(StateFlags::NONE.is_empty());
    }

    #[test]
    fn detached_context_has_no_controller() {
        let ctx = StateContext::<String>::new(4);
        assert!(matches!(ctx.controller(), Err(ControllerError::Detached)));
        assert!(!ctx.is_attached());
    }

    #[test]
    fn parameters_merge_into_separate_slots() {
        let mut ctx = StateContext::new(2);
        ctx.merge_parameter(&ReplaceMerger, Some(&"walk".to_string()));
        ctx.merge_parameter(&ReplaceMerger, None);
        ctx.merge_team_parameter(&ReplaceMerger, Some(&"team".to_string()));

        assert_eq!(ctx.parameter().map(String::as_str), Some("walk"));
        assert_eq!(ctx.team_parameter().map(String::as_str), Some("team"));
    }

    #[test]
    fn enter_count_resets() {
        let mut ctx = StateContext::<String>::new(1);
        ctx.increment_enter_count();
        ctx.increment_enter_count();
        assert_eq!(ctx.enter_count(), 2);
        ctx.reset_enter_count();
        assert_eq!(ctx.enter_count(), 0);
    }
}
