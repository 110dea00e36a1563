//! Transition engine for one scope.
//!
//! A [`StateGroup`] owns the active and cached masks of one scope (current or
//! global) and drives the lifecycle hooks of the instances in the shared
//! registry. Every dispatch runs all exits, then all enters, then all
//! reenters, each in descending bit order.

use super::mutex::MutexTable;
use super::registry::{Registry, StateEntry};
use crate::controller::{ControllerError, Result, WeakController};
use crate::core::{bits, ParameterMerger, StateFactory, StateFlags};
use crate::message::{Message, MessagePolicy};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Which of the controller's two groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Current,
    Global,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Current => write!(f, "current"),
            Scope::Global => write!(f, "global"),
        }
    }
}

/// Mask operation requested on a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupOp {
    Add,
    Set,
    Remove,
    Clear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionKind {
    Enter,
    Exit,
    Reenter,
}

/// One lifecycle transition, reported to the team layer.
#[derive(Clone, Debug)]
pub struct TransitionReport<P> {
    pub kind: TransitionKind,
    pub flag: u32,
    /// The transition was forced by a mutex partner.
    pub mutex: bool,
    /// The state's merged parameter after the transition.
    pub param: Option<P>,
}

/// Collaborators a dispatch needs, borrowed from the controller.
pub(crate) struct GroupEnv<'a, P> {
    pub registry: &'a mut Registry<P>,
    pub factory: &'a dyn StateFactory<P>,
    pub merger: &'a dyn ParameterMerger<P>,
    pub mutex: &'a MutexTable,
    pub cache_enabled: bool,
    pub controller: &'a WeakController<P>,
    pub reports: Option<&'a mut Vec<TransitionReport<P>>>,
}

impl<P: Clone> GroupEnv<'_, P> {
    fn report(&mut self, kind: TransitionKind, flag: u32, mutex: bool) {
        if let Some(reports) = self.reports.as_mut() {
            let param = self
                .registry
                .get(&flag)
                .and_then(|entry| entry.ctx.parameter().cloned());
            reports.push(TransitionReport {
                kind,
                flag,
                mutex,
                param,
            });
        }
    }
}

/// Active and cached masks of one scope.
///
/// Invariant: `active & cached == 0`, and every bit of `active | cached` has
/// an instance in the registry.
pub(crate) struct StateGroup<P> {
    scope: Scope,
    active: u32,
    cached: u32,
    pending: Option<P>,
}

impl<P> StateGroup<P> {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            active: 0,
            cached: 0,
            pending: None,
        }
    }

    pub fn active(&self) -> u32 {
        self.active
    }

    pub fn cached(&self) -> u32 {
        self.cached
    }

    /// Forget masks without running hooks.
    pub fn reset(&mut self) {
        self.active = 0;
        self.cached = 0;
        self.pending = None;
    }
}

impl<P: Clone + 'static> StateGroup<P> {
    /// Apply `op` and dispatch the resulting transitions.
    ///
    /// Returns whether the group reports a change (see each operation).
    pub fn apply(
        &mut self,
        env: &mut GroupEnv<'_, P>,
        op: GroupOp,
        flags: u32,
        param: Option<P>,
    ) -> Result<bool> {
        match op {
            GroupOp::Add => self.add(env, flags, param),
            GroupOp::Set => self.set(env, flags, param),
            GroupOp::Remove => self.remove(env, flags, param),
            GroupOp::Clear => self.clear(env, param),
        }
    }

    /// Reentering already active bits still counts as success.
    pub fn add(
        &mut self,
        env: &mut GroupEnv<'_, P>,
        flags: u32,
        param: Option<P>,
    ) -> Result<bool> {
        let share = self.active & flags;
        let enter = flags & !share;
        self.dispatch(env, 0, enter, share, param)?;
        Ok(true)
    }

    /// No-op (and `false`) when `flags` already equals the active mask.
    pub fn set(
        &mut self,
        env: &mut GroupEnv<'_, P>,
        flags: u32,
        param: Option<P>,
    ) -> Result<bool> {
        if flags == self.active {
            return Ok(false);
        }
        let exit = self.active & !flags;
        let enter = flags & !self.active;
        let reenter = self.active & flags;
        self.dispatch(env, exit, enter, reenter, param)?;
        Ok(true)
    }

    /// Removes only the bits actually present; `true` only when all of
    /// `flags` were present.
    pub fn remove(
        &mut self,
        env: &mut GroupEnv<'_, P>,
        flags: u32,
        param: Option<P>,
    ) -> Result<bool> {
        let share = self.active & flags;
        if share == 0 {
            return Ok(false);
        }
        self.dispatch(env, share, 0, 0, param)?;
        Ok(share == flags)
    }

    pub fn clear(&mut self, env: &mut GroupEnv<'_, P>, param: Option<P>) -> Result<bool> {
        if self.active == 0 {
            return Ok(false);
        }
        self.dispatch(env, self.active, 0, 0, param)?;
        Ok(true)
    }

    fn dispatch(
        &mut self,
        env: &mut GroupEnv<'_, P>,
        exit: u32,
        enter: u32,
        reenter: u32,
        param: Option<P>,
    ) -> Result<()> {
        self.pending = param;
        if let Err(err) = self.prepare(env, enter) {
            self.pending = None;
            return Err(err);
        }
        debug!(
            scope = %self.scope,
            exit = exit,
            enter = enter,
            reenter = reenter,
            "dispatching state change"
        );

        self.active = (self.active & !exit) | enter;
        for flag in bits::iter_flags(exit) {
            self.exit_one(env, flag, false);
        }
        for flag in bits::iter_flags(enter) {
            // an earlier enter may already have cascaded this bit out
            if self.active & flag != 0 {
                self.enter_one(env, flag);
            }
        }
        for flag in bits::iter_flags(reenter) {
            if self.active & flag != 0 {
                self.reenter_one(env, flag);
            }
        }
        self.pending = None;
        Ok(())
    }

    /// Create every missing instance before any hook runs, so a factory
    /// failure leaves the group untouched.
    fn prepare(&self, env: &mut GroupEnv<'_, P>, enter: u32) -> Result<()> {
        let mut created = Vec::new();
        for flag in bits::iter_flags(enter) {
            if env.registry.contains_key(&flag) {
                continue;
            }
            let state = env
                .factory
                .create_state(flag, self.pending.as_ref())
                .ok_or(ControllerError::StateNotCreated { flag })?;
            debug!(scope = %self.scope, flag = flag, state = state.name(), "state created");
            created.push(StateEntry::new(flag, state));
        }
        for entry in created {
            env.registry.insert(entry.ctx.id(), entry);
        }
        Ok(())
    }

    fn enter_one(&mut self, env: &mut GroupEnv<'_, P>, flag: u32) {
        self.cached &= !flag;
        let Some(entry) = env.registry.get_mut(&flag) else {
            return;
        };
        let StateEntry { state, ctx } = entry;
        ctx.merge_parameter(env.merger, self.pending.as_ref());
        ctx.attach(env.controller);
        ctx.increment_enter_count();
        debug!(scope = %self.scope, flag = flag, state = state.name(), "enter");
        state.on_enter(ctx);
        env.report(TransitionKind::Enter, flag, false);
        if let Some(entry) = env.registry.get_mut(&flag) {
            entry.ctx.clear_one_shot();
        }

        let partners = env.mutex.partners(flag) & self.active;
        for partner in bits::iter_flags(partners) {
            self.active &= !partner;
            self.exit_one(env, partner, true);
        }
    }

    fn exit_one(&mut self, env: &mut GroupEnv<'_, P>, flag: u32, mutex: bool) {
        let Some(entry) = env.registry.get_mut(&flag) else {
            return;
        };
        let StateEntry { state, ctx } = entry;
        ctx.merge_parameter(env.merger, self.pending.as_ref());
        if mutex {
            ctx.mark(StateFlags::MUTEX);
        }
        debug!(scope = %self.scope, flag = flag, state = state.name(), mutex = mutex, "exit");
        state.on_exit(ctx);
        env.report(TransitionKind::Exit, flag, mutex);
        self.retire(env, flag);
    }

    fn reenter_one(&mut self, env: &mut GroupEnv<'_, P>, flag: u32) {
        let Some(entry) = env.registry.get_mut(&flag) else {
            return;
        };
        let StateEntry { state, ctx } = entry;
        ctx.merge_parameter(env.merger, self.pending.as_ref());
        ctx.attach(env.controller);
        ctx.increment_enter_count();
        debug!(scope = %self.scope, flag = flag, state = state.name(), "reenter");
        state.on_reenter(ctx);
        env.report(TransitionKind::Reenter, flag, false);
        if let Some(entry) = env.registry.get_mut(&flag) {
            entry.ctx.clear_one_shot();
        }
    }

    /// Detach an exited state, then cache or dispose it.
    fn retire(&mut self, env: &mut GroupEnv<'_, P>, flag: u32) {
        if env.cache_enabled {
            if let Some(entry) = env.registry.get_mut(&flag) {
                entry.ctx.detach();
                entry.ctx.reset_enter_count();
            }
            self.cached |= flag;
        } else {
            if let Some(mut entry) = env.registry.remove(&flag) {
                entry.ctx.detach();
                entry.ctx.reset_enter_count();
                debug!(scope = %self.scope, flag = flag, state = entry.name(), "state disposed");
                entry.state.on_dispose();
            }
            self.cached &= !flag;
        }
    }

    /// Team enter and reenter: reenter the active subset of `flags`.
    ///
    /// Never constructs states. Returns whether anything was reentered.
    pub fn team_reenter(
        &mut self,
        env: &mut GroupEnv<'_, P>,
        flags: u32,
        param: Option<&P>,
    ) -> bool {
        let targets = self.active & flags;
        for flag in bits::iter_flags(targets) {
            let Some(StateEntry { state, ctx }) = env.registry.get_mut(&flag) else {
                continue;
            };
            ctx.merge_team_parameter(env.merger, param);
            ctx.attach(env.controller);
            ctx.increment_enter_count();
            ctx.mark(StateFlags::TEAM);
            debug!(scope = %self.scope, flag = flag, state = state.name(), "team reenter");
            state.on_reenter(ctx);
            ctx.clear_one_shot();
        }
        targets != 0
    }

    /// Team exit: exit the active subset of `flags`.
    pub fn team_exit(
        &mut self,
        env: &mut GroupEnv<'_, P>,
        flags: u32,
        param: Option<&P>,
    ) -> bool {
        let targets = self.active & flags;
        self.active &= !targets;
        for flag in bits::iter_flags(targets) {
            let Some(StateEntry { state, ctx }) = env.registry.get_mut(&flag) else {
                continue;
            };
            ctx.merge_team_parameter(env.merger, param);
            ctx.mark(StateFlags::TEAM);
            debug!(scope = %self.scope, flag = flag, state = state.name(), "team exit");
            state.on_exit(ctx);
            self.retire(env, flag);
        }
        targets != 0
    }

    /// Deliver `msg` to the states of `flags`, descending.
    pub fn deliver(
        registry: &mut Registry<P>,
        flags: u32,
        msg: &Message,
        policy: MessagePolicy,
    ) -> bool {
        let mut handled = false;
        for flag in bits::iter_flags(flags) {
            let Some(StateEntry { state, ctx }) = registry.get_mut(&flag) else {
                continue;
            };
            if state.handle_message(ctx, msg) {
                handled = true;
                if policy == MessagePolicy::Consume {
                    break;
                }
            }
        }
        handled
    }

    /// Run `on_update` for the active states of `flags`.
    pub fn update(
        &self,
        registry: &mut Registry<P>,
        flags: u32,
        delta: Duration,
        param: Option<&P>,
    ) {
        for flag in bits::iter_flags(self.active & flags) {
            if let Some(StateEntry { state, ctx }) = registry.get_mut(&flag) {
                state.on_update(ctx, delta, param);
            }
        }
    }

    /// Dispose every cached instance of this group.
    pub fn destroy_cache(&mut self, registry: &mut Registry<P>) {
        for flag in bits::iter_flags(self.cached) {
            if let Some(mut entry) = registry.remove(&flag) {
                debug!(
                    scope = %self.scope,
                    flag = flag,
                    state = entry.name(),
                    "cached state disposed"
                );
                entry.state.on_dispose();
            }
        }
        self.cached = 0;
    }
}
