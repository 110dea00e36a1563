//! Controller handles.

use super::core::Core;
use super::error::{ControllerError, Result};
use crate::builder::StateTransaction;
use crate::checkpoint::{ControllerSnapshot, SNAPSHOT_VERSION};
use crate::core::{bits, ParameterMerger, State, StateContext, StateFactory};
use crate::engine::{GroupOp, Scope, TransitionKind, TransitionReport};
use crate::message::{
    Message, MessagePolicy, MessagePool, MessageQueue, MessageScope, MessageSender, PendingMessage,
};
use crate::team::{TeamManager, TeamMediator};
use chrono::Utc;
use std::any::Any;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

pub(crate) struct Shared<P> {
    core: RefCell<Core<P>>,
    disposed: Cell<bool>,
    team_enabled: Cell<bool>,
    team_suppressed: Cell<u32>,
    queue: MessageQueue,
    pool: MessagePool,
}

/// Handle to a flag-based state controller.
///
/// A controller keeps two bitmask scopes of active states, "current" and
/// "global", over one registry of state instances created by a
/// [`StateFactory`]. Handles are cheap to clone and all refer to the same
/// controller. Controllers are confined to one thread; use
/// [`Controller::message_sender`] to post messages from elsewhere.
///
/// Calling back into a controller from one of its own state hooks returns
/// [`ControllerError::Busy`].
///
/// # Example
///
/// ```rust
/// use flagstate::controller::Controller;
/// use flagstate::core::{BoxedState, ReplaceMerger, State, StateContext};
///
/// struct Named(&'static str);
///
/// impl State for Named {
///     type Param = String;
///     fn name(&self) -> &str {
///         self.0
///     }
///     fn on_enter(&mut self, _ctx: &StateContext<String>) {}
///     fn on_exit(&mut self, _ctx: &StateContext<String>) {}
/// }
///
/// const EAT: u32 = 1;
/// const SLEEP: u32 = 2;
///
/// let controller: Controller<String> = Controller::new();
/// controller
///     .set_state_factory(|flag: u32, _: Option<&String>| -> Option<BoxedState<String>> {
///         match flag {
///             EAT => Some(Box::new(Named("eat"))),
///             SLEEP => Some(Box::new(Named("sleep"))),
///             _ => None,
///         }
///     })
///     .unwrap();
/// controller.set_parameter_merger(ReplaceMerger).unwrap();
///
/// assert!(controller.add_state(EAT | SLEEP, None).unwrap());
/// assert!(!controller.remove_state(SLEEP | 4, None).unwrap());
/// assert_eq!(controller.current_state_flags().unwrap(), EAT);
/// ```
pub struct Controller<P> {
    shared: Rc<Shared<P>>,
}

/// Non-owning controller handle, held by states and team members.
pub struct WeakController<P> {
    shared: Weak<Shared<P>>,
}

impl<P> Clone for Controller<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<P> Clone for WeakController<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<P> WeakController<P> {
    pub fn upgrade(&self) -> Option<Controller<P>> {
        self.shared.upgrade().map(|shared| Controller { shared })
    }

    pub fn is_alive(&self) -> bool {
        self.shared.strong_count() > 0
    }

    /// Both handles refer to the same controller.
    pub fn ptr_eq(&self, other: &WeakController<P>) -> bool {
        Weak::ptr_eq(&self.shared, &other.shared)
    }
}

impl<P> fmt::Debug for WeakController<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakController")
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl<P> Controller<P> {
    pub fn downgrade(&self) -> WeakController<P> {
        WeakController {
            shared: Rc::downgrade(&self.shared),
        }
    }

    pub fn ptr_eq(&self, other: &Controller<P>) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.get()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.shared.disposed.get() {
            Err(ControllerError::Disposed)
        } else {
            Ok(())
        }
    }

    fn core(&self) -> Result<Ref<'_, Core<P>>> {
        self.ensure_live()?;
        self.shared
            .core
            .try_borrow()
            .map_err(|_| ControllerError::Busy)
    }

    fn core_mut(&self) -> Result<RefMut<'_, Core<P>>> {
        self.ensure_live()?;
        self.shared
            .core
            .try_borrow_mut()
            .map_err(|_| ControllerError::Busy)
    }
}

impl<P: Clone + 'static> Default for Controller<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Clone + 'static> Controller<P> {
    pub fn new() -> Self {
        let shared = Rc::new_cyclic(|weak: &Weak<Shared<P>>| Shared {
            core: RefCell::new(Core::new(WeakController {
                shared: weak.clone(),
            })),
            disposed: Cell::new(false),
            team_enabled: Cell::new(true),
            team_suppressed: Cell::new(0),
            queue: MessageQueue::new(),
            pool: MessagePool::new(),
        });
        Self { shared }
    }

    /// Controller holding `owner` until disposal.
    pub fn with_owner<O: Any>(owner: O) -> Self {
        let controller = Self::new();
        controller.shared.core.borrow_mut().owner = Some(Box::new(owner));
        controller
    }

    pub fn has_owner(&self) -> Result<bool> {
        Ok(self.core()?.owner.is_some())
    }

    /// Run `f` on the owner when it is an `O`.
    pub fn map_owner<O: Any, R>(&self, f: impl FnOnce(&O) -> R) -> Result<Option<R>> {
        let core = self.core()?;
        Ok(core.owner.as_ref().and_then(|o| o.downcast_ref::<O>()).map(f))
    }

    // ---- configuration ----

    pub fn set_state_factory<F>(&self, factory: F) -> Result<()>
    where
        F: StateFactory<P> + 'static,
    {
        self.core_mut()?.factory = Some(Box::new(factory));
        Ok(())
    }

    pub fn set_parameter_merger<M>(&self, merger: M) -> Result<()>
    where
        M: ParameterMerger<P> + 'static,
    {
        self.core_mut()?.merger = Some(Box::new(merger));
        Ok(())
    }

    /// Keep exited states for reuse. Disabling disposes the cache.
    pub fn set_state_cache_enabled(&self, enabled: bool) -> Result<()> {
        let mut core = self.core_mut()?;
        if core.cache_enabled && !enabled {
            core.destroy_cache();
        }
        core.cache_enabled = enabled;
        Ok(())
    }

    pub fn is_state_cache_enabled(&self) -> Result<bool> {
        Ok(self.core()?.cache_enabled)
    }

    /// Dispose every cached state.
    pub fn destroy_state_cache(&self) -> Result<()> {
        self.core_mut()?.destroy_cache();
        Ok(())
    }

    /// Record applied changes of the current scope. Disabling clears the
    /// stack.
    pub fn set_state_stack_enabled(&self, enabled: bool) -> Result<()> {
        let mut core = self.core_mut()?;
        core.stack_enabled = enabled;
        if !enabled {
            core.history.clear();
        }
        Ok(())
    }

    pub fn is_state_stack_enabled(&self) -> Result<bool> {
        Ok(self.core()?.stack_enabled)
    }

    pub fn set_max_state_stack_size(&self, max: usize) -> Result<()> {
        self.core_mut()?.history.set_max_size(max);
        Ok(())
    }

    pub fn max_state_stack_size(&self) -> Result<usize> {
        Ok(self.core()?.history.max_size())
    }

    /// Entries currently on the state stack.
    pub fn state_stack_len(&self) -> Result<usize> {
        Ok(self.core()?.history.len())
    }

    pub fn clear_state_stack(&self) -> Result<()> {
        let mut core = self.core_mut()?;
        if !core.stack_enabled {
            return Err(ControllerError::StateStackDisabled);
        }
        core.history.clear();
        Ok(())
    }

    /// Parameter merged under every per-call parameter.
    pub fn set_share_state_param(&self, param: Option<P>) -> Result<()> {
        self.core_mut()?.share_param = param;
        Ok(())
    }

    pub fn share_state_param(&self) -> Result<Option<P>> {
        Ok(self.core()?.share_param.clone())
    }

    pub fn set_team_manager(&self, manager: Option<TeamManager<P>>) -> Result<()> {
        self.core_mut()?.team = manager;
        Ok(())
    }

    pub fn team_manager(&self) -> Result<Option<TeamManager<P>>> {
        Ok(self.core()?.team.clone())
    }

    /// A team-disabled controller neither reports its transitions to its
    /// teams nor receives theirs.
    pub fn set_team_enabled(&self, enabled: bool) -> Result<()> {
        self.ensure_live()?;
        self.shared.team_enabled.set(enabled);
        Ok(())
    }

    pub fn is_team_enabled(&self) -> Result<bool> {
        self.ensure_live()?;
        Ok(self.shared.team_enabled.get())
    }

    // ---- current scope ----

    /// Add `flags` to the current states. Already active bits are reentered;
    /// the call still succeeds.
    pub fn add_state(&self, flags: u32, param: Option<P>) -> Result<bool> {
        self.run(Scope::Current, GroupOp::Add, flags, param, true)
    }

    /// Remove the active subset of `flags`. Returns `true` only when every
    /// requested bit was active.
    pub fn remove_state(&self, flags: u32, param: Option<P>) -> Result<bool> {
        self.run(Scope::Current, GroupOp::Remove, flags, param, true)
    }

    /// Replace the current states. Returns `false` when nothing changes.
    pub fn set_state(&self, flags: u32, param: Option<P>) -> Result<bool> {
        self.run(Scope::Current, GroupOp::Set, flags, param, true)
    }

    pub fn clear_state(&self, param: Option<P>) -> Result<bool> {
        self.run(Scope::Current, GroupOp::Clear, 0, param, true)
    }

    /// Any bit of `flags` is a current state.
    pub fn has_state(&self, flags: u32) -> Result<bool> {
        self.query(Scope::Current, flags, |active| active & flags != 0)
    }

    /// The current states are exactly `flags`.
    pub fn is_in_state(&self, flags: u32) -> Result<bool> {
        self.query(Scope::Current, flags, |active| active == flags)
    }

    // ---- global scope ----

    pub fn add_global_state(&self, flags: u32, param: Option<P>) -> Result<bool> {
        self.run(Scope::Global, GroupOp::Add, flags, param, false)
    }

    pub fn remove_global_state(&self, flags: u32, param: Option<P>) -> Result<bool> {
        self.run(Scope::Global, GroupOp::Remove, flags, param, false)
    }

    pub fn set_global_state(&self, flags: u32, param: Option<P>) -> Result<bool> {
        self.run(Scope::Global, GroupOp::Set, flags, param, false)
    }

    pub fn clear_global_state(&self, param: Option<P>) -> Result<bool> {
        self.run(Scope::Global, GroupOp::Clear, 0, param, false)
    }

    pub fn has_global_state(&self, flags: u32) -> Result<bool> {
        self.query(Scope::Global, flags, |active| active & flags != 0)
    }

    pub fn is_in_global_state(&self, flags: u32) -> Result<bool> {
        self.query(Scope::Global, flags, |active| active == flags)
    }

    fn query(&self, scope: Scope, flags: u32, test: impl FnOnce(u32) -> bool) -> Result<bool> {
        let core = self.core()?;
        core.mutex.check(flags)?;
        Ok(test(core.group(scope).active()))
    }

    fn run(
        &self,
        scope: Scope,
        op: GroupOp,
        flags: u32,
        param: Option<P>,
        record_history: bool,
    ) -> Result<bool> {
        let mut reports = Vec::new();
        let changed = {
            let mut core = self.core_mut()?;
            let collect = self.is_reporting() && core.team.is_some();
            core.apply(
                scope,
                op,
                flags,
                param,
                record_history,
                collect.then_some(&mut reports),
            )?
        };
        self.deliver_reports(&reports);
        Ok(changed)
    }

    fn is_reporting(&self) -> bool {
        self.shared.team_enabled.get() && self.shared.team_suppressed.get() == 0
    }

    fn deliver_reports(&self, reports: &[TransitionReport<P>]) {
        if reports.is_empty() {
            return;
        }
        let manager = match self.shared.core.try_borrow() {
            Ok(core) => core.team.clone(),
            Err(_) => None,
        };
        let Some(manager) = manager else {
            return;
        };
        let this = self.downgrade();
        for report in reports {
            trace!(flag = report.flag, kind = ?report.kind, "team report");
            manager.dispatch(&this, report);
        }
    }

    // ---- state queries ----

    pub fn current_state_flags(&self) -> Result<u32> {
        Ok(self.core()?.current.active())
    }

    pub fn global_state_flags(&self) -> Result<u32> {
        Ok(self.core()?.global.active())
    }

    /// Flags of cached states in both scopes.
    pub fn cached_state_flags(&self) -> Result<u32> {
        let core = self.core()?;
        Ok(core.current.cached() | core.global.cached())
    }

    /// Single flags of the current states, highest first.
    pub fn current_states(&self) -> Result<Vec<u32>> {
        Ok(bits::decompose(self.current_state_flags()?))
    }

    pub fn global_states(&self) -> Result<Vec<u32>> {
        Ok(bits::decompose(self.global_state_flags()?))
    }

    /// The highest current state, if any.
    pub fn current_state(&self) -> Result<Option<u32>> {
        let flags = self.current_state_flags()?;
        Ok((flags != 0).then(|| bits::highest_flag(flags)))
    }

    pub fn state_name(&self, flag: u32) -> Result<Option<String>> {
        Ok(self
            .core()?
            .registry
            .get(&flag)
            .map(|entry| entry.name().to_string()))
    }

    /// Instances alive in the registry, active or cached.
    pub fn state_count(&self) -> Result<usize> {
        Ok(self.core()?.registry.len())
    }

    /// Inspect the instance of `flag`, if it exists.
    pub fn with_state<R>(
        &self,
        flag: u32,
        f: impl FnOnce(&dyn State<Param = P>, &StateContext<P>) -> R,
    ) -> Result<Option<R>> {
        let core = self.core()?;
        Ok(core
            .registry
            .get(&flag)
            .map(|entry| f(entry.state.as_ref(), &entry.ctx)))
    }

    // ---- mutex ----

    /// Register a group whose members all exclude each other.
    pub fn add_mutex_state(&self, group: &[u32]) -> Result<()> {
        self.core_mut()?.mutex.add_group(group)
    }

    /// Register the bipartite relation: every flag of `a` excludes every flag
    /// of `b`. Replaces the previous pair.
    pub fn set_mutex_state(&self, a: &[u32], b: &[u32]) -> Result<()> {
        self.core_mut()?.mutex.set_pair(a, b);
        Ok(())
    }

    pub fn mutex_state(&self, flag: u32) -> Result<Option<Vec<u32>>> {
        Ok(self.core()?.mutex.mutex_state(flag))
    }

    pub fn remove_mutex_state(&self, group: &[u32]) -> Result<bool> {
        Ok(self.core_mut()?.mutex.remove_group(group))
    }

    pub fn clear_mutex_states(&self) -> Result<()> {
        self.core_mut()?.mutex.clear();
        Ok(())
    }

    // ---- locked events ----

    /// Lock every key. Returns `true` when none was locked before.
    pub fn lock_event(&self, keys: &[i32]) -> Result<bool> {
        if keys.is_empty() {
            return Err(ControllerError::EmptyKeys);
        }
        let mut core = self.core_mut()?;
        Ok(keys
            .iter()
            .fold(true, |all, key| core.locked_events.insert(*key) && all))
    }

    /// Unlock every key. Returns `true` when all were locked.
    pub fn unlock_event(&self, keys: &[i32]) -> Result<bool> {
        if keys.is_empty() {
            return Err(ControllerError::EmptyKeys);
        }
        let mut core = self.core_mut()?;
        Ok(keys
            .iter()
            .fold(true, |all, key| core.locked_events.remove(key) && all))
    }

    pub fn unlock_all_events(&self) -> Result<()> {
        self.core_mut()?.locked_events.clear();
        Ok(())
    }

    pub fn is_locked_event(&self, key: i32) -> Result<bool> {
        Ok(self.core()?.locked_events.contains(&key))
    }

    pub fn locked_events(&self) -> Result<Vec<i32>> {
        Ok(self.core()?.locked_events.iter().copied().collect())
    }

    // ---- history ----

    /// Return to the most recent recorded flags that differ from the current
    /// ones. `Ok(false)` when there is none.
    pub fn revert_to_previous_state(&self) -> Result<bool> {
        let entry = {
            let mut core = self.core_mut()?;
            if !core.stack_enabled {
                return Err(ControllerError::StateStackDisabled);
            }
            let current = core.current.active();
            core.history.pop_different(current)
        };
        let Some(entry) = entry else {
            return Ok(false);
        };
        debug!(flags = entry.flags, "reverting to previous state");
        let op = if entry.flags == 0 {
            GroupOp::Clear
        } else {
            GroupOp::Set
        };
        let param = entry.parameter.clone();
        if let Err(error) = self.run(Scope::Current, op, entry.flags, param, false) {
            if let Ok(mut core) = self.core_mut() {
                core.history.restore(entry);
            }
            return Err(error);
        }
        Ok(true)
    }

    // ---- transactions ----

    pub fn begin_transaction(&self) -> StateTransaction<P> {
        StateTransaction::new(self.clone())
    }

    // ---- messages ----

    /// A cleared message from this controller's pool.
    pub fn obtain_message(&self, what: i32) -> Result<Message> {
        self.ensure_live()?;
        Ok(self.shared.pool.obtain(what))
    }

    /// Return a message that is not in use to the pool.
    pub fn recycle_message(&self, msg: Message) -> Result<()> {
        self.ensure_live()?;
        self.shared.pool.recycle(msg)
    }

    /// Producer handle usable from other threads. Its sends fail with
    /// `Disposed` once this controller is disposed.
    pub fn message_sender(&self) -> Result<MessageSender> {
        self.ensure_live()?;
        Ok(MessageSender::new(self.shared.queue.clone()))
    }

    /// Dispatch to current states, stopping at the first handler.
    pub fn send_message(&self, msg: Message) -> Result<bool> {
        self.dispatch_message(msg, MessagePolicy::Consume, MessageScope::CURRENT)
    }

    /// Deliver `msg` now, or queue it when it is not due yet.
    ///
    /// Returns whether a state handled it; a queued message returns `false`.
    pub fn dispatch_message(
        &self,
        msg: Message,
        policy: MessagePolicy,
        scope: MessageScope,
    ) -> Result<bool> {
        self.dispatch_message_to(bits::ALL_FLAGS, msg, policy, scope)
    }

    /// Like [`dispatch_message`](Self::dispatch_message), restricted to the
    /// states of `states`.
    pub fn dispatch_message_to(
        &self,
        states: u32,
        mut msg: Message,
        policy: MessagePolicy,
        scope: MessageScope,
    ) -> Result<bool> {
        if msg.is_in_use() {
            return Err(ControllerError::MessageInUse { what: msg.what });
        }
        self.ensure_live()?;
        msg.mark_in_use();

        if !msg.is_due(Instant::now()) {
            self.enqueue(msg, states, policy, scope);
            return Ok(false);
        }
        let handled = match self.shared.core.try_borrow_mut() {
            Ok(mut core) => core.route(states, &msg, policy, scope),
            Err(_) => {
                debug!(what = msg.what, "controller busy, message queued");
                self.enqueue(msg, states, policy, scope);
                return Ok(false);
            }
        };
        trace!(what = msg.what, handled = handled, "message dispatched");
        self.finish_message(msg);
        Ok(handled)
    }

    fn enqueue(
        &self,
        message: Message,
        states: u32,
        policy: MessagePolicy,
        scope: MessageScope,
    ) {
        self.shared.queue.push(PendingMessage {
            message,
            states,
            policy,
            scope,
        });
    }

    /// Hand a delivered message to its replier, or back to the pool.
    fn finish_message(&self, msg: Message) {
        if let Some(msg) = msg.reply() {
            self.shared.pool.release(msg);
        }
    }

    pub fn has_message(&self, what: i32) -> Result<bool> {
        self.ensure_live()?;
        Ok(self.shared.queue.has(what))
    }

    /// Drop every queued message with `what`.
    pub fn remove_messages(&self, what: i32) -> Result<()> {
        self.ensure_live()?;
        for msg in self.shared.queue.remove(what) {
            self.shared.pool.release(msg);
        }
        Ok(())
    }

    pub fn clear_messages(&self) -> Result<()> {
        self.ensure_live()?;
        self.drain_queue();
        Ok(())
    }

    fn drain_queue(&self) {
        for msg in self.shared.queue.clear() {
            self.shared.pool.release(msg);
        }
    }

    pub fn pending_message_count(&self) -> Result<usize> {
        self.ensure_live()?;
        Ok(self.shared.queue.len())
    }

    // ---- update ----

    /// Deliver due messages in arrival order, then run `on_update` on every
    /// active state (global first).
    pub fn update(&self, delta: Duration, param: Option<P>) -> Result<()> {
        let delivered = {
            let mut core = self.core_mut()?;
            let due = self.shared.queue.take_due(Instant::now());
            let mut delivered = Vec::with_capacity(due.len());
            for pending in due {
                let handled = core.route(
                    pending.states,
                    &pending.message,
                    pending.policy,
                    pending.scope,
                );
                trace!(
                    what = pending.message.what,
                    handled = handled,
                    "queued message dispatched"
                );
                delivered.push(pending.message);
            }
            let merged = core.merge_share(param);
            core.update_states(bits::ALL_FLAGS, delta, merged.as_ref());
            delivered
        };
        for msg in delivered {
            self.finish_message(msg);
        }
        Ok(())
    }

    /// Run `on_update` on the active states inside `states` only.
    pub fn update_active_states(
        &self,
        states: u32,
        delta: Duration,
        param: Option<&P>,
    ) -> Result<()> {
        self.core_mut()?.update_states(states, delta, param);
        Ok(())
    }

    /// Run `on_update` with a zero delta on every active state.
    pub fn notify_state_update(&self, param: Option<P>) -> Result<()> {
        let mut core = self.core_mut()?;
        let merged = core.merge_share(param);
        core.update_states(bits::ALL_FLAGS, Duration::ZERO, merged.as_ref());
        Ok(())
    }

    // ---- snapshot ----

    /// Capture configuration, active flags and every state's saved blob.
    pub fn snapshot(&self) -> Result<ControllerSnapshot<P>> {
        let core = self.core()?;
        let saves = |flags: u32| -> BTreeMap<u32, Vec<u8>> {
            bits::iter_flags(flags)
                .filter_map(|flag| {
                    let entry = core.registry.get(&flag)?;
                    entry.state.save_state().map(|blob| (flag, blob))
                })
                .collect()
        };
        Ok(ControllerSnapshot {
            version: SNAPSHOT_VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            cache_enabled: core.cache_enabled,
            stack_enabled: core.stack_enabled,
            max_stack_size: core.history.max_size(),
            locked_events: core.locked_events.iter().copied().collect(),
            share_param: core.share_param.clone(),
            current_flags: core.current.active(),
            global_flags: core.global.active(),
            current_saves: saves(core.current.active()),
            global_saves: saves(core.global.active()),
        })
    }

    /// Apply a snapshot: configuration first, then global and current flags,
    /// then each active state's saved blob.
    pub fn restore(&self, snapshot: &ControllerSnapshot<P>) -> Result<()> {
        {
            let mut core = self.core_mut()?;
            if core.cache_enabled && !snapshot.cache_enabled {
                core.destroy_cache();
            }
            core.cache_enabled = snapshot.cache_enabled;
            core.stack_enabled = snapshot.stack_enabled;
            core.history.set_max_size(snapshot.max_stack_size);
            core.locked_events = snapshot.locked_events.iter().copied().collect();
            core.share_param = snapshot.share_param.clone();
        }
        for (scope, flags) in [
            (Scope::Global, snapshot.global_flags),
            (Scope::Current, snapshot.current_flags),
        ] {
            let op = if flags == 0 {
                GroupOp::Clear
            } else {
                GroupOp::Set
            };
            self.run(scope, op, flags, None, false)?;
        }

        let mut core = self.core_mut()?;
        for (flags, saves) in [
            (snapshot.global_flags, &snapshot.global_saves),
            (snapshot.current_flags, &snapshot.current_saves),
        ] {
            for flag in bits::iter_flags(flags) {
                if let Some(entry) = core.registry.get_mut(&flag) {
                    entry.state.restore_state(saves.get(&flag).map(Vec::as_slice));
                }
            }
        }
        debug!(
            current = snapshot.current_flags,
            global = snapshot.global_flags,
            "controller restored"
        );
        Ok(())
    }

    // ---- lifecycle ----

    /// Exit every active state, dispose every instance, drop queued messages
    /// and release the owner. A second call does nothing.
    pub fn dispose(&self) -> Result<()> {
        if self.shared.disposed.get() {
            return Ok(());
        }
        {
            let mut core = self
                .shared
                .core
                .try_borrow_mut()
                .map_err(|_| ControllerError::Busy)?;
            core.dispose();
        }
        self.shared.disposed.set(true);
        self.shared.queue.close();
        self.drain_queue();
        debug!("controller disposed");
        Ok(())
    }

    fn team_transition(
        &self,
        kind: TransitionKind,
        states: u32,
        param: Option<&P>,
    ) -> Result<bool> {
        if !self.shared.team_enabled.get() {
            return Ok(false);
        }
        self.core_mut()?.team_transition(kind, states, param)
    }
}

impl<P: Clone + 'static> TeamMediator<P> for Controller<P> {
    fn set_team_suppressed(&self, suppressed: bool) {
        let depth = self.shared.team_suppressed.get();
        let depth = if suppressed {
            depth + 1
        } else {
            depth.saturating_sub(1)
        };
        self.shared.team_suppressed.set(depth);
    }

    fn notify_state_enter(&self, states: u32, param: Option<&P>) -> Result<bool> {
        self.team_transition(TransitionKind::Enter, states, param)
    }

    fn notify_state_exit(&self, states: u32, param: Option<&P>) -> Result<bool> {
        self.team_transition(TransitionKind::Exit, states, param)
    }

    fn notify_state_reenter(&self, states: u32, param: Option<&P>) -> Result<bool> {
        self.team_transition(TransitionKind::Reenter, states, param)
    }
}

impl<P> fmt::Debug for Controller<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Controller");
        match self.shared.core.try_borrow() {
            Ok(core) => debug
                .field("current", &core.current.active())
                .field("global", &core.global.active())
                .field("cached", &(core.current.cached() | core.global.cached()))
                .field("states", &core.registry.len()),
            Err(_) => debug.field("busy", &true),
        };
        debug.field("disposed", &self.is_disposed()).finish()
    }
}
