//! Engine state behind a controller handle.

use super::error::{ControllerError, Result};
use super::handle::WeakController;
use crate::core::{bits, ParameterMerger, ReplaceMerger, StateFactory, StateHistory};
use crate::engine::{
    GroupEnv, GroupOp, MutexTable, Registry, Scope, StateGroup, TransitionKind, TransitionReport,
};
use crate::message::{Message, MessagePolicy, MessageScope};
use crate::team::TeamManager;
use std::any::Any;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, warn};

pub(crate) struct Core<P> {
    pub owner: Option<Box<dyn Any>>,
    pub factory: Option<Box<dyn StateFactory<P>>>,
    pub merger: Option<Box<dyn ParameterMerger<P>>>,
    pub current: StateGroup<P>,
    pub global: StateGroup<P>,
    pub registry: Registry<P>,
    pub mutex: MutexTable,
    pub history: StateHistory<P>,
    pub stack_enabled: bool,
    pub cache_enabled: bool,
    pub locked_events: BTreeSet<i32>,
    pub share_param: Option<P>,
    pub team: Option<TeamManager<P>>,
    pub this: WeakController<P>,
}

impl<P: Clone + 'static> Core<P> {
    pub fn new(this: WeakController<P>) -> Self {
        Self {
            owner: None,
            factory: None,
            merger: None,
            current: StateGroup::new(Scope::Current),
            global: StateGroup::new(Scope::Global),
            registry: Registry::new(),
            mutex: MutexTable::new(),
            history: StateHistory::default(),
            stack_enabled: false,
            cache_enabled: false,
            locked_events: BTreeSet::new(),
            share_param: None,
            team: None,
            this,
        }
    }

    pub fn group(&self, scope: Scope) -> &StateGroup<P> {
        match scope {
            Scope::Current => &self.current,
            Scope::Global => &self.global,
        }
    }

    /// Merge `param` into the share parameter; `param` wins.
    pub fn merge_share(&self, param: Option<P>) -> Option<P> {
        let share = self.share_param.clone();
        match self.merger.as_deref() {
            Some(merger) => merger.merge(share, param),
            None => ReplaceMerger.merge(share, param),
        }
    }

    /// Validate, merge the share parameter, and run `op` on the group.
    pub fn apply(
        &mut self,
        scope: Scope,
        op: GroupOp,
        flags: u32,
        param: Option<P>,
        record_history: bool,
        reports: Option<&mut Vec<TransitionReport<P>>>,
    ) -> Result<bool> {
        if op != GroupOp::Clear {
            if !bits::is_valid_flags(flags) {
                return Err(ControllerError::InvalidFlags { flags });
            }
            self.mutex.check(flags)?;
        }

        let Core {
            factory,
            merger,
            current,
            global,
            registry,
            mutex,
            history,
            stack_enabled,
            cache_enabled,
            share_param,
            this,
            ..
        } = &mut *self;
        let factory = factory
            .as_deref()
            .ok_or(ControllerError::MissingStateFactory)?;
        let merger = merger
            .as_deref()
            .ok_or(ControllerError::MissingParameterMerger)?;
        let merged = merger.merge(share_param.clone(), param);

        let group = match scope {
            Scope::Current => current,
            Scope::Global => global,
        };
        let mut env = GroupEnv {
            registry,
            factory,
            merger,
            mutex,
            cache_enabled: *cache_enabled,
            controller: this,
            reports,
        };
        let changed = group.apply(&mut env, op, flags, merged.clone())?;

        if changed && record_history && scope == Scope::Current && *stack_enabled {
            history.push(group.active(), merged);
            debug!(flags = group.active(), depth = history.len(), "state stack push");
        }
        Ok(changed)
    }

    /// Drive the active subset of `states` in both scopes for a teammate's
    /// transition. Enter and reenter both become reenter.
    pub fn team_transition(
        &mut self,
        kind: TransitionKind,
        states: u32,
        param: Option<&P>,
    ) -> Result<bool> {
        let Core {
            factory,
            merger,
            current,
            global,
            registry,
            mutex,
            cache_enabled,
            this,
            ..
        } = &mut *self;
        let factory = factory
            .as_deref()
            .ok_or(ControllerError::MissingStateFactory)?;
        let merger = merger
            .as_deref()
            .ok_or(ControllerError::MissingParameterMerger)?;
        let mut env = GroupEnv {
            registry,
            factory,
            merger,
            mutex,
            cache_enabled: *cache_enabled,
            controller: this,
            reports: None,
        };

        let touched = match kind {
            TransitionKind::Exit => {
                let global_hit = global.team_exit(&mut env, states, param);
                current.team_exit(&mut env, states, param) | global_hit
            }
            TransitionKind::Enter | TransitionKind::Reenter => {
                let global_hit = global.team_reenter(&mut env, states, param);
                current.team_reenter(&mut env, states, param) | global_hit
            }
        };
        Ok(touched)
    }

    /// Route `msg` to current active, then current cached, then global
    /// states, restricted to `states` and `scope`.
    pub fn route(
        &mut self,
        states: u32,
        msg: &Message,
        policy: MessagePolicy,
        scope: MessageScope,
    ) -> bool {
        let plan = [
            (MessageScope::CURRENT, self.current.active()),
            (MessageScope::CACHED, self.current.cached()),
            (MessageScope::GLOBAL, self.global.active()),
        ];
        let mut handled = false;
        for (part, flags) in plan {
            if !scope.contains(part) {
                continue;
            }
            if StateGroup::deliver(&mut self.registry, flags & states, msg, policy) {
                handled = true;
                if policy == MessagePolicy::Consume {
                    break;
                }
            }
        }
        handled
    }

    /// `on_update` for global then current active states inside `states`.
    pub fn update_states(&mut self, states: u32, delta: Duration, param: Option<&P>) {
        self.global.update(&mut self.registry, states, delta, param);
        self.current.update(&mut self.registry, states, delta, param);
    }

    pub fn destroy_cache(&mut self) {
        self.current.destroy_cache(&mut self.registry);
        self.global.destroy_cache(&mut self.registry);
    }

    /// Exit every active state (global first), then dispose every instance.
    pub fn dispose(&mut self) {
        self.cache_enabled = false;
        for scope in [Scope::Global, Scope::Current] {
            if self.group(scope).active() != 0 && self.factory.is_some() && self.merger.is_some() {
                if let Err(error) = self.apply(scope, GroupOp::Clear, 0, None, false, None) {
                    warn!(scope = ?scope, error = %error, "clearing states during dispose failed");
                }
            }
        }
        self.destroy_cache();
        for (flag, mut entry) in std::mem::take(&mut self.registry) {
            debug!(flag = flag, state = entry.name(), "state disposed");
            entry.state.on_dispose();
        }
        self.current.reset();
        self.global.reset();
        self.history.clear();
        self.locked_events.clear();
        self.share_param = None;
        self.owner = None;
        self.team = None;
    }
}
